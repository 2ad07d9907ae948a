//! DSM message collection.
//!
//! This module contains the [`CollectDsm`] struct, which is used to collect all
//! the DSM blocks of a DSM message and recompose the message. Blocks are
//! collected independently for each satellite, since each satellite can be
//! broadcasting a different DSM.

use crate::bitfields::{number_of_blocks, DsmHeader, DsmType};
use crate::error::ParseError;
use crate::slots::SatSlots;
use crate::storage::StaticStorage;
use crate::types::{DsmBlock, DSM_BLOCK_BYTES};
use crate::Svn;

const MAX_DSM_BLOCKS: usize = 16;
const MAX_DSM_BYTES: usize = MAX_DSM_BLOCKS * DSM_BLOCK_BYTES;

/// DSM message.
///
/// This struct holds a complete DSM message produced by a [`CollectDsm`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DsmMessage {
    id: u8,
    len: usize,
    data: [u8; MAX_DSM_BYTES],
}

impl DsmMessage {
    /// Gives the DSM ID of the DSM.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Gives the type of the DSM, according to its ID.
    pub fn dsm_type(&self) -> DsmType {
        DsmHeader(self.id << 4).dsm_type()
    }

    /// Returns a slice containing the data of the DSM.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct DsmSlot {
    dsm: [u8; MAX_DSM_BYTES],
    block_valid: [bool; MAX_DSM_BLOCKS],
    done: bool,
    dsm_id: Option<u8>,
}

impl Default for DsmSlot {
    fn default() -> DsmSlot {
        DsmSlot {
            dsm: [0; MAX_DSM_BYTES],
            block_valid: [false; MAX_DSM_BLOCKS],
            done: false,
            dsm_id: None,
        }
    }
}

/// Result of feeding a DSM block.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DsmFeed {
    /// The DSM completed by the block, if any.
    pub dsm: Option<DsmMessage>,
    /// Satellite whose partial DSM was evicted to make room, if any.
    pub evicted: Option<Svn>,
}

/// DSM message collector.
///
/// This struct collects DSM blocks and produces a complete DSM message when all
/// the blocks of the message have been collected. For each satellite, only one
/// DSM message at a time can be collected.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CollectDsm<S: StaticStorage> {
    slots: SatSlots<DsmSlot, S::NumSats>,
}

impl<S: StaticStorage> CollectDsm<S> {
    /// Constructs a new, empty DSM collector.
    pub fn new() -> CollectDsm<S> {
        CollectDsm {
            slots: SatSlots::new(),
        }
    }

    /// Feed a new block into the DSM collector.
    ///
    /// The `header` parameter contains the DSM header of the block, and the
    /// `block` parameter contains the 13-byte DSM block, both broadcast by the
    /// satellite `svn`.
    ///
    /// If this block completes the DSM message, the recomposed message is
    /// returned. A complete DSM is returned only once, even if its blocks keep
    /// being broadcast.
    ///
    /// If the block fed corresponds to a new DSM ID, the old data of the
    /// satellite is discarded and the collection for the new DSM begins.
    ///
    /// A block 0 announcing a reserved number of blocks, or a block beyond
    /// the number of blocks of the DSM, is an error. In that case the
    /// collector is not modified.
    pub fn feed(
        &mut self,
        svn: Svn,
        header: DsmHeader,
        block: &DsmBlock,
    ) -> Result<DsmFeed, ParseError> {
        log::trace!(
            "{}: feeding header = {:?}, block = {:02x?}",
            svn,
            header,
            block
        );
        self.check_block(svn, header, block)?;
        let Some((slot, evicted)) = self.slots.get_or_assign(svn) else {
            log::error!("no storage available for DSM of {svn}");
            return Ok(DsmFeed {
                dsm: None,
                evicted: None,
            });
        };
        if slot.dsm_id != Some(header.dsm_id()) {
            log::info!(
                "{}: new DSM id = {} (had id = {:?}). resetting",
                svn,
                header.dsm_id(),
                slot.dsm_id
            );
            *slot = DsmSlot {
                dsm_id: Some(header.dsm_id()),
                ..DsmSlot::default()
            };
        }
        let dsm = if slot.done {
            log::trace!("{svn}: current DSM is complete. nothing to do");
            None
        } else {
            slot.store_block(header.dsm_block_id(), block);
            slot.done_and_size(header.dsm_type()).map(|size| {
                log::info!(
                    "{}: completed DSM with id = {}, size = {} bytes",
                    svn,
                    header.dsm_id(),
                    size
                );
                log::trace!("DSM contents {:02x?}", &slot.dsm[..size]);
                slot.done = true;
                DsmMessage {
                    id: header.dsm_id(),
                    len: size,
                    data: slot.dsm,
                }
            })
        };
        Ok(DsmFeed { dsm, evicted })
    }

    fn check_block(&self, svn: Svn, header: DsmHeader, block: &DsmBlock) -> Result<(), ParseError> {
        let dsm_type = header.dsm_type();
        let block_id = usize::from(header.dsm_block_id());
        let max_blocks = match dsm_type {
            DsmType::Kroot => 14,
            DsmType::Pkr => 16,
        };
        if block_id >= max_blocks {
            log::error!("{svn}: block {block_id} out of range for {dsm_type:?}");
            return Err(ParseError::BlockOutOfRange);
        }
        if block_id == 0 {
            let nb = block[0] >> 4;
            if number_of_blocks(dsm_type, nb).is_none() {
                log::error!("{svn}: reserved NB value {nb} for dsm_type = {dsm_type:?}");
                return Err(ParseError::ReservedBlockCount);
            }
        } else if let Some(slot) = self.slots.get(svn) {
            if slot.dsm_id == Some(header.dsm_id()) {
                if let Some(n) = slot.number_of_blocks(dsm_type) {
                    if block_id >= n {
                        log::error!("{svn}: block {block_id} out of range for {n} blocks");
                        return Err(ParseError::BlockOutOfRange);
                    }
                }
            }
        }
        Ok(())
    }

    /// Discards the partial DSM of a satellite.
    pub fn reset(&mut self, svn: Svn) {
        self.slots.remove(svn);
    }
}

impl DsmSlot {
    fn store_block(&mut self, block_id: u8, block: &DsmBlock) {
        let block_id = usize::from(block_id);
        let idx = block_id * DSM_BLOCK_BYTES;
        let section = &mut self.dsm[idx..idx + DSM_BLOCK_BYTES];
        if self.block_valid[block_id] {
            if section != block {
                log::error!(
                    "block {} already stored, but its contents differ \
                     stored = {:02x?}, just received = {:02x?}",
                    block_id,
                    section,
                    block
                );
            } else {
                log::trace!("block {} already stored", block_id);
            }
        } else {
            section.copy_from_slice(block);
            self.block_valid[block_id] = true;
            log::trace!("stored block {}", block_id);
        }
    }

    fn number_of_blocks(&self, dsm_type: DsmType) -> Option<usize> {
        if !self.block_valid[0] {
            return None;
        }
        number_of_blocks(dsm_type, self.dsm[0] >> 4)
    }

    fn done_and_size(&self, dsm_type: DsmType) -> Option<usize> {
        let Some(n) = self.number_of_blocks(dsm_type) else {
            log::trace!("first block not yet present. DSM size unknown");
            return None;
        };
        let missing = self.block_valid[..n].iter().filter(|&x| !x).count();
        log::trace!("DSM size = {} blocks. missing {} blocks", n, missing);
        if missing == 0 {
            Some(n * DSM_BLOCK_BYTES)
        } else {
            None
        }
    }
}

impl<S: StaticStorage> Default for CollectDsm<S> {
    fn default() -> CollectDsm<S> {
        CollectDsm::new()
    }
}
