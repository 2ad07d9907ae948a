//! Subframe collection.
//!
//! This module contains the [`CollectSubframe`] struct, which is used to
//! collect the OSNMA data sections of the 15 INAV pages of a subframe and
//! produce a [`Fragment`].

use crate::fragment::Fragment;
use crate::slots::SatSlots;
use crate::storage::StaticStorage;
use crate::types::{
    HkrootMessage, MackMessage, OsnmaDataMessage, HKROOT_MESSAGE_BYTES, HKROOT_SECTION_BYTES,
    MACK_MESSAGE_BYTES, MACK_SECTION_BYTES, WORDS_PER_SUBFRAME,
};
use crate::{Gst, Svn};

const SECONDS_PER_WORD: u32 = 2;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct PageSlot {
    hkroot: HkrootMessage,
    mack: MackMessage,
    num_valid: usize,
    subframe: Option<Gst>,
}

impl Default for PageSlot {
    fn default() -> PageSlot {
        PageSlot {
            hkroot: [0; HKROOT_MESSAGE_BYTES],
            mack: [0; MACK_MESSAGE_BYTES],
            num_valid: 0,
            subframe: None,
        }
    }
}

/// OSNMA subframe collector.
///
/// The OSNMA data of each satellite is collected independently. A subframe
/// is only produced if its 15 pages are received in order, starting with the
/// first page of the subframe.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CollectSubframe<S: StaticStorage> {
    slots: SatSlots<PageSlot, S::NumSats>,
}

impl<S: StaticStorage> CollectSubframe<S> {
    /// Constructs a new, empty subframe collector.
    pub fn new() -> CollectSubframe<S> {
        CollectSubframe {
            slots: SatSlots::new(),
        }
    }

    /// Feed the OSNMA data section of an INAV page.
    ///
    /// The `gst` parameter gives the GST at the start of the INAV page
    /// transmission. If this page completes a subframe, the fragment is
    /// returned. The second element of the tuple is the satellite whose
    /// partial subframe has been evicted to make room, if any.
    pub fn feed(
        &mut self,
        osnma_data: &OsnmaDataMessage,
        svn: Svn,
        gst: Gst,
    ) -> (Option<Fragment>, Option<Svn>) {
        let (hkroot_section, mack_section) = osnma_data.split_at(HKROOT_SECTION_BYTES);
        let word_num = ((gst.tow() / SECONDS_PER_WORD) % WORDS_PER_SUBFRAME as u32) as usize;
        log::trace!(
            "feeding hkroot = {:02x?}, mack = {:02x?} for {} (GST = {:?}, word number = {})",
            hkroot_section,
            mack_section,
            svn,
            gst,
            word_num
        );
        let subframe = gst.gst_subframe();
        let Some((slot, evicted)) = self.slots.get_or_assign(svn) else {
            log::error!("no storage available for subframe of {svn}");
            return (None, None);
        };
        if slot.subframe != Some(subframe) {
            log::debug!("{svn}: starting collection of new subframe {subframe:?}");
            slot.subframe = Some(subframe);
            slot.num_valid = 0;
        }
        if word_num != slot.num_valid {
            log::trace!(
                "there are missing words for {} (GST = {:?}), \
                 word number = {}, valid words = {}",
                svn,
                gst,
                word_num,
                slot.num_valid
            );
            return (None, evicted);
        }
        let hkroot_idx = slot.num_valid * HKROOT_SECTION_BYTES;
        let mack_idx = slot.num_valid * MACK_SECTION_BYTES;
        slot.hkroot[hkroot_idx..hkroot_idx + HKROOT_SECTION_BYTES].copy_from_slice(hkroot_section);
        slot.mack[mack_idx..mack_idx + MACK_SECTION_BYTES].copy_from_slice(mack_section);
        slot.num_valid += 1;
        if slot.num_valid != WORDS_PER_SUBFRAME {
            return (None, evicted);
        }
        log::trace!(
            "completed collection for {} (GST = {:?})\nhkroot = {:02x?}\nmack = {:02x?}",
            svn,
            subframe,
            slot.hkroot,
            slot.mack,
        );
        slot.num_valid = 0;
        slot.subframe = None;
        match Fragment::from_parts(svn, subframe, &slot.hkroot, &slot.mack) {
            Ok(fragment) => (Some(fragment), evicted),
            Err(e) => {
                log::debug!("{svn} {subframe:?}: discarding collected subframe ({e})");
                (None, evicted)
            }
        }
    }

    /// Discards the partial subframe of a satellite.
    pub fn reset(&mut self, svn: Svn) {
        self.slots.remove(svn);
    }
}

impl<S: StaticStorage> Default for CollectSubframe<S> {
    fn default() -> CollectSubframe<S> {
        CollectSubframe::new()
    }
}
