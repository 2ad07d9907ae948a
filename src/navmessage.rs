//! Navigation data storage and handling.
//!
//! This module contains the [`NavDataSnapshot`] type, which holds the
//! navigation data bits authenticated by the tags of one satellite and
//! subframe, the [`NavDataStore`] ring where snapshots are recorded, and the
//! [`InavCollector`], which builds snapshots from INAV words for hosts that do
//! not decode the navigation message themselves.

use crate::error::ParseError;
use crate::event::NavObjectKind;
use crate::slots::{Ring, SatSlots};
use crate::storage::StaticStorage;
use crate::types::{BitSlice, InavBand, InavWord};
use crate::{Gst, Svn};
use bitvec::prelude::*;

/// Length in bits of the CED and health status data (ADKD=0 and 12).
pub const CED_AND_STATUS_BITS: usize = 549;
const CED_AND_STATUS_BYTES: usize = (CED_AND_STATUS_BITS + 7) / 8;
const CED_AND_STATUS_WORDS: usize = 5;

/// Length in bits of the timing parameters data (ADKD=4).
pub const TIMING_PARAMETERS_BITS: usize = 141;
const TIMING_PARAMETERS_BYTES: usize = (TIMING_PARAMETERS_BITS + 7) / 8;
const TIMING_PARAMETERS_WORDS: usize = 2;

/// Navigation data of a satellite and subframe.
///
/// The snapshot holds the bits that the OSNMA tags authenticate. Each kind of
/// data is optional, since it might not have been decoded.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct NavDataSnapshot {
    ced_and_status: Option<[u8; CED_AND_STATUS_BYTES]>,
    timing_parameters: Option<[u8; TIMING_PARAMETERS_BYTES]>,
}

fn copy_bits<const N: usize>(bits: &BitSlice, len: usize) -> Result<[u8; N], ParseError> {
    if bits.len() != len {
        return Err(ParseError::WrongLength);
    }
    let mut data = [0; N];
    BitSlice::from_slice_mut(&mut data)[..len].copy_from_bitslice(bits);
    Ok(data)
}

impl NavDataSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> NavDataSnapshot {
        NavDataSnapshot::default()
    }

    /// Sets the CED and health status data.
    ///
    /// The data are the 549 bits authenticated by ADKD=0 and ADKD=12 tags:
    /// the data fields of INAV words 1 to 5.
    pub fn with_ced_and_status(mut self, bits: &BitSlice) -> Result<Self, ParseError> {
        self.ced_and_status = Some(copy_bits(bits, CED_AND_STATUS_BITS)?);
        Ok(self)
    }

    /// Sets the timing parameters data.
    ///
    /// The data are the 141 bits authenticated by ADKD=4 tags: GST-UTC and
    /// GST-GPS conversion parameters from INAV words 6 and 10.
    pub fn with_timing_parameters(mut self, bits: &BitSlice) -> Result<Self, ParseError> {
        self.timing_parameters = Some(copy_bits(bits, TIMING_PARAMETERS_BITS)?);
        Ok(self)
    }

    /// Returns the CED and health status data, if present.
    pub fn ced_and_status(&self) -> Option<&BitSlice> {
        self.ced_and_status
            .as_ref()
            .map(|d| &BitSlice::from_slice(d)[..CED_AND_STATUS_BITS])
    }

    /// Returns the timing parameters data, if present.
    pub fn timing_parameters(&self) -> Option<&BitSlice> {
        self.timing_parameters
            .as_ref()
            .map(|d| &BitSlice::from_slice(d)[..TIMING_PARAMETERS_BITS])
    }

    /// Returns a snapshot holding only one kind of data.
    pub fn only(&self, kind: NavObjectKind) -> NavDataSnapshot {
        match kind {
            NavObjectKind::CedAndStatus => NavDataSnapshot {
                ced_and_status: self.ced_and_status,
                timing_parameters: None,
            },
            NavObjectKind::TimingParameters => NavDataSnapshot {
                ced_and_status: None,
                timing_parameters: self.timing_parameters,
            },
        }
    }

    /// Returns `true` if the snapshot holds no data.
    pub fn is_empty(&self) -> bool {
        self.ced_and_status.is_none() && self.timing_parameters.is_none()
    }

    // Adds the kinds of data missing in `self`. Returns `true` if something
    // was added.
    fn merge(&mut self, other: &NavDataSnapshot) -> bool {
        let mut added = false;
        if self.ced_and_status.is_none() && other.ced_and_status.is_some() {
            self.ced_and_status = other.ced_and_status;
            added = true;
        }
        if self.timing_parameters.is_none() && other.timing_parameters.is_some() {
            self.timing_parameters = other.timing_parameters;
            added = true;
        }
        added
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct StoredSnapshot {
    svn: Svn,
    gst: Gst,
    snapshot: NavDataSnapshot,
}

/// Result of recording a snapshot.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Recorded {
    /// Some data that was not stored before has been stored.
    pub added: bool,
    /// An older snapshot has been evicted to make room.
    pub evicted: bool,
}

/// Navigation data store.
///
/// Snapshots are indexed by satellite and subframe GST. Once recorded, the
/// data of a snapshot is never modified: recording another snapshot for the
/// same satellite and subframe only adds the kinds of data that were
/// missing. The store is a ring, so the oldest snapshots are evicted first.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct NavDataStore<S: StaticStorage> {
    snapshots: Ring<StoredSnapshot, S::NavDataCapacity>,
}

impl<S: StaticStorage> NavDataStore<S> {
    /// Constructs a new, empty store.
    pub fn new() -> NavDataStore<S> {
        NavDataStore {
            snapshots: Ring::new(),
        }
    }

    /// Records the navigation data of a satellite.
    ///
    /// The `gst` is rounded down to the start of its subframe.
    pub fn record(&mut self, svn: Svn, gst: Gst, snapshot: &NavDataSnapshot) -> Recorded {
        let gst = gst.gst_subframe();
        if let Some(stored) = self
            .snapshots
            .iter_mut()
            .find(|s| s.svn == svn && s.gst == gst)
        {
            let added = stored.snapshot.merge(snapshot);
            log::trace!("{svn} snapshot at {gst:?} already present. added data = {added}");
            return Recorded {
                added,
                evicted: false,
            };
        }
        if snapshot.is_empty() {
            return Recorded::default();
        }
        log::trace!("recording {svn} snapshot at {gst:?}");
        let evicted = self
            .snapshots
            .push(StoredSnapshot {
                svn,
                gst,
                snapshot: snapshot.clone(),
            })
            .is_some();
        Recorded {
            added: true,
            evicted,
        }
    }

    /// Looks up the navigation data of a satellite at a subframe.
    pub fn lookup(&self, svn: Svn, gst: Gst) -> Option<&NavDataSnapshot> {
        let gst = gst.gst_subframe();
        self.snapshots
            .iter()
            .find(|s| s.svn == svn && s.gst == gst)
            .map(|s| &s.snapshot)
    }
}

impl<S: StaticStorage> Default for NavDataStore<S> {
    fn default() -> NavDataStore<S> {
        NavDataStore::new()
    }
}

// Words of one kind of navigation data, with the number of subframes since
// each word was received.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Words<const BYTES: usize, const WORDS: usize> {
    data: [u8; BYTES],
    age: [u8; WORDS],
}

impl<const BYTES: usize, const WORDS: usize> Default for Words<BYTES, WORDS> {
    fn default() -> Self {
        Words {
            data: [0; BYTES],
            age: [u8::MAX; WORDS],
        }
    }
}

impl<const BYTES: usize, const WORDS: usize> Words<BYTES, WORDS> {
    fn copy_word(&mut self, dest_range: core::ops::Range<usize>, source: &BitSlice, idx: usize) {
        self.age[idx] = 0;
        BitSlice::from_slice_mut(&mut self.data)[dest_range].copy_from_bitslice(source);
    }

    fn complete(&self) -> bool {
        self.age.iter().all(|&a| a != u8::MAX)
    }

    fn increase_age(&mut self) {
        for age in self.age.iter_mut() {
            if *age != u8::MAX {
                *age = age.saturating_add(1).min(u8::MAX - 1);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
struct InavSlot {
    ced_and_status: Words<CED_AND_STATUS_BYTES, CED_AND_STATUS_WORDS>,
    timing_parameters: Words<TIMING_PARAMETERS_BYTES, TIMING_PARAMETERS_WORDS>,
    subframe: Option<Gst>,
}

impl InavSlot {
    fn snapshot(&self) -> NavDataSnapshot {
        NavDataSnapshot {
            ced_and_status: self.ced_and_status.complete().then(|| {
                let mut data = self.ced_and_status.data;
                BitSlice::from_slice_mut(&mut data)[CED_AND_STATUS_BITS..].fill(false);
                data
            }),
            timing_parameters: self.timing_parameters.complete().then(|| {
                let mut data = self.timing_parameters.data;
                BitSlice::from_slice_mut(&mut data)[TIMING_PARAMETERS_BITS..].fill(false);
                data
            }),
        }
    }

    fn feed(&mut self, word: &InavWord, svn: Svn, band: InavBand) {
        let word = BitSlice::from_slice(word);
        let word_type = word[..6].load_be::<u8>();
        let ced = &mut self.ced_and_status;
        let timing = &mut self.timing_parameters;
        match (word_type, band) {
            (1, _) => ced.copy_word(0..120, &word[6..126], 0),
            (2, _) => ced.copy_word(120..240, &word[6..126], 1),
            (3, _) => ced.copy_word(240..362, &word[6..128], 2),
            (4, _) => ced.copy_word(362..482, &word[6..126], 3),
            (5, _) => ced.copy_word(482..549, &word[6..73], 4),
            (6, InavBand::E1B) => timing.copy_word(0..99, &word[6..105], 0),
            (10, InavBand::E1B) => timing.copy_word(99..141, &word[86..128], 1),
            _ => return,
        }
        log::trace!("{svn}: stored INAV word type {word_type}");
    }
}

/// INAV navigation data collector.
///
/// Extracts the CED and health status and the timing parameters from INAV
/// words. Words are carried over from one subframe to the next, so a snapshot
/// uses the most recent version of each word.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct InavCollector<S: StaticStorage> {
    slots: SatSlots<InavSlot, S::NumSats>,
}

/// Snapshot produced by an [`InavCollector`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CollectedSnapshot {
    /// Satellite transmitting the data.
    pub svn: Svn,
    /// GST at the start of the subframe.
    pub gst: Gst,
    /// Navigation data.
    pub snapshot: NavDataSnapshot,
}

impl<S: StaticStorage> InavCollector<S> {
    /// Constructs a new, empty collector.
    pub fn new() -> InavCollector<S> {
        InavCollector {
            slots: SatSlots::new(),
        }
    }

    /// Feed an INAV word.
    ///
    /// The `gst` parameter gives the GST at the start of the INAV page
    /// transmission, and `band` the band in which the word was received.
    /// Timing parameters are only taken from E1-B.
    ///
    /// When the first word of a new subframe is fed, the snapshot of the
    /// previous subframe of the satellite is returned, provided that it
    /// contains some complete kind of data. The second element of the tuple
    /// is the satellite whose words have been evicted to make room, if any.
    pub fn feed(
        &mut self,
        word: &InavWord,
        svn: Svn,
        gst: Gst,
        band: InavBand,
    ) -> (Option<CollectedSnapshot>, Option<Svn>) {
        log::trace!("feeding INAV word = {word:02x?} for {svn} GST {gst:?}");
        let subframe = gst.gst_subframe();
        let Some((slot, evicted)) = self.slots.get_or_assign(svn) else {
            log::error!("no storage available for INAV words of {svn}");
            return (None, None);
        };
        let mut collected = None;
        match slot.subframe {
            Some(previous) if previous == subframe => (),
            Some(previous) if previous > subframe => {
                log::warn!("{svn}: INAV word for {subframe:?} older than {previous:?}. dropping");
                return (None, evicted);
            }
            previous => {
                if let Some(previous) = previous {
                    let snapshot = slot.snapshot();
                    if !snapshot.is_empty() {
                        collected = Some(CollectedSnapshot {
                            svn,
                            gst: previous,
                            snapshot,
                        });
                    }
                    slot.ced_and_status.increase_age();
                    slot.timing_parameters.increase_age();
                }
                slot.subframe = Some(subframe);
            }
        }
        slot.feed(word, svn, band);
        (collected, evicted)
    }

    /// Discards the words of a satellite.
    pub fn reset(&mut self, svn: Svn) {
        self.slots.remove(svn);
    }
}

impl<S: StaticStorage> Default for InavCollector<S> {
    fn default() -> InavCollector<S> {
        InavCollector::new()
    }
}
