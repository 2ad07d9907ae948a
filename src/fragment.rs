//! Subframe fragments.
//!
//! A [`Fragment`] holds the OSNMA data broadcast by one satellite during one
//! 30 second subframe: the 15-byte HKROOT message and the 60-byte MACK
//! message. The [`Reassembler`] splits fragments into their sections and
//! feeds the DSM blocks to a [`CollectDsm`].

use crate::bitfields::{DsmHeader, NmaHeader};
use crate::dsm::{CollectDsm, DsmMessage};
use crate::error::ParseError;
use crate::storage::StaticStorage;
use crate::types::{
    DsmBlock, HkrootMessage, MackMessage, DSM_BLOCK_BYTES, FRAGMENT_BYTES, HKROOT_MESSAGE_BYTES,
};
use crate::{Gst, Svn};

/// OSNMA data of one satellite and subframe.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Fragment {
    svn: Svn,
    gst: Gst,
    hkroot: HkrootMessage,
    mack: MackMessage,
}

impl Fragment {
    /// Creates a fragment from the 75 bytes of OSNMA data of a subframe.
    ///
    /// The data is the HKROOT message followed by the MACK message. The `gst`
    /// must be the start of the subframe.
    pub fn new(svn: Svn, gst: Gst, data: &[u8]) -> Result<Fragment, ParseError> {
        if data.len() != FRAGMENT_BYTES {
            return Err(ParseError::WrongLength);
        }
        let (hkroot, mack) = data.split_at(HKROOT_MESSAGE_BYTES);
        let hkroot = hkroot.try_into().map_err(|_| ParseError::WrongLength)?;
        let mack = mack.try_into().map_err(|_| ParseError::WrongLength)?;
        Fragment::from_parts(svn, gst, hkroot, mack)
    }

    /// Creates a fragment from its HKROOT and MACK messages.
    pub fn from_parts(
        svn: Svn,
        gst: Gst,
        hkroot: &HkrootMessage,
        mack: &MackMessage,
    ) -> Result<Fragment, ParseError> {
        if !gst.is_subframe() {
            return Err(ParseError::NotSubframeAligned);
        }
        Ok(Fragment {
            svn,
            gst,
            hkroot: *hkroot,
            mack: *mack,
        })
    }

    /// Returns the SVN of the transmitting satellite.
    pub fn svn(&self) -> Svn {
        self.svn
    }

    /// Returns the GST at the start of the subframe.
    pub fn gst(&self) -> Gst {
        self.gst
    }

    /// Returns the HKROOT message.
    pub fn hkroot(&self) -> &HkrootMessage {
        &self.hkroot
    }

    /// Returns the MACK message.
    pub fn mack(&self) -> &MackMessage {
        &self.mack
    }

    /// Returns the NMA header.
    pub fn nma_header(&self) -> NmaHeader {
        NmaHeader(self.hkroot[0])
    }

    /// Returns the DSM header.
    pub fn dsm_header(&self) -> DsmHeader {
        DsmHeader(self.hkroot[1])
    }

    /// Returns the DSM block.
    pub fn dsm_block(&self) -> DsmBlock {
        let mut block = [0; DSM_BLOCK_BYTES];
        block.copy_from_slice(&self.hkroot[2..]);
        block
    }

    /// Returns `true` if the HKROOT message carries data.
    ///
    /// Satellites not transmitting OSNMA fill the HKROOT with zeros.
    pub fn has_hkroot(&self) -> bool {
        self.hkroot.iter().any(|&b| b != 0)
    }

    /// Returns `true` if the MACK message carries data.
    pub fn has_mack(&self) -> bool {
        self.mack.iter().any(|&b| b != 0)
    }
}

/// Sections of a fragment, as produced by the [`Reassembler`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Ingested {
    /// NMA header, if the fragment carries an HKROOT message.
    pub nma_header: Option<NmaHeader>,
    /// DSM completed by the DSM block of the fragment.
    ///
    /// An error means that the DSM block was malformed and has been dropped.
    /// The MACK message is usable anyway.
    pub dsm: Result<Option<DsmMessage>, ParseError>,
    /// MACK message, if the fragment carries one.
    pub mack: Option<MackMessage>,
    /// Satellite whose partial DSM was evicted to make room, if any.
    pub evicted: Option<Svn>,
}

/// Message reassembler.
///
/// Splits fragments into their HKROOT and MACK sections and reassembles the
/// DSM messages of each satellite.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Reassembler<S: StaticStorage> {
    dsm: CollectDsm<S>,
}

impl<S: StaticStorage> Reassembler<S> {
    /// Creates a new reassembler.
    pub fn new() -> Reassembler<S> {
        Reassembler {
            dsm: CollectDsm::new(),
        }
    }

    /// Ingests a fragment.
    pub fn ingest(&mut self, fragment: &Fragment) -> Ingested {
        let mut ingested = Ingested {
            nma_header: None,
            dsm: Ok(None),
            mack: fragment.has_mack().then_some(*fragment.mack()),
            evicted: None,
        };
        if fragment.has_hkroot() {
            ingested.nma_header = Some(fragment.nma_header());
            match self
                .dsm
                .feed(fragment.svn(), fragment.dsm_header(), &fragment.dsm_block())
            {
                Ok(feed) => {
                    ingested.dsm = Ok(feed.dsm);
                    ingested.evicted = feed.evicted;
                }
                Err(e) => ingested.dsm = Err(e),
            }
        }
        ingested
    }

    /// Discards the partial DSM of a satellite.
    pub fn reset(&mut self, svn: Svn) {
        self.dsm.reset(svn);
    }
}

impl<S: StaticStorage> Default for Reassembler<S> {
    fn default() -> Reassembler<S> {
        Reassembler::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::{FullStorage, SmallStorage};
    use hex_literal::hex;

    fn svn() -> Svn {
        Svn::try_from(21).unwrap()
    }

    #[test]
    fn construction() {
        let gst = Gst::new(1176, 121050);
        assert_eq!(
            Fragment::new(svn(), gst, &[0; 74]).unwrap_err(),
            ParseError::WrongLength
        );
        assert_eq!(
            Fragment::new(svn(), gst.add_seconds(2), &[0; 75]).unwrap_err(),
            ParseError::NotSubframeAligned
        );
        let mut data = [0; 75];
        data[..15].copy_from_slice(&hex!("52 20 22 50 49 21 04 98 21 25 d3 96 4d a3 a2"));
        let fragment = Fragment::new(svn(), gst, &data).unwrap();
        assert!(fragment.has_hkroot());
        assert!(!fragment.has_mack());
        assert_eq!(fragment.nma_header(), NmaHeader(0x52));
        assert_eq!(fragment.dsm_header().dsm_id(), 2);
        assert_eq!(fragment.dsm_block()[0], 0x22);
    }

    #[test]
    fn reassembler_state_hash() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let hash = |reassembler: &Reassembler<SmallStorage>| {
            let mut hasher = DefaultHasher::new();
            reassembler.hash(&mut hasher);
            hasher.finish()
        };
        let mut reassembler = Reassembler::<SmallStorage>::new();
        let empty = reassembler.clone();
        assert_eq!(hash(&reassembler), hash(&empty));

        let mut data = [0; 75];
        data[..15].copy_from_slice(&hex!("52 20 22 50 49 21 04 98 21 25 d3 96 4d a3 a2"));
        let fragment = Fragment::new(svn(), Gst::new(1176, 121050), &data).unwrap();
        reassembler.ingest(&fragment);
        assert_ne!(reassembler, empty);
        assert_ne!(hash(&reassembler), hash(&empty));
    }

    #[test]
    fn ingest() {
        let mut reassembler = Reassembler::<FullStorage>::new();
        let gst = Gst::new(1176, 121050);

        let empty = Fragment::new(svn(), gst, &[0; 75]).unwrap();
        let ingested = reassembler.ingest(&empty);
        assert_eq!(ingested.nma_header, None);
        assert_eq!(ingested.dsm, Ok(None));
        assert_eq!(ingested.mack, None);

        let mut data = [0xaa; 75];
        // block 0 with reserved NB_DK
        data[..3].copy_from_slice(&hex!("52 20 02"));
        let fragment = Fragment::new(svn(), gst, &data).unwrap();
        let ingested = reassembler.ingest(&fragment);
        assert_eq!(ingested.nma_header, Some(NmaHeader(0x52)));
        assert_eq!(ingested.dsm, Err(ParseError::ReservedBlockCount));
        assert_eq!(ingested.mack, Some([0xaa; 60]));
    }
}
