//! OSNMA engine.
//!
//! This module contains [`NmaEngine`], the synchronous state machine that
//! processes the OSNMA data and the navigation data of all the satellites,
//! and reports the authenticated navigation data through an
//! [`EventSink`].
//!
//! # Examples
//!
//! ```
//! use osnma_engine::{EngineConfig, EngineMode, FullStorage, NmaEngine, TrustAnchor};
//!
//! let engine = NmaEngine::<FullStorage>::new(TrustAnchor::default(), EngineConfig::default());
//! assert_eq!(engine.mode(), EngineMode::TrustAnchorMissing);
//! ```

use crate::bitfields::{DsmKroot, DsmPkr, DsmType, NmaHeader, NmaStatus};
use crate::config::EngineConfig;
use crate::dsm::DsmMessage;
use crate::error::FailureKind;
use crate::event::{AuthStatus, Event, EventSink};
use crate::fragment::{Fragment, Reassembler};
use crate::keychain::{KeyChain, KeyOutcome, Reanchor};
use crate::mack::{MackError, MackProcessor};
use crate::merkle_tree::{MerkleTree, PkrUpdate};
use crate::navmessage::{InavCollector, NavDataSnapshot, NavDataStore};
use crate::pubkey::PublicKey;
use crate::storage::StaticStorage;
use crate::subframe::CollectSubframe;
use crate::tesla::{Key, KrootValidationError, ValidationError};
use crate::types::{
    InavBand, InavWord, MackMessage, MerkleTreeNode, OsnmaDataMessage, Validated,
};
use crate::verifier::TagVerifier;
use crate::{Gst, Svn};

/// Trusted material loaded at start-up.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchor {
    /// Root of the OSNMA Merkle tree, used to validate DSM-PKR messages.
    pub merkle_root: Option<MerkleTreeNode>,
    /// OSNMA public key, used to validate DSM-KROOT messages.
    pub public_key: Option<PublicKey<Validated>>,
}

/// Operating mode of the engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EngineMode {
    /// There is no Merkle tree root nor public key. Navigation data is
    /// forwarded without authentication.
    TrustAnchorMissing,
    /// Waiting for a DSM-PKR with a public key.
    AwaitingPublicKey,
    /// Waiting for a DSM-KROOT.
    AwaitingKroot,
    /// A TESLA chain is in force and tags are being checked.
    Authenticating,
}

/// OSNMA engine.
///
/// The engine is fed the OSNMA data and navigation data of each satellite,
/// either as whole subframes ([`NmaEngine::ingest_fragment`],
/// [`NmaEngine::ingest_snapshot`]) or page by page
/// ([`NmaEngine::feed_osnma`], [`NmaEngine::feed_inav`]). Every call
/// processes everything that becomes possible with the new data and reports
/// the results to the sink. No call blocks or panics on malformed input.
#[derive(Debug, Clone)]
pub struct NmaEngine<S: StaticStorage> {
    config: EngineConfig,
    merkle_tree: Option<MerkleTree>,
    pubkey: Option<PublicKey<Validated>>,
    // DSM-KROOT waiting for its public key
    pending_kroot: Option<(NmaHeader, DsmMessage)>,
    subframes: CollectSubframe<S>,
    reassembler: Reassembler<S>,
    inav: InavCollector<S>,
    store: NavDataStore<S>,
    keychain: KeyChain<S>,
    macks: MackProcessor<S>,
    verifier: TagVerifier<S>,
    receiver_time: Option<Gst>,
}

impl<S: StaticStorage> NmaEngine<S> {
    /// Creates an engine.
    pub fn new(anchor: TrustAnchor, config: EngineConfig) -> NmaEngine<S> {
        NmaEngine {
            config,
            merkle_tree: anchor.merkle_root.map(MerkleTree::new),
            pubkey: anchor.public_key,
            pending_kroot: None,
            subframes: CollectSubframe::new(),
            reassembler: Reassembler::new(),
            inav: InavCollector::new(),
            store: NavDataStore::new(),
            keychain: KeyChain::new(),
            macks: MackProcessor::new(config.tag_policy),
            verifier: TagVerifier::new(config.min_authbits),
            receiver_time: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the operating mode.
    pub fn mode(&self) -> EngineMode {
        if self.merkle_tree.is_none() && self.pubkey.is_none() {
            EngineMode::TrustAnchorMissing
        } else if self.pubkey.is_none() {
            EngineMode::AwaitingPublicKey
        } else if self.keychain.kroot().is_none() {
            EngineMode::AwaitingKroot
        } else {
            EngineMode::Authenticating
        }
    }

    /// Returns the public key in force, if any.
    pub fn public_key(&self) -> Option<&PublicKey<Validated>> {
        self.pubkey.as_ref()
    }

    /// Returns the KROOT of the TESLA chain in force, if any.
    pub fn kroot(&self) -> Option<&Key<Validated>> {
        self.keychain.kroot()
    }

    /// Returns the verified tag bit counters of a satellite.
    pub fn authentication_status(&self, svn: Svn) -> AuthStatus {
        self.verifier.authentication_status(svn)
    }

    /// Sets the receiver time estimate.
    ///
    /// When a time is set, MACK messages whose key disclosure time differs
    /// from it by more than the configured tolerance are rejected.
    pub fn set_receiver_time(&mut self, gst: Option<Gst>) {
        self.receiver_time = gst;
    }

    /// Handles the loss of lock of a satellite.
    ///
    /// The partial messages, the pending MACK messages and tags, the
    /// anti-replay state and the verified tag bit counters of the satellite
    /// are discarded.
    pub fn loss_of_lock(&mut self, svn: Svn) {
        log::info!("{svn}: loss of lock");
        self.subframes.reset(svn);
        self.reassembler.reset(svn);
        self.inav.reset(svn);
        self.macks.reset_satellite(svn);
        self.verifier.reset_satellite(svn);
    }

    /// Feeds the OSNMA data of an INAV page.
    ///
    /// The `gst` parameter gives the GST at the start of the INAV page
    /// transmission. Pages carrying no OSNMA data (all zeros) are ignored.
    pub fn feed_osnma(
        &mut self,
        osnma: &OsnmaDataMessage,
        svn: Svn,
        gst: Gst,
        sink: &mut impl EventSink,
    ) {
        if osnma.iter().all(|&x| x == 0) {
            return;
        }
        let (fragment, evicted) = self.subframes.feed(osnma, svn, gst);
        report_eviction(evicted, sink);
        if let Some(fragment) = fragment {
            self.ingest_fragment(&fragment, sink);
        }
    }

    /// Feeds an INAV word.
    ///
    /// The `gst` parameter gives the GST at the start of the INAV page
    /// transmission.
    pub fn feed_inav(
        &mut self,
        word: &InavWord,
        svn: Svn,
        gst: Gst,
        band: InavBand,
        sink: &mut impl EventSink,
    ) {
        let (collected, evicted) = self.inav.feed(word, svn, gst, band);
        report_eviction(evicted, sink);
        if let Some(collected) = collected {
            self.ingest_snapshot(collected.svn, collected.gst, &collected.snapshot, sink);
        }
    }

    /// Ingests the navigation data of a satellite and subframe.
    pub fn ingest_snapshot(
        &mut self,
        svn: Svn,
        gst: Gst,
        snapshot: &NavDataSnapshot,
        sink: &mut impl EventSink,
    ) {
        let gst = gst.gst_subframe();
        if self.mode() == EngineMode::TrustAnchorMissing {
            sink.event(Event::UnauthenticatedNavObject {
                svn,
                gst,
                snapshot: snapshot.clone(),
            });
            return;
        }
        let recorded = self.store.record(svn, gst, snapshot);
        if recorded.evicted {
            log::debug!("navigation data store full. evicted oldest snapshot");
        }
        if recorded.added {
            self.run_verifier(sink);
        }
    }

    /// Ingests the OSNMA data of a satellite and subframe.
    pub fn ingest_fragment(&mut self, fragment: &Fragment, sink: &mut impl EventSink) {
        let svn = fragment.svn();
        let gst = fragment.gst();
        let ingested = self.reassembler.ingest(fragment);
        report_eviction(ingested.evicted, sink);
        match ingested.dsm {
            Ok(Some(dsm)) => {
                if let Some(nma_header) = ingested.nma_header {
                    self.process_dsm(&dsm, nma_header, svn, gst, sink);
                }
            }
            Ok(None) => (),
            Err(e) => {
                log::error!("{svn} {gst:?}: dropping DSM block ({e})");
                sink.event(Event::failure(FailureKind::ParseError, Some(svn), Some(gst)));
            }
        }
        if let (Some(mack), Some(nma_header)) = (ingested.mack, ingested.nma_header) {
            self.process_mack(&mack, nma_header, svn, gst, sink);
        }
        self.run_verifier(sink);
    }

    fn run_verifier(&mut self, sink: &mut impl EventSink) {
        if self.keychain.kroot().is_some() {
            self.verifier
                .run(&self.keychain, &mut self.macks, &self.store, sink);
        }
    }

    fn process_dsm(
        &mut self,
        dsm: &DsmMessage,
        nma_header: NmaHeader,
        svn: Svn,
        gst: Gst,
        sink: &mut impl EventSink,
    ) {
        match dsm.dsm_type() {
            DsmType::Pkr => self.process_pkr(dsm, svn, gst, sink),
            DsmType::Kroot => self.process_kroot(dsm, nma_header, svn, gst, sink),
        }
    }

    fn process_pkr(&mut self, dsm: &DsmMessage, svn: Svn, gst: Gst, sink: &mut impl EventSink) {
        let Some(merkle_tree) = &self.merkle_tree else {
            log::warn!("{svn} {gst:?}: no Merkle tree root to validate DSM-PKR");
            sink.event(Event::failure(
                FailureKind::TrustAnchorMissing,
                Some(svn),
                Some(gst),
            ));
            return;
        };
        match merkle_tree.validate_pkr(DsmPkr(dsm.data())) {
            Ok(PkrUpdate::PublicKey(pubkey)) => {
                if matches!(&self.pubkey, Some(current) if current.same_key(&pubkey)) {
                    log::trace!("DSM-PKR carries the current public key");
                    return;
                }
                log::info!("new public key {:?} validated by Merkle tree", pubkey);
                self.pubkey = Some(pubkey);
                if let Some((nma_header, kroot)) = self.pending_kroot.take() {
                    log::info!("retrying DSM-KROOT with the new public key");
                    self.process_kroot(&kroot, nma_header, svn, gst, sink);
                }
            }
            Ok(PkrUpdate::Alert) => {
                log::error!("OSNMA alert message received. revoking public key and chain");
                self.pubkey = None;
                self.pending_kroot = None;
                self.reset_chain();
                sink.event(Event::failure(
                    FailureKind::TrustAnchorMissing,
                    Some(svn),
                    Some(gst),
                ));
            }
            Err(e) => {
                log::error!("{svn} {gst:?}: could not validate DSM-PKR ({e})");
                sink.event(Event::failure(
                    FailureKind::ChainVerificationFailure,
                    Some(svn),
                    Some(gst),
                ));
            }
        }
    }

    fn process_kroot(
        &mut self,
        dsm: &DsmMessage,
        nma_header: NmaHeader,
        svn: Svn,
        gst: Gst,
        sink: &mut impl EventSink,
    ) {
        let Some(pubkey) = &self.pubkey else {
            log::warn!("{svn} {gst:?}: no public key to validate DSM-KROOT");
            self.pending_kroot = Some((nma_header, dsm.clone()));
            sink.event(Event::failure(
                FailureKind::TrustAnchorMissing,
                Some(svn),
                Some(gst),
            ));
            return;
        };
        match Key::from_dsm_kroot(nma_header, DsmKroot(dsm.data()), pubkey) {
            Ok(kroot) => {
                if self.keychain.reanchor(kroot) == Reanchor::Replaced {
                    self.macks.reset_all();
                    self.verifier.reset_all();
                }
            }
            Err(e) => {
                log::error!("{svn} {gst:?}: could not validate DSM-KROOT ({e})");
                if e == KrootValidationError::PublicKeyId {
                    // might be signed by a key not received yet
                    self.pending_kroot = Some((nma_header, dsm.clone()));
                }
                sink.event(Event::failure(
                    FailureKind::ChainVerificationFailure,
                    Some(svn),
                    Some(gst),
                ));
            }
        }
    }

    fn reset_chain(&mut self) {
        self.keychain.reset();
        self.macks.reset_all();
        self.verifier.reset_all();
    }

    fn process_mack(
        &mut self,
        mack: &MackMessage,
        nma_header: NmaHeader,
        svn: Svn,
        gst: Gst,
        sink: &mut impl EventSink,
    ) {
        let Some(chain) = self.keychain.kroot().map(|k| *k.chain()) else {
            log::trace!("no TESLA chain yet. ignoring MACK of {svn} {gst:?}");
            return;
        };
        if nma_header.nma_status() == NmaStatus::DontUse {
            log::warn!("{svn} {gst:?}: NMA status is don't use");
            self.verifier.reset_all();
            return;
        }
        if nma_header.chain_id() != chain.chain_id() {
            log::warn!(
                "{svn} {gst:?}: MACK for chain {} but chain in force is {}",
                nma_header.chain_id(),
                chain.chain_id()
            );
            return;
        }
        if let Some(receiver_time) = self.receiver_time {
            let disclosure = gst.add_subframes(1);
            let offset = receiver_time.seconds_since(disclosure);
            if offset.unsigned_abs() > u64::from(self.config.time_tolerance_secs) {
                log::error!(
                    "{svn} {gst:?}: MACK key disclosed {offset} s away from receiver time"
                );
                sink.event(Event::failure(
                    FailureKind::ReplayRejected,
                    Some(svn),
                    Some(gst),
                ));
                return;
            }
        }
        let accepted = match self.macks.process(svn, gst, nma_header, mack, &chain, sink) {
            Ok(accepted) => accepted,
            Err(e @ (MackError::NotAdvancing | MackError::RepeatedMacseq)) => {
                log::error!("{svn} {gst:?}: rejecting MACK ({e})");
                sink.event(Event::failure(
                    FailureKind::ReplayRejected,
                    Some(svn),
                    Some(gst),
                ));
                return;
            }
            Err(e) => {
                log::error!("{svn} {gst:?}: could not process MACK ({e})");
                sink.event(Event::failure(FailureKind::ParseError, Some(svn), Some(gst)));
                return;
            }
        };
        log::trace!("{svn} {gst:?}: {} tags queued", accepted.tags_queued);
        match self.keychain.verify_key(&accepted.key) {
            Ok(KeyOutcome::Verified(_)) | Ok(KeyOutcome::AlreadyKnown) => (),
            Err(ValidationError::DoesNotFollow) => {
                log::debug!("{svn} {gst:?}: TESLA key older than the latest validated key");
            }
            Err(e) => {
                log::error!(
                    "{svn} {gst:?}: could not validate TESLA key {:?} ({e})",
                    accepted.key
                );
                sink.event(Event::failure(
                    FailureKind::ChainVerificationFailure,
                    Some(svn),
                    Some(gst),
                ));
            }
        }
    }
}

fn report_eviction(evicted: Option<Svn>, sink: &mut impl EventSink) {
    if let Some(svn) = evicted {
        sink.event(Event::failure(FailureKind::CapacityExceeded, Some(svn), None));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::merkle_tree::test::{DSM_PKR_0, MERKLE_TREE_ROOT};
    use crate::navmessage::CED_AND_STATUS_BITS;
    use crate::storage::FullStorage;
    use crate::tesla::test::{osnma_pubkey, DSM_KROOT};
    use crate::types::{BitSlice, DSM_BLOCK_BYTES};

    fn svn(n: u8) -> Svn {
        Svn::try_from(n).unwrap()
    }

    fn snapshot() -> NavDataSnapshot {
        let data = [0u8; 69];
        NavDataSnapshot::new()
            .with_ced_and_status(&BitSlice::from_slice(&data)[..CED_AND_STATUS_BITS])
            .unwrap()
    }

    // Feeds a DSM block by block, one per subframe.
    fn feed_dsm(
        engine: &mut NmaEngine<FullStorage>,
        nma_header: u8,
        dsm_id: u8,
        dsm: &[u8],
        start: Gst,
        events: &mut Vec<Event>,
    ) {
        for (j, block) in dsm.chunks(DSM_BLOCK_BYTES).enumerate() {
            let mut data = [0; 75];
            data[0] = nma_header;
            data[1] = (dsm_id << 4) | j as u8;
            data[2..2 + block.len()].copy_from_slice(block);
            let fragment = Fragment::new(svn(11), start.add_subframes(j as i64), &data).unwrap();
            engine.ingest_fragment(&fragment, events);
        }
    }

    #[test]
    fn pass_through() {
        let mut engine = NmaEngine::<FullStorage>::new(TrustAnchor::default(), EngineConfig::default());
        assert_eq!(engine.mode(), EngineMode::TrustAnchorMissing);
        let mut events = Vec::new();
        let gst = Gst::new(1248, 345615);
        engine.ingest_snapshot(svn(3), gst, &snapshot(), &mut events);
        assert_eq!(
            events,
            [Event::UnauthenticatedNavObject {
                svn: svn(3),
                gst: Gst::new(1248, 345600),
                snapshot: snapshot(),
            }]
        );
    }

    #[test]
    fn kroot_bootstrap() {
        let anchor = TrustAnchor {
            merkle_root: None,
            public_key: Some(osnma_pubkey()),
        };
        let mut engine = NmaEngine::<FullStorage>::new(anchor, EngineConfig::default());
        assert_eq!(engine.mode(), EngineMode::AwaitingKroot);
        let mut events = Vec::new();
        // snapshots are stored silently until there is a chain
        engine.ingest_snapshot(svn(3), Gst::new(1248, 345600), &snapshot(), &mut events);
        feed_dsm(&mut engine, 0x82, 1, &DSM_KROOT, Gst::new(1248, 345600), &mut events);
        assert!(events.is_empty());
        assert_eq!(engine.mode(), EngineMode::Authenticating);
        assert_eq!(
            engine.kroot().unwrap().gst_subframe(),
            Gst::new(1248, 96 * 3600 - 30)
        );

        // a corrupted copy does not disturb the chain in force
        let mut dsm = DSM_KROOT;
        dsm[20] ^= 1;
        feed_dsm(&mut engine, 0x82, 2, &dsm, Gst::new(1248, 345840), &mut events);
        assert_eq!(
            events,
            [Event::failure(
                FailureKind::ChainVerificationFailure,
                Some(svn(11)),
                Some(Gst::new(1248, 345840 + 7 * 30))
            )]
        );
        assert_eq!(engine.mode(), EngineMode::Authenticating);
    }

    #[test]
    fn kroot_waits_for_public_key() {
        let anchor = TrustAnchor {
            merkle_root: Some(MERKLE_TREE_ROOT),
            public_key: None,
        };
        let mut engine = NmaEngine::<FullStorage>::new(anchor, EngineConfig::default());
        assert_eq!(engine.mode(), EngineMode::AwaitingPublicKey);
        let mut events = Vec::new();
        let start = Gst::new(1248, 345600);
        feed_dsm(&mut engine, 0x82, 1, &DSM_KROOT, start, &mut events);
        let kroot_done = start.add_subframes(7);
        assert_eq!(
            events,
            [Event::failure(
                FailureKind::TrustAnchorMissing,
                Some(svn(11)),
                Some(kroot_done)
            )]
        );
        events.clear();

        // The DSM-PKR brings a public key with PKID 1 that did not sign the
        // DSM-KROOT, so the pending DSM-KROOT fails
        let pkr_start = start.add_subframes(8);
        feed_dsm(&mut engine, 0x82, 12, &DSM_PKR_0, pkr_start, &mut events);
        assert_eq!(engine.public_key().unwrap().public_key_id(), 1);
        assert_eq!(engine.mode(), EngineMode::AwaitingKroot);
        assert_eq!(
            events,
            [Event::failure(
                FailureKind::ChainVerificationFailure,
                Some(svn(11)),
                Some(pkr_start.add_subframes(12))
            )]
        );
    }

    #[test]
    fn malformed_dsm_block() {
        let anchor = TrustAnchor {
            merkle_root: None,
            public_key: Some(osnma_pubkey()),
        };
        let mut engine = NmaEngine::<FullStorage>::new(anchor, EngineConfig::default());
        let mut events = Vec::new();
        let mut data = [0; 75];
        // block 0 with reserved NB_DK
        data[..3].copy_from_slice(&[0x82, 0x10, 0x01]);
        let gst = Gst::new(1248, 345600);
        let fragment = Fragment::new(svn(5), gst, &data).unwrap();
        engine.ingest_fragment(&fragment, &mut events);
        assert_eq!(
            events,
            [Event::failure(FailureKind::ParseError, Some(svn(5)), Some(gst))]
        );
        engine.loss_of_lock(svn(5));
        assert_eq!(engine.mode(), EngineMode::AwaitingKroot);
    }

    #[test]
    fn loss_of_lock_discards_partial_subframe() {
        let anchor = TrustAnchor {
            merkle_root: None,
            public_key: Some(osnma_pubkey()),
        };
        let mut engine = NmaEngine::<FullStorage>::new(anchor, EngineConfig::default());
        let mut events = Vec::new();
        // DSM block 0 with reserved NB_DK, which is reported once the subframe
        // is complete
        let hkroot = [0x82, 0x10, 0x01];
        let page = |j: usize| -> OsnmaDataMessage {
            [hkroot.get(j).copied().unwrap_or(0), 0x11, 0x11, 0x11, 0x11]
        };
        let start = Gst::new(1248, 345600);
        for j in 0..15 {
            if j == 8 {
                engine.loss_of_lock(svn(5));
            }
            for sv in [5, 6] {
                let gst = start.add_seconds(2 * j as i64);
                engine.feed_osnma(&page(j), svn(sv), gst, &mut events);
            }
        }
        assert_eq!(
            events,
            [Event::failure(FailureKind::ParseError, Some(svn(6)), Some(start))]
        );
        assert!(engine.public_key().is_some());
        assert_eq!(engine.mode(), EngineMode::AwaitingKroot);
    }
}
