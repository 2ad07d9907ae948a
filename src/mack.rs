//! MACK message processing.
//!
//! This module contains [`MackProcessor`], which parses MACK messages,
//! applies the anti-replay checks and the tag policy, and keeps the MACK
//! messages and tags that are waiting for their TESLA keys.

use crate::bitfields::{Adkd, Mack, NmaHeader, NmaStatus};
use crate::config::TagPolicy;
use crate::error::FailureKind;
use crate::event::{Event, EventSink};
use crate::maclt::{self, AuthObject, MacLTError, MacLTSlot, MAX_FLX_ENTRIES};
use crate::slots::{Ring, SatSlots};
use crate::storage::StaticStorage;
use crate::tesla::{Chain, Key};
use crate::types::{BitSlice, MackMessage, NotValidated};
use crate::{Gst, Svn};
use bitvec::prelude::*;
use core::fmt;

/// Number of recently accepted MACSEQ values remembered per satellite.
pub const MACSEQ_REPLAY_WINDOW: usize = 3;

const MAX_TAG_BYTES: usize = 5;
// tag0 and the 9 slots of a MAC Look-up Table entry
const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
struct ReplayGuard {
    last_gst: Option<Gst>,
    recent: [Option<u16>; MACSEQ_REPLAY_WINDOW],
    next: usize,
}

impl ReplayGuard {
    fn check(&self, gst: Gst, macseq: u16) -> Result<(), MackError> {
        if matches!(self.last_gst, Some(last) if gst <= last) {
            return Err(MackError::NotAdvancing);
        }
        if self.recent.contains(&Some(macseq)) {
            return Err(MackError::RepeatedMacseq);
        }
        Ok(())
    }

    fn accept(&mut self, gst: Gst, macseq: u16) {
        self.last_gst = Some(gst);
        self.recent[self.next] = Some(macseq);
        self.next = (self.next + 1) % MACSEQ_REPLAY_WINDOW;
    }
}

/// MACK message waiting for the cryptographic check of its MACSEQ.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PendingMack {
    id: u64,
    prna: Svn,
    gst: Gst,
    macseq: u16,
    flx_tag_infos: [u16; MAX_FLX_ENTRIES],
    num_flx: usize,
}

impl PendingMack {
    /// Returns the satellite that transmitted the MACK message.
    pub fn prna(&self) -> Svn {
        self.prna
    }

    /// Returns the GST at the start of the subframe of the MACK message.
    pub fn gst(&self) -> Gst {
        self.gst
    }

    /// Returns the MACSEQ field.
    pub fn macseq(&self) -> u16 {
        self.macseq
    }

    /// Returns the tag-info fields of the tags in flexible slots.
    pub fn flx_tag_infos(&self) -> &[u16] {
        &self.flx_tag_infos[..self.num_flx]
    }
}

/// Tag waiting for its TESLA key and navigation data.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PendingTag {
    mack_id: u64,
    macseq_ok: bool,
    prna: Svn,
    prnd: Svn,
    gst: Gst,
    adkd: Adkd,
    ctr: u8,
    nma_status: NmaStatus,
    tag: [u8; MAX_TAG_BYTES],
    tag_bits: usize,
}

impl PendingTag {
    /// Returns the satellite that transmitted the tag.
    pub fn prna(&self) -> Svn {
        self.prna
    }

    /// Returns the satellite whose navigation data is authenticated.
    pub fn prnd(&self) -> Svn {
        self.prnd
    }

    /// Returns the GST at the start of the subframe of the MACK message.
    pub fn gst(&self) -> Gst {
        self.gst
    }

    /// Returns the ADKD.
    pub fn adkd(&self) -> Adkd {
        self.adkd
    }

    /// Returns the position of the tag in the MACK message, starting by 1
    /// for tag0.
    pub fn ctr(&self) -> u8 {
        self.ctr
    }

    /// Returns the NMA status broadcast with the MACK message.
    pub fn nma_status(&self) -> NmaStatus {
        self.nma_status
    }

    /// Returns `true` if this is tag0.
    pub fn is_tag0(&self) -> bool {
        self.ctr == 1
    }

    /// Returns the tag bits.
    pub fn tag(&self) -> &BitSlice {
        &BitSlice::from_slice(&self.tag)[..self.tag_bits]
    }

    /// Returns `true` if the MACSEQ of the MACK message of the tag has been
    /// checked.
    pub fn macseq_ok(&self) -> bool {
        self.macseq_ok
    }

    /// Returns the GST of the key that checks this tag.
    pub fn key_gst(&self) -> Gst {
        self.gst.add_subframes(self.adkd.key_delay_subframes())
    }

    /// Returns the GST of the subframe that carried the authenticated
    /// navigation data.
    pub fn navdata_gst(&self) -> Gst {
        self.gst.add_subframes(-1)
    }
}

/// MACK message accepted by the [`MackProcessor`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AcceptedMack {
    /// TESLA key disclosed in the message.
    pub key: Key<NotValidated>,
    /// GST at the start of the subframe of the message.
    pub gst: Gst,
    /// Number of tags queued for verification.
    pub tags_queued: usize,
}

/// Errors produced when processing a MACK message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MackError {
    /// The MACK message is not later than the last one accepted for the
    /// same satellite.
    NotAdvancing,
    /// The MACSEQ repeats a recently accepted one.
    RepeatedMacseq,
    /// The tags and the key do not fit in the MACK message.
    WrongLayout,
    /// The MAC Look-up Table of the chain cannot be used.
    Maclt(MacLTError),
    /// There is no storage for the anti-replay state.
    NoStorage,
}

impl fmt::Display for MackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MackError::NotAdvancing => "MACK message is not later than the previous one".fmt(f),
            MackError::RepeatedMacseq => "repeated MACSEQ".fmt(f),
            MackError::WrongLayout => "tags and key do not fit in MACK message".fmt(f),
            MackError::Maclt(e) => write!(f, "MAC look-up table error ({e})"),
            MackError::NoStorage => "no storage for anti-replay state".fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MackError {}

impl From<MacLTError> for MackError {
    fn from(value: MacLTError) -> MackError {
        MackError::Maclt(value)
    }
}

/// MACK message processor.
///
/// The processor keeps the anti-replay state of each satellite and the
/// queues of MACK messages and tags waiting to be checked. The queues are
/// rings, so when they are full the oldest entries are evicted.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct MackProcessor<S: StaticStorage> {
    guards: SatSlots<ReplayGuard, S::NumSats>,
    macks: Ring<PendingMack, S::PendingMacks>,
    tags: Ring<PendingTag, S::PendingTags>,
    next_id: u64,
    policy: TagPolicy,
}

fn check_slot(slot: MacLTSlot, adkd: Adkd, prnd: Svn, prna: Svn) -> bool {
    match slot {
        MacLTSlot::Fixed {
            adkd: slot_adkd,
            object,
        } => {
            adkd == slot_adkd
                && match object {
                    AuthObject::SelfAuth => prnd == prna,
                    AuthObject::CrossAuth => prnd != prna,
                }
        }
        MacLTSlot::Flex => match adkd {
            Adkd::InavTiming => prnd == prna,
            Adkd::InavCed | Adkd::SlowMac => true,
            Adkd::Reserved => false,
        },
    }
}

impl<S: StaticStorage> MackProcessor<S> {
    /// Creates a processor with empty queues.
    pub fn new(policy: TagPolicy) -> MackProcessor<S> {
        MackProcessor {
            guards: SatSlots::new(),
            macks: Ring::new(),
            tags: Ring::new(),
            next_id: 0,
            policy,
        }
    }

    /// Returns the tag policy.
    pub fn policy(&self) -> TagPolicy {
        self.policy
    }

    /// Processes a MACK message.
    ///
    /// The `prna` is the satellite that transmitted the message and `gst`
    /// the GST at the start of its subframe. The layout of the message is
    /// given by `chain`.
    ///
    /// If the message passes the anti-replay checks, it is queued for the
    /// cryptographic check of its MACSEQ, and the tags allowed by the tag
    /// policy are queued. Tags that do not match the MAC Look-up Table are
    /// dropped and reported to the `sink`, as well as the entries evicted
    /// from the queues.
    pub fn process(
        &mut self,
        prna: Svn,
        gst: Gst,
        nma_header: NmaHeader,
        mack: &MackMessage,
        chain: &Chain,
        sink: &mut impl EventSink,
    ) -> Result<AcceptedMack, MackError> {
        if chain.tag_size_bits() > 8 * MAX_TAG_BYTES {
            return Err(MackError::WrongLayout);
        }
        let maclt = chain.mac_lookup_table();
        let nt = maclt::num_tags(maclt)?;
        if nt > MAX_TAGS {
            return Err(MackError::WrongLayout);
        }
        let mack = Mack::new(mack, chain.key_size_bits(), chain.tag_size_bits())
            .with_num_tags(nt)
            .ok_or(MackError::WrongLayout)?;
        log::trace!("processing {:?} from {} at {:?}", mack, prna, gst);
        let msg = gst.mack_message_number();

        let mut flx_tag_infos = [0; MAX_FLX_ENTRIES];
        let mut num_flx = 0;
        for j in maclt::get_flx_indices(maclt, msg)? {
            if num_flx == MAX_FLX_ENTRIES {
                return Err(MackError::Maclt(MacLTError::InvalidTagNumber));
            }
            flx_tag_infos[num_flx] = mack.tag_and_info(j).tag_info().load_be::<u16>();
            num_flx += 1;
        }
        // the anti-replay state only changes once the whole message is parsed
        let mut slots = [MacLTSlot::Flex; MAX_TAGS];
        for (j, slot) in slots.iter_mut().enumerate().take(nt).skip(1) {
            *slot = maclt::get_maclt_entry(maclt, msg, j)?;
        }

        let (guard, evicted) = self.guards.get_or_assign(prna).ok_or(MackError::NoStorage)?;
        guard.check(gst, mack.macseq())?;
        guard.accept(gst, mack.macseq());
        if let Some(evicted) = evicted {
            sink.event(Event::failure(
                FailureKind::CapacityExceeded,
                Some(evicted),
                None,
            ));
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let pending = PendingMack {
            id,
            prna,
            gst,
            macseq: mack.macseq(),
            flx_tag_infos,
            num_flx,
        };
        if let Some(old) = self.macks.push(pending) {
            log::warn!(
                "evicted MACK of {} at {:?} before checking its MACSEQ",
                old.prna,
                old.gst
            );
            self.tags.retain(|t| t.mack_id != old.id);
            sink.event(Event::failure(
                FailureKind::CapacityExceeded,
                Some(old.prna),
                Some(old.gst),
            ));
        }

        let mut template = PendingTag {
            mack_id: id,
            macseq_ok: false,
            prna,
            prnd: prna,
            gst,
            adkd: Adkd::InavCed,
            ctr: 1,
            nma_status: nma_header.nma_status(),
            tag: [0; MAX_TAG_BYTES],
            tag_bits: chain.tag_size_bits(),
        };
        let mut tags_queued = 0;
        if mack.cop() != 0 && self.policy.allows(Adkd::InavCed) {
            self.queue_tag(&template, mack.tag0(), sink);
            tags_queued += 1;
        }
        for j in 1..nt {
            let tag = mack.tag_and_info(j);
            if tag.cop() == 0 {
                log::trace!("{} at {:?}: dummy tag {}", prna, gst, j);
                continue;
            }
            let slot = slots[j];
            let valid_prnd = Svn::try_from(tag.prnd()).ok();
            let Some(prnd) = valid_prnd.filter(|&p| check_slot(slot, tag.adkd(), p, prna)) else {
                log::error!(
                    "{} at {:?}: {:?} does not match MAC look-up table slot {:?}",
                    prna,
                    gst,
                    tag,
                    slot
                );
                sink.event(Event::failure(
                    FailureKind::ParseError,
                    Some(prna),
                    Some(gst),
                ));
                continue;
            };
            if !self.policy.allows(tag.adkd()) {
                continue;
            }
            template.prnd = prnd;
            template.adkd = tag.adkd();
            // j < nt <= 10
            template.ctr = (j + 1) as u8;
            self.queue_tag(&template, tag.tag(), sink);
            tags_queued += 1;
        }

        Ok(AcceptedMack {
            key: Key::from_bitslice(mack.key(), gst, chain),
            gst,
            tags_queued,
        })
    }

    fn queue_tag(&mut self, template: &PendingTag, tag: &BitSlice, sink: &mut impl EventSink) {
        let mut pending = template.clone();
        BitSlice::from_slice_mut(&mut pending.tag)[..tag.len()].copy_from_bitslice(tag);
        if let Some(old) = self.tags.push(pending) {
            log::warn!(
                "evicted unchecked tag of {} (ADKD {:?}) at {:?}",
                old.prnd,
                old.adkd,
                old.gst
            );
            sink.event(Event::failure(
                FailureKind::CapacityExceeded,
                Some(old.prnd),
                Some(old.gst),
            ));
        }
    }

    /// Iterates over the MACK messages waiting for their MACSEQ check.
    pub fn pending_macks(&self) -> impl Iterator<Item = &PendingMack> {
        self.macks.iter()
    }

    /// Iterates over the pending tags.
    pub fn pending_tags(&self) -> impl Iterator<Item = &PendingTag> {
        self.tags.iter()
    }

    /// Resolves the MACSEQ checks of the pending MACK messages.
    ///
    /// `check` returns `None` if the MACSEQ cannot be checked yet, or the
    /// result of the check. MACK messages that pass release their tags for
    /// verification. The tags of those that fail are discarded.
    pub(crate) fn resolve_macks(&mut self, mut check: impl FnMut(&PendingMack) -> Option<bool>) {
        let tags = &mut self.tags;
        self.macks.retain(|mack| match check(mack) {
            None => true,
            Some(true) => {
                for tag in tags.iter_mut().filter(|t| t.mack_id == mack.id) {
                    tag.macseq_ok = true;
                }
                false
            }
            Some(false) => {
                tags.retain(|t| t.mack_id != mack.id);
                false
            }
        });
    }

    /// Keeps only the pending tags for which `f` returns `true`.
    pub(crate) fn retain_tags(&mut self, mut f: impl FnMut(&PendingTag) -> bool) {
        self.tags.retain(|t| f(t));
    }

    /// Discards the state of a satellite: its anti-replay state and the
    /// MACK messages and tags it transmitted.
    pub fn reset_satellite(&mut self, svn: Svn) {
        self.guards.remove(svn);
        self.macks.retain(|m| m.prna != svn);
        self.tags.retain(|t| t.prna != svn);
    }

    /// Discards all the anti-replay state and the queues.
    pub fn reset_all(&mut self) {
        self.guards.clear();
        self.macks.clear();
        self.tags.clear();
    }
}

impl<S: StaticStorage> Default for MackProcessor<S> {
    fn default() -> MackProcessor<S> {
        MackProcessor::new(TagPolicy::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::{FullStorage, SmallStorage};
    use crate::tesla::test::{test_chain, test_chain_with_maclt};
    use crate::types::MACK_MESSAGE_BYTES;

    fn svn(n: u8) -> Svn {
        Svn::try_from(n).unwrap()
    }

    // Layout for a 40-bit tag and 128-bit key (MACLT 33)
    fn build_mack(cop0: u8, macseq: u16, tags: &[(u8, u8, u8)]) -> MackMessage {
        let mut mack = [0u8; MACK_MESSAGE_BYTES];
        let bits = BitSlice::from_slice_mut(&mut mack);
        bits[..40].fill(true);
        bits[40..52].store_be(macseq);
        bits[52..56].store_be(cop0);
        for (j, &(prnd, adkd, cop)) in tags.iter().enumerate() {
            let start = 56 * (j + 1);
            bits[start..start + 40].store_be(0x1234567800u64 + j as u64);
            bits[start + 40..start + 48].store_be(prnd);
            bits[start + 48..start + 52].store_be(adkd);
            bits[start + 52..start + 56].store_be(cop);
        }
        bits[336..464].fill(true);
        mack
    }

    fn header() -> NmaHeader {
        // NMAS operational, CID 1, CPKS nominal
        NmaHeader(0x92)
    }

    #[test]
    fn process_tags() {
        let mut processor = MackProcessor::<FullStorage>::new(TagPolicy::All);
        let mut events = Vec::new();
        let gst = Gst::new(1248, 345600);
        let mack = build_mack(
            1,
            0x123,
            &[(2, 0, 1), (1, 4, 1), (3, 0, 0), (1, 12, 1), (1, 0, 1)],
        );
        let accepted = processor
            .process(svn(1), gst, header(), &mack, &test_chain(), &mut events)
            .unwrap();
        assert_eq!(accepted.gst, gst);
        assert_eq!(accepted.tags_queued, 4);
        assert_eq!(accepted.key.data(), &[0xff; 16]);
        assert_eq!(accepted.key.gst_subframe(), gst);
        // tag 5 is cross-authentication of its own satellite
        assert_eq!(
            events,
            [Event::failure(FailureKind::ParseError, Some(svn(1)), Some(gst))]
        );

        let tags: Vec<_> = processor.pending_tags().collect();
        assert!(tags[0].is_tag0());
        assert_eq!(tags[0].prnd(), svn(1));
        assert_eq!(tags[0].tag(), BitSlice::from_slice(&[0xff; 5]));
        assert_eq!(tags[1].prnd(), svn(2));
        assert_eq!(tags[1].ctr(), 2);
        assert_eq!(tags[2].adkd(), Adkd::InavTiming);
        assert_eq!(tags[3].adkd(), Adkd::SlowMac);
        assert_eq!(tags[3].ctr(), 5);
        assert_eq!(tags[3].key_gst(), gst.add_seconds(330));
        assert_eq!(tags[3].navdata_gst(), gst.add_seconds(-30));
        assert!(tags.iter().all(|t| !t.macseq_ok()));
        assert_eq!(tags[0].nma_status(), NmaStatus::Operational);

        let macks: Vec<_> = processor.pending_macks().collect();
        assert_eq!(macks.len(), 1);
        assert_eq!(macks[0].macseq(), 0x123);
        assert!(macks[0].flx_tag_infos().is_empty());
    }

    #[test]
    fn tag_policy() {
        let mack = build_mack(1, 0x123, &[(2, 0, 1), (1, 4, 1), (3, 0, 1), (1, 12, 1)]);
        for (policy, queued) in [
            (TagPolicy::All, 5),
            (TagPolicy::Eph, 3),
            (TagPolicy::Utc, 1),
            (TagPolicy::SlowEph, 1),
            (TagPolicy::None, 0),
        ] {
            let mut processor = MackProcessor::<FullStorage>::new(policy);
            let accepted = processor
                .process(
                    svn(1),
                    Gst::new(1248, 345600),
                    header(),
                    &mack,
                    &test_chain(),
                    &mut (),
                )
                .unwrap();
            assert_eq!(accepted.tags_queued, queued, "policy {policy}");
            assert_eq!(processor.pending_tags().count(), queued);
        }
    }

    #[test]
    fn replay() {
        let mut processor = MackProcessor::<FullStorage>::new(TagPolicy::All);
        let chain = test_chain();
        let gst = Gst::new(1248, 345600);
        let dummy = |macseq| build_mack(0, macseq, &[]);
        let mut process = |gst, macseq| {
            processor.process(svn(4), gst, header(), &dummy(macseq), &chain, &mut ())
        };
        assert!(process(gst, 1).is_ok());
        assert_eq!(process(gst, 2), Err(MackError::NotAdvancing));
        assert_eq!(
            process(gst.add_seconds(-30), 2),
            Err(MackError::NotAdvancing)
        );
        assert_eq!(process(gst.add_seconds(30), 1), Err(MackError::RepeatedMacseq));
        assert!(process(gst.add_seconds(30), 2).is_ok());
        assert!(process(gst.add_seconds(60), 3).is_ok());
        assert!(process(gst.add_seconds(90), 4).is_ok());
        // 1 is out of the window by now
        assert!(process(gst.add_seconds(120), 1).is_ok());
        // other satellites are independent
        assert!(processor
            .process(svn(5), gst, header(), &dummy(1), &chain, &mut ())
            .is_ok());
    }

    #[test]
    fn rejected_mack_keeps_replay_state() {
        let mut processor = MackProcessor::<FullStorage>::new(TagPolicy::All);
        let gst = Gst::new(1248, 345600);
        let mack = build_mack(1, 0x55, &[(2, 0, 1)]);
        assert_eq!(
            processor.process(
                svn(6),
                gst,
                header(),
                &mack,
                &test_chain_with_maclt(99),
                &mut ()
            ),
            Err(MackError::Maclt(MacLTError::InvalidMaclt))
        );
        assert_eq!(processor.pending_macks().count(), 0);
        assert_eq!(processor.pending_tags().count(), 0);
        // the same GST and MACSEQ are still fresh
        assert!(processor
            .process(svn(6), gst, header(), &mack, &test_chain(), &mut ())
            .is_ok());
    }

    #[test]
    fn resolve() {
        let mut processor = MackProcessor::<FullStorage>::new(TagPolicy::All);
        let chain = test_chain();
        let gst = Gst::new(1248, 345600);
        let mack = build_mack(1, 0x10, &[(2, 0, 1)]);
        for sv in [1, 3] {
            processor
                .process(svn(sv), gst, header(), &mack, &chain, &mut ())
                .unwrap();
        }
        assert_eq!(processor.pending_tags().count(), 4);
        processor.resolve_macks(|m| Some(m.prna() == svn(1)));
        assert_eq!(processor.pending_macks().count(), 0);
        let tags: Vec<_> = processor.pending_tags().collect();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.prna() == svn(1) && t.macseq_ok()));

        processor.retain_tags(|t| !t.is_tag0());
        assert_eq!(processor.pending_tags().count(), 1);
        processor.reset_satellite(svn(1));
        assert_eq!(processor.pending_tags().count(), 0);
    }

    #[test]
    fn eviction() {
        let mut processor = MackProcessor::<SmallStorage>::new(TagPolicy::All);
        let chain = test_chain();
        let mut events = Vec::new();
        let start = Gst::new(1248, 345600);
        for j in 0..25 {
            processor
                .process(
                    svn(7),
                    start.add_subframes(j),
                    header(),
                    &build_mack(0, j as u16, &[]),
                    &chain,
                    &mut events,
                )
                .unwrap();
        }
        assert_eq!(
            events,
            [Event::failure(
                FailureKind::CapacityExceeded,
                Some(svn(7)),
                Some(start)
            )]
        );
        assert_eq!(processor.pending_macks().count(), 24);
    }

    #[test]
    fn wrong_maclt() {
        let mut processor = MackProcessor::<FullStorage>::default();
        let chain = crate::tesla::test::test_chain_with_maclt(0);
        assert_eq!(
            processor.process(
                svn(1),
                Gst::new(1248, 345600),
                header(),
                &build_mack(0, 0, &[]),
                &chain,
                &mut ()
            ),
            Err(MackError::Maclt(MacLTError::InvalidMaclt))
        );
    }
}
