//! Tag verification.
//!
//! The [`TagVerifier`] checks the MACSEQ fields and tags queued by the
//! [`MackProcessor`] once their TESLA keys have been validated and the
//! navigation data they authenticate is available, and keeps count of the
//! verified tag bits of each satellite.

use crate::bitfields::Adkd;
use crate::error::FailureKind;
use crate::event::{AuthStatus, Event, EventSink, NavObjectKind};
use crate::keychain::KeyChain;
use crate::mack::{MackProcessor, PendingTag};
use crate::navmessage::{NavDataSnapshot, NavDataStore};
use crate::slots::SatSlots;
use crate::storage::StaticStorage;
use crate::Svn;

#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
struct KindTally {
    data: Option<NavDataSnapshot>,
    bits: u16,
    reported: bool,
}

impl KindTally {
    // Returns `true` if the tally has just reached `min_authbits`.
    fn add(&mut self, data: &NavDataSnapshot, bits: u16, min_authbits: u16) -> bool {
        if self.data.as_ref() != Some(data) {
            self.data = Some(data.clone());
            self.bits = 0;
            self.reported = false;
        }
        self.bits = self.bits.saturating_add(bits);
        if self.bits >= min_authbits && !self.reported {
            self.reported = true;
            true
        } else {
            false
        }
    }

    fn fail(&mut self) {
        self.data = None;
        self.bits = 0;
        self.reported = false;
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
struct Tallies {
    ced_and_status: KindTally,
    timing_parameters: KindTally,
}

impl Tallies {
    fn kind_mut(&mut self, kind: NavObjectKind) -> &mut KindTally {
        match kind {
            NavObjectKind::CedAndStatus => &mut self.ced_and_status,
            NavObjectKind::TimingParameters => &mut self.timing_parameters,
        }
    }

    fn status(&self, svn: Svn) -> AuthStatus {
        AuthStatus {
            svn,
            verified_eph_bits: self.ced_and_status.bits,
            verified_utc_bits: self.timing_parameters.bits,
        }
    }
}

/// Tag verifier.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TagVerifier<S: StaticStorage> {
    tallies: SatSlots<Tallies, S::NumSats>,
    min_authbits: u16,
}

fn nav_object_kind(adkd: Adkd) -> Option<NavObjectKind> {
    match adkd {
        Adkd::InavCed | Adkd::SlowMac => Some(NavObjectKind::CedAndStatus),
        Adkd::InavTiming => Some(NavObjectKind::TimingParameters),
        Adkd::Reserved => None,
    }
}

impl<S: StaticStorage> TagVerifier<S> {
    /// Creates a verifier with all the counters at zero.
    ///
    /// A navigation object is reported as verified once `min_authbits` tag
    /// bits have been verified for it.
    pub fn new(min_authbits: u16) -> TagVerifier<S> {
        TagVerifier {
            tallies: SatSlots::new(),
            min_authbits,
        }
    }

    /// Returns the verified tag bit counters of a satellite.
    pub fn authentication_status(&self, svn: Svn) -> AuthStatus {
        self.tallies
            .get(svn)
            .map(|t| t.status(svn))
            .unwrap_or(AuthStatus {
                svn,
                verified_eph_bits: 0,
                verified_utc_bits: 0,
            })
    }

    /// Checks everything that can be checked.
    ///
    /// First the MACSEQ of each pending MACK message whose key is available
    /// is checked. A MACK message that fails is reported as replayed, and its
    /// tags are discarded. Then each tag whose MACK message has passed, whose
    /// key is available, and whose navigation data is in the `store` is
    /// checked and removed from the queue.
    pub fn run(
        &mut self,
        keychain: &KeyChain<S>,
        macks: &mut MackProcessor<S>,
        store: &NavDataStore<S>,
        sink: &mut impl EventSink,
    ) {
        macks.resolve_macks(|mack| {
            let key = keychain.key_at(mack.gst().add_subframes(1))?;
            let ok = key.validate_macseq(
                mack.macseq(),
                mack.prna().prn(),
                mack.gst(),
                mack.flx_tag_infos(),
            );
            if ok {
                log::debug!("{} {:?} MACSEQ correct", mack.prna(), mack.gst());
            } else {
                log::error!("{} {:?} MACSEQ wrong", mack.prna(), mack.gst());
                sink.event(Event::failure(
                    FailureKind::ReplayRejected,
                    Some(mack.prna()),
                    Some(mack.gst()),
                ));
            }
            Some(ok)
        });

        macks.retain_tags(|tag| {
            if !tag.macseq_ok() {
                return true;
            }
            let Some(kind) = nav_object_kind(tag.adkd()) else {
                return false;
            };
            let Some(key) = keychain.key_at(tag.key_gst()) else {
                return true;
            };
            let Some(snapshot) = store.lookup(tag.prnd(), tag.navdata_gst()) else {
                return true;
            };
            let navdata = match kind {
                NavObjectKind::CedAndStatus => snapshot.ced_and_status(),
                NavObjectKind::TimingParameters => snapshot.timing_parameters(),
            };
            let Some(navdata) = navdata else {
                return true;
            };
            let prna = tag.prna().prn();
            let ok = if tag.is_tag0() {
                key.validate_tag0(tag.tag(), tag.gst(), prna, tag.nma_status(), navdata)
            } else {
                key.validate_tag(
                    tag.tag(),
                    tag.gst(),
                    tag.prnd().prn(),
                    prna,
                    tag.ctr(),
                    tag.nma_status(),
                    navdata,
                )
            };
            self.tally(tag, kind, &snapshot.only(kind), ok, sink);
            false
        });
    }

    fn tally(
        &mut self,
        tag: &PendingTag,
        kind: NavObjectKind,
        data: &NavDataSnapshot,
        ok: bool,
        sink: &mut impl EventSink,
    ) {
        let svn = tag.prnd();
        let Some((tallies, _)) = self.tallies.get_or_assign(svn) else {
            return;
        };
        let before = tallies.status(svn);
        let tally = tallies.kind_mut(kind);
        if ok {
            log::info!(
                "{} {:?} tag {} (ADKD {:?}, {}) correct",
                svn,
                tag.gst(),
                tag.ctr(),
                tag.adkd(),
                tag.prna()
            );
            // tags are at most 40 bits
            let bits = tag.tag().len() as u16;
            if tally.add(data, bits, self.min_authbits) {
                log::info!("{} {:?} authenticated with {} bits", svn, kind, tally.bits);
                sink.event(Event::VerifiedNavObject {
                    kind,
                    svn,
                    gst: tag.navdata_gst(),
                    authbits: tally.bits,
                    snapshot: data.clone(),
                });
            }
        } else {
            log::error!(
                "{} {:?} tag {} (ADKD {:?}, {}) wrong",
                svn,
                tag.gst(),
                tag.ctr(),
                tag.adkd(),
                tag.prna()
            );
            tally.fail();
            sink.event(Event::failure(
                FailureKind::TagVerificationFailure,
                Some(svn),
                Some(tag.gst()),
            ));
        }
        let after = tallies.status(svn);
        if after != before {
            sink.event(Event::AuthenticationStatus(after));
        }
    }

    /// Sets the counters of a satellite to zero.
    pub fn reset_satellite(&mut self, svn: Svn) {
        self.tallies.remove(svn);
    }

    /// Sets all the counters to zero.
    pub fn reset_all(&mut self) {
        self.tallies.clear();
    }
}
