//! Events reported by the engine.
//!
//! The engine reports verified navigation data, authentication status
//! changes and failures through an [`EventSink`].

use crate::error::FailureKind;
use crate::navmessage::NavDataSnapshot;
use crate::{Gst, Svn};

/// Kind of navigation data object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NavObjectKind {
    /// Ephemeris, clock and health status (ADKD=0 and 12).
    CedAndStatus,
    /// Timing parameters (ADKD=4).
    TimingParameters,
}

/// Authentication status of a satellite.
///
/// The counters hold the number of tag bits verified for the current
/// navigation data of the satellite. They drop to zero when the data changes
/// or a tag fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct AuthStatus {
    /// Satellite.
    pub svn: Svn,
    /// Verified tag bits for the CED and health status.
    pub verified_eph_bits: u16,
    /// Verified tag bits for the timing parameters.
    pub verified_utc_bits: u16,
}

/// Engine event.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Event {
    /// Navigation data has been authenticated with at least the configured
    /// number of tag bits.
    VerifiedNavObject {
        /// Kind of data.
        kind: NavObjectKind,
        /// Satellite the data belongs to.
        svn: Svn,
        /// GST at the start of the subframe where the data was transmitted.
        gst: Gst,
        /// Number of verified tag bits.
        authbits: u16,
        /// The data. Only the kind that has been verified is present.
        snapshot: NavDataSnapshot,
    },
    /// The verified tag bit counters of a satellite have changed.
    AuthenticationStatus(AuthStatus),
    /// Some data failed authentication or could not be authenticated.
    BadAuthentication {
        /// Kind of failure.
        kind: FailureKind,
        /// Satellite involved, if any.
        svn: Option<Svn>,
        /// GST involved, if any.
        gst: Option<Gst>,
    },
    /// Navigation data forwarded without authentication, because there is
    /// no trust anchor.
    UnauthenticatedNavObject {
        /// Satellite the data belongs to.
        svn: Svn,
        /// GST at the start of the subframe.
        gst: Gst,
        /// The data.
        snapshot: NavDataSnapshot,
    },
}

impl Event {
    pub(crate) fn failure(kind: FailureKind, svn: Option<Svn>, gst: Option<Gst>) -> Event {
        Event::BadAuthentication { kind, svn, gst }
    }
}

/// Consumer of engine events.
pub trait EventSink {
    /// Handles an event.
    fn event(&mut self, event: Event);
}

/// Discards all the events.
impl EventSink for () {
    fn event(&mut self, _event: Event) {}
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn event(&mut self, event: Event) {
        (**self).event(event)
    }
}

#[cfg(any(feature = "std", test))]
impl EventSink for std::vec::Vec<Event> {
    fn event(&mut self, event: Event) {
        self.push(event);
    }
}

/// Sends the events over a channel.
///
/// Events are dropped once the receiver hangs up.
#[cfg(feature = "std")]
impl EventSink for std::sync::mpsc::Sender<Event> {
    fn event(&mut self, event: Event) {
        if self.send(event).is_err() {
            log::debug!("event receiver hung up");
        }
    }
}
