//! Engine running on its own thread.
//!
//! [`spawn`] moves an [`NmaEngine`] to a worker thread that processes the
//! commands sent through any number of [`EngineHandle`]s one at a time. This
//! serializes all the changes to the key chain and the other state shared by
//! the satellites, so that the per-satellite receiver tasks can feed data
//! concurrently. The events are sent over a channel.
//!
//! The worker thread stops when all the handles are dropped, and returns the
//! engine through its [`JoinHandle`].
//!
//! The engine is kept boxed, since with large storage sizes it does not fit in
//! the default stack of a thread.

use crate::engine::{EngineMode, NmaEngine};
use crate::event::{AuthStatus, Event};
use crate::fragment::Fragment;
use crate::navmessage::NavDataSnapshot;
use crate::storage::StaticStorage;
use crate::types::{InavBand, InavWord, OsnmaDataMessage};
use crate::{Gst, Svn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Command processed by the worker thread.
#[derive(Debug)]
pub enum Command {
    /// Ingest a fragment.
    Fragment(Fragment),
    /// Ingest the navigation data of a subframe.
    Snapshot {
        /// Satellite.
        svn: Svn,
        /// GST of the subframe.
        gst: Gst,
        /// Navigation data.
        snapshot: NavDataSnapshot,
    },
    /// Feed the OSNMA data of an INAV page.
    Osnma {
        /// OSNMA data.
        data: OsnmaDataMessage,
        /// Satellite.
        svn: Svn,
        /// GST at the start of the page.
        gst: Gst,
    },
    /// Feed an INAV word.
    Inav {
        /// INAV word.
        word: InavWord,
        /// Satellite.
        svn: Svn,
        /// GST at the start of the page.
        gst: Gst,
        /// Band where the word was received.
        band: InavBand,
    },
    /// Set the receiver time estimate.
    ReceiverTime(Option<Gst>),
    /// A satellite has lost lock.
    LossOfLock(Svn),
    /// Query the authentication status of a satellite.
    Status(Svn, Sender<AuthStatus>),
    /// Query the operating mode.
    Mode(Sender<EngineMode>),
}

/// The worker thread has stopped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct EngineStopped;

impl std::fmt::Display for EngineStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("engine thread has stopped")
    }
}

impl std::error::Error for EngineStopped {}

/// Handle used to send commands to an engine running on a worker thread.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: Sender<Command>,
}

impl EngineHandle {
    /// Sends a command.
    pub fn send(&self, command: Command) -> Result<(), EngineStopped> {
        self.commands.send(command).map_err(|_| EngineStopped)
    }

    /// Sends a fragment.
    pub fn ingest_fragment(&self, fragment: Fragment) -> Result<(), EngineStopped> {
        self.send(Command::Fragment(fragment))
    }

    /// Sends the navigation data of a subframe.
    pub fn ingest_snapshot(
        &self,
        svn: Svn,
        gst: Gst,
        snapshot: NavDataSnapshot,
    ) -> Result<(), EngineStopped> {
        self.send(Command::Snapshot { svn, gst, snapshot })
    }

    /// Sends the OSNMA data of an INAV page.
    pub fn feed_osnma(
        &self,
        data: OsnmaDataMessage,
        svn: Svn,
        gst: Gst,
    ) -> Result<(), EngineStopped> {
        self.send(Command::Osnma { data, svn, gst })
    }

    /// Sends an INAV word.
    pub fn feed_inav(
        &self,
        word: InavWord,
        svn: Svn,
        gst: Gst,
        band: InavBand,
    ) -> Result<(), EngineStopped> {
        self.send(Command::Inav {
            word,
            svn,
            gst,
            band,
        })
    }

    /// Sets the receiver time estimate.
    pub fn set_receiver_time(&self, gst: Option<Gst>) -> Result<(), EngineStopped> {
        self.send(Command::ReceiverTime(gst))
    }

    /// Reports the loss of lock of a satellite.
    pub fn loss_of_lock(&self, svn: Svn) -> Result<(), EngineStopped> {
        self.send(Command::LossOfLock(svn))
    }

    /// Returns the authentication status of a satellite.
    ///
    /// The answer reflects all the commands sent before through this handle.
    pub fn authentication_status(&self, svn: Svn) -> Result<AuthStatus, EngineStopped> {
        let (tx, rx) = mpsc::channel();
        self.send(Command::Status(svn, tx))?;
        rx.recv().map_err(|_| EngineStopped)
    }

    /// Returns the operating mode of the engine.
    pub fn mode(&self) -> Result<EngineMode, EngineStopped> {
        let (tx, rx) = mpsc::channel();
        self.send(Command::Mode(tx))?;
        rx.recv().map_err(|_| EngineStopped)
    }
}

/// Moves an engine to a worker thread.
///
/// Returns a handle to send commands to the engine, and the [`JoinHandle`]
/// of the thread, which gives back the engine once all the handles have been
/// dropped.
pub fn spawn<S>(
    engine: Box<NmaEngine<S>>,
    events: Sender<Event>,
) -> (EngineHandle, JoinHandle<Box<NmaEngine<S>>>)
where
    S: StaticStorage + 'static,
    NmaEngine<S>: Send,
{
    let (tx, rx) = mpsc::channel();
    let thread = thread::spawn(move || run(engine, rx, events));
    (EngineHandle { commands: tx }, thread)
}

fn run<S: StaticStorage>(
    mut engine: Box<NmaEngine<S>>,
    commands: Receiver<Command>,
    mut events: Sender<Event>,
) -> Box<NmaEngine<S>> {
    log::debug!("engine thread started");
    for command in commands {
        match command {
            Command::Fragment(fragment) => engine.ingest_fragment(&fragment, &mut events),
            Command::Snapshot { svn, gst, snapshot } => {
                engine.ingest_snapshot(svn, gst, &snapshot, &mut events)
            }
            Command::Osnma { data, svn, gst } => engine.feed_osnma(&data, svn, gst, &mut events),
            Command::Inav {
                word,
                svn,
                gst,
                band,
            } => engine.feed_inav(&word, svn, gst, band, &mut events),
            Command::ReceiverTime(gst) => engine.set_receiver_time(gst),
            Command::LossOfLock(svn) => engine.loss_of_lock(svn),
            Command::Status(svn, reply) => {
                // the caller may have given up waiting
                let _ = reply.send(engine.authentication_status(svn));
            }
            Command::Mode(reply) => {
                let _ = reply.send(engine.mode());
            }
        }
    }
    log::debug!("all engine handles dropped. stopping engine thread");
    engine
}
