//! # OSNMA engine
//!
//! osnma-engine is a Rust implementation of the navigation message
//! authentication (NMA) processing of Galileo OSNMA (Open Service Navigation
//! Message Authentication). Galileo signs its navigation data with a TESLA
//! key chain whose root is signed with ECDSA, and the ECDSA public keys are in
//! turn authenticated by a Merkle tree. This crate follows that chain of
//! trust, checks the MAC tags broadcast by the satellites, and reports which
//! navigation data is authentic.
//!
//! The main entry point is [`NmaEngine`]. It is fed OSNMA data and navigation
//! data, either as whole subframes ([`Fragment`], [`NavDataSnapshot`]) or as
//! INAV pages, and reports [`Event`]s through an [`EventSink`]. The engine is
//! a synchronous state machine that never blocks. With the `std` feature, the
//! [`actor`] module can run it on a worker thread shared by several
//! producers.
//!
//! The lower level building blocks (DSM reassembly, TESLA keys, MACK parsing,
//! the MAC Look-up Table, etc.) are public in case finer control is needed.
//!
//! All the state is held in fixed-size arrays whose sizes are selected with
//! the [`StaticStorage`](storage::StaticStorage) trait, so the crate can be
//! used without `std` in small embedded systems.
//!
//! ## Logging
//!
//! The crate makes extensive use of the
//! [log](https://docs.rs/log/latest/log/) crate to log events related to the
//! processing of the messages and the cryptographic functions.
//!
//! ## Features
//!
//! * `std` (default). Enables the [`actor`] module, the [`EventSink`]
//!   implementations for `Vec` and channels, and the `std::error::Error`
//!   implementations.
//! * `p521` (default). Support for ECDSA P-521 public keys.
//! * `cli`. Builds the `nma-replay` tool.

#![warn(missing_docs)]
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

#[cfg(feature = "std")]
pub mod actor;
pub mod bitfields;
pub mod config;
pub use config::{EngineConfig, TagPolicy};
pub mod crypto;
pub mod dsm;
pub mod engine;
pub use engine::{EngineMode, NmaEngine, TrustAnchor};
pub mod error;
pub use error::{FailureKind, ParseError};
pub mod event;
pub use event::{AuthStatus, Event, EventSink, NavObjectKind};
pub mod fragment;
pub use fragment::Fragment;
mod gst;
pub use gst::{Gst, Tow, Wn};
pub mod keychain;
pub mod mack;
pub mod maclt;
pub mod merkle_tree;
pub mod navmessage;
pub use navmessage::NavDataSnapshot;
pub mod pubkey;
pub use pubkey::{PublicKey, VerifyingKey};
pub mod slots;
pub mod storage;
pub use storage::{FullStorage, SmallStorage};
pub mod subframe;
mod svn;
pub use svn::{Svn, SvnError};
pub mod tesla;
pub mod types;
pub use types::{InavBand, NotValidated, Validated};
pub mod verifier;
