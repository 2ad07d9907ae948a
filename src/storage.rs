//! Engine storage definitions.
//!
//! The trait [`StaticStorage`] in this module is used to define the sizes of
//! the fixed-capacity arenas and rings allocated by
//! [`NmaEngine`](crate::engine::NmaEngine). This can be used to reduce the
//! memory footprint, at the cost of processing less satellites in parallel or
//! not processing Slow MAC.
//!
//! The number of SVNs (satellites) in the Galileo constellation is 36, but
//! a receiver will typically track at most 8 to 12 satellites at a time.
//! Per-satellite state (DSM reassembly, page collection, replay guards and
//! authentication tallies) lives in arenas of `NumSats` slots. When all the
//! slots are busy, the least recently used one is evicted.
//!
//! Slow MAC requires authenticating the data transmitted 10 subframes
//! (300 seconds) before its key is disclosed, so the rings of navigation
//! data snapshots and pending tags must be deep enough to hold 12 subframes
//! of every tracked satellite if Slow MAC is used.
//!
//! Two storage sizes are provided: [`FullStorage`], which gives the largest
//! reasonable storage, and [`SmallStorage`], which is a much smaller size that
//! can be used in memory constrained applications. Users can define
//! additional storage sizes by implementing the [`StaticStorage`] trait on
//! their own types.

use generic_array::ArrayLength;

/// Auxiliary trait for generic array sizes.
///
/// This is a trait that has as supertraits all the traits required to use an
/// [`Unsigned`](typenum::marker_traits::Unsigned) type from `typenum` as an
/// array length for the generic arrays used in the storage. Its main purpose is
/// to simplify trait bounds. A blanket implementation is used to derive this
/// trait for the appropriate types.
pub trait StaticStorageTypenum:
    typenum::marker_traits::Unsigned
    + core::fmt::Debug
    + core::cmp::PartialEq
    + core::cmp::Eq
    + core::hash::Hash
    + ArrayLength
{
}

/// Blanket implementation for [`StaticStorageTypenum`].
impl<T> StaticStorageTypenum for T where
    T: typenum::marker_traits::Unsigned
        + core::fmt::Debug
        + core::cmp::PartialEq
        + core::cmp::Eq
        + core::hash::Hash
        + ArrayLength
{
}

/// Trait defining static storage sizes.
///
/// A type that implements this trait defines the capacities of the storage
/// used by the engine. Unsigned integers from the `typenum` crate are used
/// for all of them. Every capacity must be at least one.
pub trait StaticStorage {
    /// Number of satellites whose state is kept in parallel.
    ///
    /// This should be 36 (or [`NUM_SVNS`](crate::types::NUM_SVNS)) to track
    /// the full constellation, and a value around 8 to 12 to track only the
    /// satellites in view.
    type NumSats: StaticStorageTypenum;
    /// Number of navigation data snapshots kept in the ring.
    ///
    /// Tags refer to navigation data transmitted in the subframe before the
    /// MACK, and Slow MAC tags are verified 10 subframes later, so about
    /// 13 snapshots per satellite are needed for Slow MAC.
    type NavDataCapacity: StaticStorageTypenum;
    /// Number of MACK messages waiting for the cryptographic MACSEQ check.
    type PendingMacks: StaticStorageTypenum;
    /// Number of tags waiting for their TESLA key.
    type PendingTags: StaticStorageTypenum;
    /// Number of verified TESLA keys kept in the history.
    type KeyHistory: StaticStorageTypenum;
}

/// Storage size for 36 satellites and Slow MAC.
///
/// This is the largest storage size that it makes sense to have.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct FullStorage {}

impl StaticStorage for FullStorage {
    type NumSats = typenum::U36;
    type NavDataCapacity = typenum::U512;
    type PendingMacks = typenum::U72;
    type PendingTags = typenum::U2048;
    type KeyHistory = typenum::U16;
}

/// Storage size for 12 satellites without Slow MAC.
///
/// This is an example of a reduced storage size that can be used in a platform
/// with constrained memory. Its rings only hold a few subframes for each
/// satellite, so Slow MAC tags are usually evicted before their key arrives.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SmallStorage {}

impl StaticStorage for SmallStorage {
    type NumSats = typenum::U12;
    type NavDataCapacity = typenum::U72;
    type PendingMacks = typenum::U24;
    type PendingTags = typenum::U128;
    type KeyHistory = typenum::U4;
}
