//! Error types shared by the message handling layers.

use core::fmt;

/// Errors produced when parsing fragments and DSM blocks.
///
/// A parse error drops the offending piece of data. It never disturbs the
/// state built from previous data.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ParseError {
    /// The fragment does not have the expected length.
    WrongLength,
    /// The GST of the fragment is not the start of a subframe.
    NotSubframeAligned,
    /// Block 0 of a DSM carries a reserved number of blocks.
    ReservedBlockCount,
    /// The DSM block index is not smaller than the number of blocks.
    BlockOutOfRange,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::WrongLength => "wrong fragment length".fmt(f),
            ParseError::NotSubframeAligned => "GST is not aligned to a subframe".fmt(f),
            ParseError::ReservedBlockCount => "reserved number of DSM blocks".fmt(f),
            ParseError::BlockOutOfRange => "DSM block index out of range".fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

/// Kind of an authentication failure reported to the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FailureKind {
    /// A fragment, DSM block or tag is malformed. It has been dropped.
    ParseError,
    /// A DSM-PKR, DSM-KROOT or disclosed TESLA key failed its cryptographic
    /// check. It has been discarded.
    ChainVerificationFailure,
    /// A MACK message was rejected by the anti-replay checks. Its tags have
    /// been discarded.
    ReplayRejected,
    /// A tag does not match the navigation data. The data is untrusted.
    TagVerificationFailure,
    /// There is no trusted public key or Merkle tree root to check the data.
    TrustAnchorMissing,
    /// A bounded buffer evicted an unresolved entry.
    CapacityExceeded,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ParseError => "parse error".fmt(f),
            FailureKind::ChainVerificationFailure => "chain verification failure".fmt(f),
            FailureKind::ReplayRejected => "replay rejected".fmt(f),
            FailureKind::TagVerificationFailure => "tag verification failure".fmt(f),
            FailureKind::TrustAnchorMissing => "trust anchor missing".fmt(f),
            FailureKind::CapacityExceeded => "capacity exceeded".fmt(f),
        }
    }
}
