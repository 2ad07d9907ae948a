//! Common types and constants.
//!
//! This module holds the sizes of the OSNMA protocol units, the type aliases
//! used to pass them around, and the validation status markers used by
//! [`Key`](crate::tesla::Key) and [`PublicKey`](crate::pubkey::PublicKey).

/// Number of SVNs in the Galileo constellation.
pub const NUM_SVNS: usize = 36;

/// Size in bytes of the HKROOT section of an OSNMA page.
pub const HKROOT_SECTION_BYTES: usize = 1;
/// Size in bytes of the MACK section of an OSNMA page.
pub const MACK_SECTION_BYTES: usize = 4;
/// HKROOT section of an OSNMA page.
pub type HkrootSection = [u8; HKROOT_SECTION_BYTES];
/// MACK section of an OSNMA page.
pub type MackSection = [u8; MACK_SECTION_BYTES];

/// OSNMA data carried by one INAV page (the 40-bit "Reserved 1" field).
pub type OsnmaDataMessage = [u8; HKROOT_SECTION_BYTES + MACK_SECTION_BYTES];

/// Number of INAV pages with OSNMA data in a subframe.
pub const WORDS_PER_SUBFRAME: usize = 15;
/// Size in bytes of the HKROOT message of a subframe.
pub const HKROOT_MESSAGE_BYTES: usize = HKROOT_SECTION_BYTES * WORDS_PER_SUBFRAME;
/// Size in bytes of the MACK message of a subframe.
pub const MACK_MESSAGE_BYTES: usize = MACK_SECTION_BYTES * WORDS_PER_SUBFRAME;
/// Size in bytes of a whole subframe fragment (HKROOT followed by MACK).
pub const FRAGMENT_BYTES: usize = HKROOT_MESSAGE_BYTES + MACK_MESSAGE_BYTES;
/// HKROOT message (NMA header, DSM header and one DSM block).
pub type HkrootMessage = [u8; HKROOT_MESSAGE_BYTES];
/// MACK message (tags, tag-infos and disclosed TESLA key).
pub type MackMessage = [u8; MACK_MESSAGE_BYTES];

/// Size in bytes of a DSM block.
pub const DSM_BLOCK_BYTES: usize = 13;
/// DSM block.
pub type DsmBlock = [u8; DSM_BLOCK_BYTES];

/// Node of the OSNMA Merkle tree (a SHA-256 hash).
pub type MerkleTreeNode = [u8; 32];

/// Size in bytes of an INAV word.
pub const INAV_WORD_BYTES: usize = 16;
/// INAV word (the 128 data bits of the even and odd pages of a nominal page).
pub type InavWord = [u8; INAV_WORD_BYTES];

/// Big-endian bit slice over bytes, used for every OSNMA bit field.
pub type BitSlice = bitvec::slice::BitSlice<u8, bitvec::order::Msb0>;

/// INAV band.
///
/// Timing parameters are only taken from E1-B words.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum InavBand {
    /// E1-B band.
    E1B,
    /// E5b-I band.
    E5B,
}

/// Validated status.
///
/// The object holding it has gone through all the cryptographic checks that
/// link it to the trust anchor.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Validated {}

/// Not validated status.
///
/// The object holding it has been parsed from untrusted input and has not
/// been checked yet.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct NotValidated {}
