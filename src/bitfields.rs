//! Message bit fields.
//!
//! This module contains zero-copy views over the OSNMA messages: the NMA
//! header, the DSM header, the DSM-KROOT and DSM-PKR messages and the MACK
//! message. The field layouts follow the OSNMA SIS ICD.

use crate::crypto;
use crate::gst::Wn;
use crate::types::{BitSlice, MackMessage, MerkleTreeNode, MACK_MESSAGE_BYTES};
use bitvec::prelude::*;
use core::fmt;

/// NMA header.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct NmaHeader(pub u8);

/// NMA status (NMAS field).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NmaStatus {
    /// Reserved value.
    Reserved,
    /// Test.
    Test,
    /// Operational.
    Operational,
    /// Don't use.
    DontUse,
}

impl NmaStatus {
    /// Returns the 2-bit code of the status, as used in tag messages.
    pub fn code(&self) -> u8 {
        match self {
            NmaStatus::Reserved => 0,
            NmaStatus::Test => 1,
            NmaStatus::Operational => 2,
            NmaStatus::DontUse => 3,
        }
    }
}

/// Chain and public key status (CPKS field).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChainAndPubkeyStatus {
    /// Reserved value.
    Reserved,
    /// Nominal.
    Nominal,
    /// End of chain.
    EndOfChain,
    /// Chain revoked.
    ChainRevoked,
    /// New public key.
    NewPublicKey,
    /// Public key revoked.
    PublicKeyRevoked,
    /// New Merkle tree.
    NewMerkleTree,
    /// Alert message.
    AlertMessage,
}

impl NmaHeader {
    /// Returns the NMA status.
    pub fn nma_status(&self) -> NmaStatus {
        match self.0 >> 6 {
            0 => NmaStatus::Reserved,
            1 => NmaStatus::Test,
            2 => NmaStatus::Operational,
            _ => NmaStatus::DontUse,
        }
    }

    /// Returns the ID of the TESLA chain in force.
    pub fn chain_id(&self) -> u8 {
        (self.0 >> 4) & 0x3
    }

    /// Returns the chain and public key status.
    pub fn chain_and_pubkey_status(&self) -> ChainAndPubkeyStatus {
        match (self.0 >> 1) & 0x7 {
            1 => ChainAndPubkeyStatus::Nominal,
            2 => ChainAndPubkeyStatus::EndOfChain,
            3 => ChainAndPubkeyStatus::ChainRevoked,
            4 => ChainAndPubkeyStatus::NewPublicKey,
            5 => ChainAndPubkeyStatus::PublicKeyRevoked,
            6 => ChainAndPubkeyStatus::NewMerkleTree,
            7 => ChainAndPubkeyStatus::AlertMessage,
            _ => ChainAndPubkeyStatus::Reserved,
        }
    }
}

impl fmt::Debug for NmaHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NmaHeader")
            .field("nma_status", &self.nma_status())
            .field("chain_id", &self.chain_id())
            .field("chain_and_pubkey_status", &self.chain_and_pubkey_status())
            .finish()
    }
}

/// DSM header.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DsmHeader(pub u8);

/// DSM type.
///
/// DSM IDs 0 to 11 carry DSM-KROOT messages and 12 to 15 carry DSM-PKR.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DsmType {
    /// DSM-KROOT.
    Kroot,
    /// DSM-PKR.
    Pkr,
}

impl DsmHeader {
    /// Returns the DSM ID.
    pub fn dsm_id(&self) -> u8 {
        self.0 >> 4
    }

    /// Returns the index of the block inside the DSM.
    pub fn dsm_block_id(&self) -> u8 {
        self.0 & 0xf
    }

    /// Returns the DSM type given by the DSM ID.
    pub fn dsm_type(&self) -> DsmType {
        if self.dsm_id() >= 12 {
            DsmType::Pkr
        } else {
            DsmType::Kroot
        }
    }
}

impl fmt::Debug for DsmHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsmHeader")
            .field("dsm_id", &self.dsm_id())
            .field("dsm_block_id", &self.dsm_block_id())
            .field("dsm_type", &self.dsm_type())
            .finish()
    }
}

/// Number of DSM blocks, given the DSM type and the NB field of block 0.
///
/// Returns `None` for reserved NB values.
pub fn number_of_blocks(dsm_type: DsmType, nb: u8) -> Option<usize> {
    match dsm_type {
        DsmType::Kroot if (1..=8).contains(&nb) => Some(usize::from(nb) + 6),
        DsmType::Pkr if (7..=10).contains(&nb) => Some(usize::from(nb) + 6),
        _ => None,
    }
}

/// Hash function field of the DSM-KROOT.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HashFunction {
    /// SHA-256.
    Sha256,
    /// SHA3-256.
    Sha3_256,
    /// Reserved value.
    Reserved,
}

/// MAC function field of the DSM-KROOT.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MacFunction {
    /// HMAC-SHA-256.
    HmacSha256,
    /// CMAC-AES.
    CmacAes,
    /// Reserved value.
    Reserved,
}

/// DSM-KROOT message.
///
/// The slice contains the whole reassembled DSM, including the digital
/// signature and the padding. Accessors that depend on variable-length
/// fields return `None` when the message is too short for them.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DsmKroot<'a>(pub &'a [u8]);

/// Length in bytes of the fixed part of the DSM-KROOT that precedes the
/// KROOT.
const KROOT_HEADER_BYTES: usize = 13;

impl DsmKroot<'_> {
    fn bits(&self) -> &BitSlice {
        BitSlice::from_slice(self.0)
    }

    fn byte(&self, n: usize) -> u8 {
        self.0.get(n).copied().unwrap_or(0)
    }

    /// Returns the number of DSM blocks, or `None` for a reserved NB_DK.
    pub fn number_of_blocks(&self) -> Option<usize> {
        number_of_blocks(DsmType::Kroot, self.byte(0) >> 4)
    }

    /// Returns the ID of the public key used to sign the KROOT.
    pub fn public_key_id(&self) -> u8 {
        self.byte(0) & 0xf
    }

    /// Returns the chain ID of the KROOT.
    pub fn kroot_chain_id(&self) -> u8 {
        self.byte(1) >> 6
    }

    /// Returns the hash function used by the TESLA chain.
    pub fn hash_function(&self) -> HashFunction {
        match (self.byte(1) >> 2) & 0x3 {
            0 => HashFunction::Sha256,
            2 => HashFunction::Sha3_256,
            _ => HashFunction::Reserved,
        }
    }

    /// Returns the MAC function used for the tags.
    pub fn mac_function(&self) -> MacFunction {
        match self.byte(1) & 0x3 {
            0 => MacFunction::HmacSha256,
            1 => MacFunction::CmacAes,
            _ => MacFunction::Reserved,
        }
    }

    /// Returns the key size in bits, or `None` for a reserved value.
    pub fn key_size(&self) -> Option<usize> {
        match self.byte(2) >> 4 {
            0 => Some(96),
            1 => Some(104),
            2 => Some(112),
            3 => Some(120),
            4 => Some(128),
            5 => Some(160),
            6 => Some(192),
            7 => Some(224),
            8 => Some(256),
            _ => None,
        }
    }

    /// Returns the tag size in bits, or `None` for a reserved value.
    pub fn tag_size(&self) -> Option<usize> {
        match self.byte(2) & 0xf {
            5 => Some(20),
            6 => Some(24),
            7 => Some(28),
            8 => Some(32),
            9 => Some(40),
            _ => None,
        }
    }

    /// Returns the MAC Look-up Table ID.
    pub fn mac_lookup_table(&self) -> u8 {
        self.byte(3)
    }

    /// Returns the week number of the KROOT.
    pub fn kroot_wn(&self) -> Wn {
        if self.0.len() < KROOT_HEADER_BYTES {
            return 0;
        }
        self.bits()[36..48].load_be::<Wn>()
    }

    /// Returns the time of week of the KROOT, in hours.
    pub fn kroot_towh(&self) -> u8 {
        self.byte(6)
    }

    /// Returns the 48-bit random pattern alpha.
    pub fn alpha(&self) -> u64 {
        if self.0.len() < KROOT_HEADER_BYTES {
            return 0;
        }
        self.bits()[56..104].load_be::<u64>()
    }

    /// Returns the KROOT.
    pub fn kroot(&self) -> Option<&[u8]> {
        let size = self.key_size()? / 8;
        self.0.get(KROOT_HEADER_BYTES..KROOT_HEADER_BYTES + size)
    }

    /// Returns the digital signature, given its length in bytes.
    pub fn digital_signature(&self, signature_bytes: usize) -> Option<&[u8]> {
        let start = KROOT_HEADER_BYTES + self.key_size()? / 8;
        self.0.get(start..start + signature_bytes)
    }

    /// Returns the padding that follows the digital signature.
    pub fn padding(&self, signature_bytes: usize) -> Option<&[u8]> {
        let start = KROOT_HEADER_BYTES + self.key_size()? / 8 + signature_bytes;
        self.0.get(start..)
    }

    /// Writes the message signed by the digital signature into `buffer`.
    ///
    /// The message is the NMA header followed by the DSM-KROOT from the
    /// chain ID field up to the end of the KROOT. Returns the number of bytes
    /// written.
    pub fn signed_message(&self, nma_header: NmaHeader, buffer: &mut [u8; 45]) -> Option<usize> {
        let end = KROOT_HEADER_BYTES + self.key_size()? / 8;
        let body = self.0.get(1..end)?;
        buffer[0] = nma_header.0;
        buffer[1..1 + body.len()].copy_from_slice(body);
        Some(1 + body.len())
    }

    /// Checks the padding, which is the truncated SHA-256 of the signed
    /// message followed by the digital signature.
    pub fn check_padding(&self, nma_header: NmaHeader, signature_bytes: usize) -> bool {
        let mut message = [0; 45];
        let (Some(len), Some(signature), Some(padding)) = (
            self.signed_message(nma_header, &mut message),
            self.digital_signature(signature_bytes),
            self.padding(signature_bytes),
        ) else {
            return false;
        };
        let hash = crypto::sha256_concat(&[&message[..len], signature]);
        padding.len() <= hash.len() && hash[..padding.len()] == *padding
    }
}

impl fmt::Debug for DsmKroot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsmKroot")
            .field("number_of_blocks", &self.number_of_blocks())
            .field("public_key_id", &self.public_key_id())
            .field("kroot_chain_id", &self.kroot_chain_id())
            .field("hash_function", &self.hash_function())
            .field("mac_function", &self.mac_function())
            .field("key_size", &self.key_size())
            .field("tag_size", &self.tag_size())
            .field("mac_lookup_table", &self.mac_lookup_table())
            .field("kroot_wn", &self.kroot_wn())
            .field("kroot_towh", &self.kroot_towh())
            .field("alpha", &self.alpha())
            .field("kroot", &self.kroot())
            .finish()
    }
}

/// DSM-PKR message.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DsmPkr<'a>(pub &'a [u8]);

/// New public key type (NPKT field).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NewPublicKeyType {
    /// ECDSA P-256/SHA-256.
    EcdsaP256Sha256,
    /// ECDSA P-521/SHA-512.
    EcdsaP521Sha512,
    /// OSNMA Alert Message.
    OsnmaAlertMessage,
    /// Reserved value.
    Reserved,
}

const NPKT_OFFSET: usize = 129;
const NPK_OFFSET: usize = 130;
const MERKLE_TREE_DEPTH: usize = 4;

impl DsmPkr<'_> {
    /// Returns the number of DSM blocks, or `None` for a reserved NB_DP.
    pub fn number_of_blocks(&self) -> Option<usize> {
        number_of_blocks(DsmType::Pkr, self.0.first().copied().unwrap_or(0) >> 4)
    }

    /// Returns the message ID, which is the position of the key in the
    /// Merkle tree.
    pub fn message_id(&self) -> u8 {
        self.0.first().copied().unwrap_or(0) & 0xf
    }

    /// Returns the `n`-th intermediate tree node (`n` between 0 and 3).
    pub fn intermediate_tree_node(&self, n: usize) -> Option<&MerkleTreeNode> {
        if n >= MERKLE_TREE_DEPTH {
            return None;
        }
        let start = 1 + 32 * n;
        self.0.get(start..start + 32)?.try_into().ok()
    }

    /// Returns the type of the new public key.
    pub fn new_public_key_type(&self) -> NewPublicKeyType {
        match self.0.get(NPKT_OFFSET).map(|&b| b >> 4) {
            Some(1) => NewPublicKeyType::EcdsaP256Sha256,
            Some(3) => NewPublicKeyType::EcdsaP521Sha512,
            Some(4) => NewPublicKeyType::OsnmaAlertMessage,
            _ => NewPublicKeyType::Reserved,
        }
    }

    /// Returns the ID of the new public key.
    pub fn new_public_key_id(&self) -> u8 {
        self.0.get(NPKT_OFFSET).map(|&b| b & 0xf).unwrap_or(0)
    }

    fn key_bytes(&self) -> Option<usize> {
        match self.new_public_key_type() {
            NewPublicKeyType::EcdsaP256Sha256 => Some(33),
            NewPublicKeyType::EcdsaP521Sha512 => Some(67),
            // An alert message fills the whole DSM, without padding.
            NewPublicKeyType::OsnmaAlertMessage => self.0.len().checked_sub(NPK_OFFSET),
            NewPublicKeyType::Reserved => None,
        }
    }

    /// Returns the new public key (SEC1 compressed point).
    pub fn new_public_key(&self) -> Option<&[u8]> {
        self.0.get(NPK_OFFSET..NPK_OFFSET + self.key_bytes()?)
    }

    /// Returns the leaf of the Merkle tree, which is NPKT, NPKID and NPK.
    pub fn merkle_tree_leaf(&self) -> Option<&[u8]> {
        self.0.get(NPKT_OFFSET..NPK_OFFSET + self.key_bytes()?)
    }

    /// Returns the padding that follows the new public key.
    pub fn padding(&self) -> Option<&[u8]> {
        self.0.get(NPK_OFFSET + self.key_bytes()?..)
    }

    /// Checks the padding, which is the truncated SHA-256 of the Merkle tree
    /// root followed by the leaf.
    pub fn check_padding(&self, merkle_tree_root: &MerkleTreeNode) -> bool {
        let (Some(leaf), Some(padding)) = (self.merkle_tree_leaf(), self.padding()) else {
            return false;
        };
        let hash = crypto::sha256_concat(&[merkle_tree_root, leaf]);
        padding.len() <= hash.len() && hash[..padding.len()] == *padding
    }
}

impl fmt::Debug for DsmPkr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsmPkr")
            .field("number_of_blocks", &self.number_of_blocks())
            .field("message_id", &self.message_id())
            .field("new_public_key_type", &self.new_public_key_type())
            .field("new_public_key_id", &self.new_public_key_id())
            .field("new_public_key", &self.new_public_key())
            .finish()
    }
}

/// Authentication data and key delay (ADKD).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Adkd {
    /// Galileo I/NAV ephemeris, clock and status (ADKD=0).
    InavCed,
    /// Galileo I/NAV timing parameters (ADKD=4).
    InavTiming,
    /// Slow MAC: ephemeris, clock and status with extra key delay (ADKD=12).
    SlowMac,
    /// Reserved value.
    Reserved,
}

impl From<u8> for Adkd {
    fn from(value: u8) -> Adkd {
        match value {
            0 => Adkd::InavCed,
            4 => Adkd::InavTiming,
            12 => Adkd::SlowMac,
            _ => Adkd::Reserved,
        }
    }
}

impl Adkd {
    /// Returns the number of subframes between the MACK carrying a tag and
    /// the MACK disclosing its key.
    pub fn key_delay_subframes(&self) -> i64 {
        match self {
            Adkd::SlowMac => 11,
            _ => 1,
        }
    }
}

/// MACK message.
///
/// The layout depends on the key and tag sizes of the TESLA chain in force.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Mack<'a> {
    data: &'a BitSlice,
    key_size: usize,
    tag_size: usize,
    num_tags: usize,
}

/// Length in bits of a tag-info field.
pub const TAG_INFO_BITS: usize = 16;

impl<'a> Mack<'a> {
    /// Creates a view of a MACK message.
    ///
    /// The `key_size` and `tag_size` are given in bits, and should be valid
    /// values of the DSM-KROOT fields.
    ///
    /// The number of tags is the largest that fits in the message. Use
    /// [`Mack::with_num_tags`] to set the number given by the MAC Look-up
    /// Table.
    pub fn new(data: &'a MackMessage, key_size: usize, tag_size: usize) -> Mack<'a> {
        let num_tags = (MACK_MESSAGE_BYTES * 8).saturating_sub(key_size) / (tag_size + TAG_INFO_BITS);
        Mack {
            data: BitSlice::from_slice(data),
            key_size,
            tag_size,
            num_tags,
        }
    }

    /// Sets the number of tags in the message, including tag0.
    ///
    /// Returns `None` if the tags and the key do not fit in the message or
    /// `num_tags` is zero. The bits after the key are padding.
    pub fn with_num_tags(self, num_tags: usize) -> Option<Mack<'a>> {
        (num_tags >= 1 && num_tags <= self.num_tags).then_some(Mack { num_tags, ..self })
    }

    /// Returns the number of tags in the message, including tag0.
    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    /// Returns tag0.
    pub fn tag0(&self) -> &'a BitSlice {
        &self.data[..self.tag_size]
    }

    /// Returns the MACSEQ field.
    pub fn macseq(&self) -> u16 {
        self.data[self.tag_size..self.tag_size + 12].load_be::<u16>()
    }

    /// Returns the COP field that goes with tag0.
    pub fn cop(&self) -> u8 {
        self.data[self.tag_size + 12..self.tag_size + 16].load_be::<u8>()
    }

    /// Returns the `n`-th tag and its tag-info.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero or not smaller than [`Mack::num_tags`].
    pub fn tag_and_info(&self, n: usize) -> TagAndInfo<'a> {
        assert!(n >= 1 && n < self.num_tags());
        let size = self.tag_size + TAG_INFO_BITS;
        TagAndInfo(&self.data[size * n..size * (n + 1)])
    }

    /// Returns the disclosed TESLA key.
    pub fn key(&self) -> &'a BitSlice {
        let start = (self.tag_size + TAG_INFO_BITS) * self.num_tags();
        &self.data[start..start + self.key_size]
    }
}

impl fmt::Debug for Mack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mack")
            .field("tag0", &self.tag0())
            .field("macseq", &self.macseq())
            .field("cop", &self.cop())
            .field("num_tags", &self.num_tags())
            .field("key", &self.key())
            .finish()
    }
}

/// Tag and tag-info of a MACK message.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct TagAndInfo<'a>(pub &'a BitSlice);

impl<'a> TagAndInfo<'a> {
    /// Returns the tag.
    pub fn tag(&self) -> &'a BitSlice {
        &self.0[..self.0.len() - TAG_INFO_BITS]
    }

    /// Returns the tag-info (PRN_D, ADKD and COP).
    pub fn tag_info(&self) -> &'a BitSlice {
        &self.0[self.0.len() - TAG_INFO_BITS..]
    }

    /// Returns PRN_D.
    pub fn prnd(&self) -> u8 {
        self.tag_info()[..8].load_be::<u8>()
    }

    /// Returns the ADKD.
    pub fn adkd(&self) -> Adkd {
        Adkd::from(self.tag_info()[8..12].load_be::<u8>())
    }

    /// Returns the COP.
    pub fn cop(&self) -> u8 {
        self.tag_info()[12..16].load_be::<u8>()
    }
}

impl fmt::Debug for TagAndInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagAndInfo")
            .field("tag", &self.tag())
            .field("prnd", &self.prnd())
            .field("adkd", &self.adkd())
            .field("cop", &self.cop())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    // DSM-KROOT signed message broadcast on 2024-01-15
    const KROOT_BODY: [u8; 28] = hex!(
        "10 49 22 04 E0 60 61 0B DF 26 D7 7B 5B F8 C9 CB
         FC F7 04 22 08 14 75 FD 44 5D F0 FF"
    );

    #[test]
    fn nma_header() {
        let header = NmaHeader(0x82);
        assert_eq!(header.nma_status(), NmaStatus::Operational);
        assert_eq!(header.chain_id(), 0);
        assert_eq!(
            header.chain_and_pubkey_status(),
            ChainAndPubkeyStatus::Nominal
        );
    }

    #[test]
    fn dsm_kroot_fields() {
        let mut dsm = [0u8; 29];
        dsm[0] = 0x21;
        dsm[1..].copy_from_slice(&KROOT_BODY);
        let kroot = DsmKroot(&dsm);
        assert_eq!(kroot.number_of_blocks(), Some(8));
        assert_eq!(kroot.public_key_id(), 1);
        assert_eq!(kroot.kroot_chain_id(), 0);
        assert_eq!(kroot.hash_function(), HashFunction::Sha256);
        assert_eq!(kroot.mac_function(), MacFunction::HmacSha256);
        assert_eq!(kroot.key_size(), Some(128));
        assert_eq!(kroot.tag_size(), Some(40));
        assert_eq!(kroot.mac_lookup_table(), 34);
        assert_eq!(kroot.kroot_wn(), 1248);
        assert_eq!(kroot.kroot_towh(), 96);
        assert_eq!(kroot.alpha(), 0x610BDF26D77B);
        assert_eq!(
            kroot.kroot(),
            Some(&hex!("5B F8 C9 CB FC F7 04 22 08 14 75 FD 44 5D F0 FF")[..])
        );
        // Too short for the signature
        assert_eq!(kroot.digital_signature(64), None);
    }

    #[test]
    fn dsm_header() {
        let header = DsmHeader(0xc3);
        assert_eq!(header.dsm_id(), 12);
        assert_eq!(header.dsm_block_id(), 3);
        assert_eq!(header.dsm_type(), DsmType::Pkr);
        assert_eq!(number_of_blocks(DsmType::Pkr, 6), None);
        assert_eq!(number_of_blocks(DsmType::Kroot, 0), None);
        assert_eq!(number_of_blocks(DsmType::Kroot, 1), Some(7));
    }

    #[test]
    fn mack_layout() {
        let mut mack = [0u8; MACK_MESSAGE_BYTES];
        mack[..5].copy_from_slice(&hex!("11 22 33 44 55"));
        // MACSEQ = 0xabc, COP = 0xd
        mack[5..7].copy_from_slice(&hex!("ab cd"));
        // tag1 with PRND = 2, ADKD = 4, COP = 1
        mack[7..12].copy_from_slice(&hex!("01 02 03 04 05"));
        mack[12..14].copy_from_slice(&hex!("02 41"));
        let view = Mack::new(&mack, 128, 40);
        assert_eq!(view.num_tags(), 6);
        assert_eq!(view.macseq(), 0xabc);
        assert_eq!(view.cop(), 0xd);
        let tag = view.tag_and_info(1);
        assert_eq!(tag.prnd(), 2);
        assert_eq!(tag.adkd(), Adkd::InavTiming);
        assert_eq!(tag.cop(), 1);
        assert_eq!(tag.tag(), BitSlice::from_slice(&hex!("01 02 03 04 05")));
        assert_eq!(view.key().len(), 128);
        assert!(view.with_num_tags(7).is_none());
        assert!(view.with_num_tags(0).is_none());
        // key right after the last tag, followed by padding
        mack[35..37].copy_from_slice(&hex!("ff ee"));
        let view = Mack::new(&mack, 128, 40).with_num_tags(5).unwrap();
        assert_eq!(view.key()[..16], BitSlice::from_slice(&hex!("ff ee"))[..]);
    }
}
