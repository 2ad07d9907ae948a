//! Merkle tree.
//!
//! This module authenticates the public keys and alert messages carried in
//! DSM-PKR messages against the root of the OSNMA Merkle tree.

use crate::bitfields::{DsmPkr, NewPublicKeyType};
use crate::crypto;
use crate::pubkey::{PublicKey, PublicKeyError};
use crate::types::{MerkleTreeNode, Validated};
use core::fmt;

const MERKLE_TREE_DEPTH: usize = 4;

/// Merkle tree.
///
/// Only the root of the tree is stored. It is loaded from trusted storage.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MerkleTree {
    root: MerkleTreeNode,
}

/// Contents of a DSM-PKR that has been authenticated by the Merkle tree.
#[derive(Debug, Clone)]
pub enum PkrUpdate {
    /// A new public key.
    PublicKey(PublicKey<Validated>),
    /// An OSNMA Alert Message: the public key and the TESLA chain must no
    /// longer be used.
    Alert,
}

impl MerkleTree {
    /// Creates a new Merkle tree from its root.
    pub fn new(root: MerkleTreeNode) -> MerkleTree {
        MerkleTree { root }
    }

    /// Returns the root of the tree.
    pub fn root(&self) -> &MerkleTreeNode {
        &self.root
    }

    /// Validates a DSM-PKR against this Merkle tree.
    ///
    /// The leaf (NPKT, NPKID and NPK) is hashed and combined with the four
    /// intermediate tree nodes, taking left or right positions according to
    /// the bits of the message ID. The result must equal the stored root.
    /// Then the DSM-PKR padding is checked.
    ///
    /// On success the validated public key, or the alert, is returned.
    pub fn validate_pkr(&self, dsm_pkr: DsmPkr) -> Result<PkrUpdate, PkrError> {
        let leaf = dsm_pkr.merkle_tree_leaf().ok_or(PkrError::ReservedField)?;
        let mut id = dsm_pkr.message_id();
        let mut node = crypto::sha256_concat(&[leaf]);
        for j in 0..MERKLE_TREE_DEPTH {
            let itn = dsm_pkr
                .intermediate_tree_node(j)
                .ok_or(PkrError::ReservedField)?;
            node = if id & 1 == 0 {
                crypto::merkle_node(&node, itn)
            } else {
                crypto::merkle_node(itn, &node)
            };
            id >>= 1;
        }
        if node != self.root {
            return Err(PkrError::Invalid);
        }
        if !dsm_pkr.check_padding(&self.root) {
            return Err(PkrError::WrongPadding);
        }
        if dsm_pkr.new_public_key_type() == NewPublicKeyType::OsnmaAlertMessage {
            log::warn!("authenticated OSNMA alert message {:?}", dsm_pkr);
            return Ok(PkrUpdate::Alert);
        }
        let key = PublicKey::from_dsm_pkr(dsm_pkr).map_err(PkrError::PublicKey)?;
        Ok(PkrUpdate::PublicKey(key.force_valid()))
    }
}

/// Errors produced during validation of the DSM-PKR using the Merkle tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PkrError {
    /// One of the fields in the DSM-PKR needed to interpret it has a reserved
    /// value.
    ReservedField,
    /// The computed Merkle tree root value does not match the stored root.
    Invalid,
    /// The DSM-PKR padding is wrong.
    WrongPadding,
    /// The public key cannot be decoded.
    PublicKey(PublicKeyError),
}

impl fmt::Display for PkrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkrError::ReservedField => "reserved value present in some field".fmt(f),
            PkrError::Invalid => "wrong calculated Merkle tree root".fmt(f),
            PkrError::WrongPadding => "wrong DSM-PKR padding".fmt(f),
            PkrError::PublicKey(e) => write!(f, "invalid public key ({e})"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PkrError {}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use hex_literal::hex;

    // OSNMA_MerkleTree_20231213105954_PKID_1
    pub(crate) const MERKLE_TREE_ROOT: MerkleTreeNode =
        hex!("0E63F552C8021709043C239032EFFE941BF22C8389032F5F2701E0FBC80148B8");

    fn merkle_tree() -> MerkleTree {
        MerkleTree::new(MERKLE_TREE_ROOT)
    }

    // DSM-PKR broadcast on 2023-12-12 12:00 UTC
    pub(crate) const DSM_PKR_0: [u8; 169] = hex!(
        "
            70 01 63 1b dc ed 79 d4 31 7b c2 87 0e e3 89 5b
            d5 9c f2 b6 ea 51 6f ab bf df 1d 73 96 26 14 6f
            fe 31 6f a9 28 5f 5a 1e 44 04 24 13 bd af 18 aa
            3c f6 84 72 33 97 d7 b8 32 5a ec a1 eb ca 9f 0f
            64 99 05 42 4c be 48 2a 1a 32 b0 10 64 f8 5d 0c
            36 df 03 8e 52 ce 12 8e 7e c5 f3 23 e1 65 b1 82
            a7 15 37 bd b0 10 97 2e b4 a3 b9 0b aa cd 14 94
            1e f4 0d a2 cb 2b 82 d3 78 b3 15 c0 08 de ce fd
            8e 11 03 74 a9 25 cf a0 ff 18 05 e5 c5 a5 8f db
            a3 1b f0 14 5d 5b 5b e2 f0 62 d3 f8 bb 2e e9 8f
            0f 6d b0 e8 23 c5 e7 5e 78"
    );

    #[test]
    fn message_0() {
        let mut dsm_buf = DSM_PKR_0;
        let mtree = merkle_tree();
        match mtree.validate_pkr(DsmPkr(&dsm_buf)) {
            Ok(PkrUpdate::PublicKey(key)) => assert_eq!(key.public_key_id(), 1),
            other => panic!("unexpected result {other:?}"),
        }

        // wrong padding
        let last = dsm_buf.len() - 1;
        dsm_buf[last] ^= 1;
        assert_eq!(
            mtree.validate_pkr(DsmPkr(&dsm_buf)).unwrap_err(),
            PkrError::WrongPadding
        );
        dsm_buf[last] ^= 1;

        // wrong intermediate tree node
        dsm_buf[40] ^= 1;
        assert_eq!(
            mtree.validate_pkr(DsmPkr(&dsm_buf)).unwrap_err(),
            PkrError::Invalid
        );
    }

    #[test]
    fn message_1() {
        // DSM-PKR broadcast on 2023-12-15 00:00 UTC
        let mut dsm_buf = hex!(
            "
            71 e5 53 0a 33 d5 cb 60 c9 50 16 b8 ae c7 45 93
            db cd f2 71 1d 39 9e a2 48 69 17 3c a2 29 37 9a
            15 31 6f a9 28 5f 5a 1e 44 04 24 13 bd af 18 aa
            3c f6 84 72 33 97 d7 b8 32 5a ec a1 eb ca 9f 0f
            64 99 05 42 4c be 48 2a 1a 32 b0 10 64 f8 5d 0c
            36 df 03 8e 52 ce 12 8e 7e c5 f3 23 e1 65 b1 82
            a7 15 37 bd b0 10 97 2e b4 a3 b9 0b aa cd 14 94
            1e f4 0d a2 cb 2b 82 d3 78 b3 15 c0 08 de ce fd
            8e 12 03 35 78 e5 c7 11 a9 c3 bd dd 1c a4 ee 85
            f7 c5 1b 36 78 97 cb 40 b8 85 68 a0 c8 97 da 30
            ef b7 c3 24 e0 22 2c 90 80"
        );
        let mtree = merkle_tree();
        match mtree.validate_pkr(DsmPkr(&dsm_buf)) {
            Ok(PkrUpdate::PublicKey(key)) => assert_eq!(key.public_key_id(), 2),
            other => panic!("unexpected result {other:?}"),
        }
        // inject error
        dsm_buf[123] ^= 1;
        assert_eq!(
            mtree.validate_pkr(DsmPkr(&dsm_buf)).unwrap_err(),
            PkrError::Invalid
        );
    }

    #[test]
    fn truncated_message() {
        let dsm_buf = [0x70; 100];
        assert_eq!(
            merkle_tree().validate_pkr(DsmPkr(&dsm_buf)).unwrap_err(),
            PkrError::ReservedField
        );
    }
}
