//! Cryptographic primitives.
//!
//! Thin stateless wrappers around the RustCrypto crates used by OSNMA:
//! SHA-256 and SHA3-256 for the TESLA one-way function and the Merkle tree,
//! HMAC-SHA-256 and CMAC-AES for tags and MACSEQ, and truncated MAC
//! comparison. ECDSA verification lives in [`pubkey`](crate::pubkey).

use crate::tesla::{HashFunction, MacFunction};
use crate::types::{BitSlice, MerkleTreeNode};
use aes::{Aes128, Aes192, Aes256};
use cmac::Cmac;
use crypto_common::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;

/// Output size in bytes of the largest MAC or hash used by OSNMA.
pub const MAX_MAC_BYTES: usize = 32;

/// Computes the SHA-256 of the concatenation of `parts`.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hash = Sha256::new();
    for part in parts {
        hash.update(part);
    }
    hash.finalize().into()
}

/// Computes the hash of `data` with the hash function of a TESLA chain.
pub fn hash(function: HashFunction, data: &[u8]) -> [u8; 32] {
    match function {
        HashFunction::Sha256 => Sha256::digest(data).into(),
        HashFunction::Sha3_256 => Sha3_256::digest(data).into(),
    }
}

/// Combines two Merkle tree nodes into their parent.
pub fn merkle_node(left: &MerkleTreeNode, right: &MerkleTreeNode) -> MerkleTreeNode {
    sha256_concat(&[left, right])
}

/// Computes HMAC-SHA-256.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut out = [0; MAX_MAC_BYTES];
    // HMAC accepts keys of any length
    let _ = mac_into::<Hmac<Sha256>>(key, message, &mut out);
    out
}

/// Computes the MAC of `message` with the MAC function of a TESLA chain.
///
/// The output is written to the start of `out` and its length is returned.
/// CMAC-AES selects AES-128, AES-192 or AES-256 from the key length.
/// Returns `None` if the key length is not valid for the MAC function.
pub fn mac(
    function: MacFunction,
    key: &[u8],
    message: &[u8],
    out: &mut [u8; MAX_MAC_BYTES],
) -> Option<usize> {
    match (function, key.len()) {
        (MacFunction::HmacSha256, _) => mac_into::<Hmac<Sha256>>(key, message, out),
        (MacFunction::CmacAes, 16) => mac_into::<Cmac<Aes128>>(key, message, out),
        (MacFunction::CmacAes, 24) => mac_into::<Cmac<Aes192>>(key, message, out),
        (MacFunction::CmacAes, 32) => mac_into::<Cmac<Aes256>>(key, message, out),
        (MacFunction::CmacAes, len) => {
            log::error!("invalid CMAC-AES key length {len}");
            None
        }
    }
}

fn mac_into<M: Mac + KeyInit>(
    key: &[u8],
    message: &[u8],
    out: &mut [u8; MAX_MAC_BYTES],
) -> Option<usize> {
    let mut mac = <M as Mac>::new_from_slice(key).ok()?;
    mac.update(message);
    let mac = mac.finalize().into_bytes();
    let len = mac.len().min(MAX_MAC_BYTES);
    out[..len].copy_from_slice(&mac[..len]);
    Some(len)
}

/// Compares the leading bits of a computed MAC with a received tag.
///
/// Returns `false` if the tag is longer than the MAC.
pub fn truncated_eq(computed: &[u8], tag: &BitSlice) -> bool {
    let computed = BitSlice::from_slice(computed);
    tag.len() <= computed.len() && computed[..tag.len()] == *tag
}
