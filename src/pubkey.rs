//! ECDSA public keys.
//!
//! The OSNMA public key signs the DSM-KROOT messages. It is either loaded at
//! start-up from trusted storage or received in a DSM-PKR and validated
//! against the Merkle tree. The [`PublicKey`] type carries its validation
//! status, so that only validated keys can be used to verify a KROOT.

use crate::bitfields::{DsmPkr, NewPublicKeyType};
use crate::types::{NotValidated, Validated};
use core::fmt;
use signature::Verifier;

/// ECDSA verifying key of one of the curves supported by OSNMA.
#[derive(Clone)]
pub enum VerifyingKey {
    /// ECDSA P-256/SHA-256 key.
    P256(p256::ecdsa::VerifyingKey),
    /// ECDSA P-521/SHA-512 key.
    #[cfg(feature = "p521")]
    P521(p521::ecdsa::VerifyingKey),
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyingKey::P256(key) => f
                .debug_tuple("P256")
                .field(&key.to_encoded_point(true))
                .finish(),
            #[cfg(feature = "p521")]
            VerifyingKey::P521(_) => f.debug_tuple("P521").finish(),
        }
    }
}

/// OSNMA public key.
///
/// The key is stored together with its public key ID (PKID), which the
/// DSM-KROOT references.
#[derive(Debug, Clone)]
pub struct PublicKey<V> {
    key: VerifyingKey,
    public_key_id: u8,
    _validated: V,
}

impl PublicKey<NotValidated> {
    /// Creates a public key from a P-256 verifying key.
    pub fn from_p256(key: p256::ecdsa::VerifyingKey, public_key_id: u8) -> Self {
        PublicKey {
            key: VerifyingKey::P256(key),
            public_key_id,
            _validated: NotValidated {},
        }
    }

    /// Creates a public key from a P-521 verifying key.
    #[cfg(feature = "p521")]
    pub fn from_p521(key: p521::ecdsa::VerifyingKey, public_key_id: u8) -> Self {
        PublicKey {
            key: VerifyingKey::P521(key),
            public_key_id,
            _validated: NotValidated {},
        }
    }

    /// Parses the new public key carried in a DSM-PKR.
    ///
    /// The key is not validated. Use
    /// [`MerkleTree::validate_pkr`](crate::merkle_tree::MerkleTree::validate_pkr)
    /// to obtain a validated key.
    pub fn from_dsm_pkr(dsm_pkr: DsmPkr) -> Result<Self, PublicKeyError> {
        let bytes = dsm_pkr
            .new_public_key()
            .ok_or(PublicKeyError::ReservedField)?;
        let id = dsm_pkr.new_public_key_id();
        match dsm_pkr.new_public_key_type() {
            NewPublicKeyType::EcdsaP256Sha256 => {
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|_| PublicKeyError::InvalidPoint)?;
                Ok(Self::from_p256(key, id))
            }
            #[cfg(feature = "p521")]
            NewPublicKeyType::EcdsaP521Sha512 => {
                let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|_| PublicKeyError::InvalidPoint)?;
                Ok(Self::from_p521(key, id))
            }
            #[cfg(not(feature = "p521"))]
            NewPublicKeyType::EcdsaP521Sha512 => Err(PublicKeyError::UnsupportedCurve),
            NewPublicKeyType::OsnmaAlertMessage | NewPublicKeyType::Reserved => {
                Err(PublicKeyError::ReservedField)
            }
        }
    }

    /// Marks the key as validated.
    ///
    /// This should only be used for keys loaded from trusted storage.
    pub fn force_valid(self) -> PublicKey<Validated> {
        PublicKey {
            key: self.key,
            public_key_id: self.public_key_id,
            _validated: Validated {},
        }
    }
}

impl<V> PublicKey<V> {
    /// Returns the public key ID.
    pub fn public_key_id(&self) -> u8 {
        self.public_key_id
    }

    /// Returns the verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }

    /// Returns the length in bytes of the signatures made with this key.
    pub fn signature_bytes(&self) -> usize {
        match &self.key {
            VerifyingKey::P256(_) => 64,
            #[cfg(feature = "p521")]
            VerifyingKey::P521(_) => 132,
        }
    }

    /// Returns `true` if both keys have the same PKID and the same point.
    pub fn same_key<W>(&self, other: &PublicKey<W>) -> bool {
        self.public_key_id == other.public_key_id
            && match (&self.key, &other.key) {
                (VerifyingKey::P256(a), VerifyingKey::P256(b)) => a == b,
                #[cfg(feature = "p521")]
                (VerifyingKey::P521(a), VerifyingKey::P521(b)) => {
                    a.to_encoded_point(true) == b.to_encoded_point(true)
                }
                #[cfg(feature = "p521")]
                _ => false,
            }
    }
}

impl PublicKey<Validated> {
    /// Verifies an ECDSA signature in raw `r || s` format.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match &self.key {
            VerifyingKey::P256(key) => match p256::ecdsa::Signature::from_slice(signature) {
                Ok(signature) => key.verify(message, &signature).is_ok(),
                Err(_) => false,
            },
            #[cfg(feature = "p521")]
            VerifyingKey::P521(key) => match p521::ecdsa::Signature::from_slice(signature) {
                Ok(signature) => key.verify(message, &signature).is_ok(),
                Err(_) => false,
            },
        }
    }
}

/// Errors produced when parsing a public key from a DSM-PKR.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PublicKeyError {
    /// The key type is reserved or the message is too short.
    ReservedField,
    /// The bytes are not a valid point of the curve.
    InvalidPoint,
    /// The key uses P-521, but support for it is not compiled in.
    UnsupportedCurve,
}

impl fmt::Display for PublicKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKeyError::ReservedField => "reserved value present in some field".fmt(f),
            PublicKeyError::InvalidPoint => "invalid elliptic curve point".fmt(f),
            PublicKeyError::UnsupportedCurve => "unsupported elliptic curve".fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PublicKeyError {}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    fn osnma_pubkey() -> PublicKey<Validated> {
        // OSNMA_PublicKey_20240115100000_newPKID_1
        let point = hex!(
            "04 03 b2 ce 64 bc 20 7b dd 8b c4 df 85 91 87 fc
             b6 86 32 0d 63 ff a0 91 41 0f c1 58 fb b7 79 80
             ea 88 68 4d 91 8c f0 27 28 8e bc b3 f3 8a fc 73
             e0 a0 b9 0e da 28 d0 f3 10 19 c8 37 4f 07 57 47
             49"
        );
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point).unwrap();
        PublicKey::from_p256(key, 1).force_valid()
    }

    #[test]
    fn verify_kroot_signature() {
        let message = hex!(
            "82 10 49 22 04 E0 60 61 0B DF 26 D7 7B 5B F8 C9
             CB FC F7 04 22 08 14 75 FD 44 5D F0 FF"
        );
        let mut signature = hex!(
            "F8 CD 88 29 9F A4 60 58 00 20 7B FE BE AC 55 02
             40 53 F3 0F 7C 69 B3 5C 15 E6 08 00 AC 3B 6F E3
             ED 06 39 95 2F 7B 02 8D 86 86 74 45 96 1F FE 94
             FB 22 6B FF 70 06 E0 C4 51 EE 3F 87 28 C1 77 FB"
        );
        let pubkey = osnma_pubkey();
        assert_eq!(pubkey.signature_bytes(), 64);
        assert!(pubkey.verify(&message, &signature));
        signature[10] ^= 0x80;
        assert!(!pubkey.verify(&message, &signature));
        assert!(!pubkey.verify(&message, &signature[..63]));
    }

    #[test]
    fn same_key() {
        let a = osnma_pubkey();
        let b = osnma_pubkey();
        assert!(a.same_key(&b));
        let c = PublicKey::from_p256(b.verifying_key_p256().clone(), 2);
        assert!(!a.same_key(&c));
    }

    impl PublicKey<Validated> {
        fn verifying_key_p256(&self) -> &p256::ecdsa::VerifyingKey {
            match &self.key {
                VerifyingKey::P256(key) => key,
                #[cfg(feature = "p521")]
                VerifyingKey::P521(_) => unreachable!(),
            }
        }
    }
}
