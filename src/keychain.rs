//! TESLA key chain management.
//!
//! The [`KeyChain`] holds the KROOT that anchors the chain and a bounded
//! history of the keys that have been validated from it. New keys disclosed
//! in MACK messages are validated against the latest validated key, and the
//! keys needed to check tags are derived from the history.

use crate::slots::Ring;
use crate::storage::StaticStorage;
use crate::tesla::{Key, ValidationError};
use crate::types::{NotValidated, Validated};
use crate::Gst;

/// TESLA key chain.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct KeyChain<S: StaticStorage> {
    kroot: Option<Key<Validated>>,
    // keys in increasing GST order
    history: Ring<Key<Validated>, S::KeyHistory>,
}

/// Result of setting a new KROOT.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Reanchor {
    /// The KROOT is the one in use. Nothing has changed.
    Unchanged,
    /// The KROOT has replaced the previous one (if any) and the key history
    /// has been cleared.
    Replaced,
}

/// Result of a successful key verification.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum KeyOutcome {
    /// The key is new and has been validated. It is now the anchor.
    Verified(Key<Validated>),
    /// The key is the current anchor.
    AlreadyKnown,
}

impl<S: StaticStorage> KeyChain<S> {
    /// Creates an empty key chain.
    pub fn new() -> KeyChain<S> {
        KeyChain {
            kroot: None,
            history: Ring::new(),
        }
    }

    /// Sets the KROOT of the chain.
    ///
    /// A KROOT equal to the current one is ignored. Otherwise the key history
    /// is discarded and the KROOT becomes the anchor.
    pub fn reanchor(&mut self, kroot: Key<Validated>) -> Reanchor {
        if self.kroot == Some(kroot) {
            return Reanchor::Unchanged;
        }
        log::info!("new KROOT {:?}", kroot);
        self.kroot = Some(kroot);
        self.history.clear();
        self.history.push(kroot);
        Reanchor::Replaced
    }

    /// Returns the KROOT, if there is one.
    pub fn kroot(&self) -> Option<&Key<Validated>> {
        self.kroot.as_ref()
    }

    /// Returns the latest validated key.
    pub fn anchor(&self) -> Option<&Key<Validated>> {
        self.history.iter().last()
    }

    /// Verifies a key disclosed in a MACK message.
    ///
    /// The key must be later than the anchor and linked to it by the one-way
    /// function. A key with the same GST and data as the anchor is reported
    /// as already known.
    pub fn verify_key(&mut self, key: &Key<NotValidated>) -> Result<KeyOutcome, ValidationError> {
        let anchor = *self.anchor().ok_or(ValidationError::NoAnchor)?;
        if key.gst_subframe() == anchor.gst_subframe() && key.chain() == anchor.chain() {
            return if key.data() == anchor.data() {
                Ok(KeyOutcome::AlreadyKnown)
            } else {
                Err(ValidationError::WrongOneWayFunction)
            };
        }
        let valid = anchor.validate_key(key)?;
        log::info!("new TESLA key {:?} validated by {:?}", valid, anchor);
        self.history.push(valid);
        Ok(KeyOutcome::Verified(valid))
    }

    /// Returns the validated key for the subframe that contains `gst`.
    ///
    /// The key is derived from the earliest key in the history that is not
    /// earlier than `gst`. Returns `None` if there is no such key, or if it
    /// is too far in the future.
    pub fn key_at(&self, gst: Gst) -> Option<Key<Validated>> {
        let gst = gst.gst_subframe();
        self.history
            .iter()
            .find(|k| k.gst_subframe() >= gst)
            .and_then(|k| k.derive(gst))
    }

    /// Discards the KROOT and all the validated keys.
    pub fn reset(&mut self) {
        self.kroot = None;
        self.history.clear();
    }
}

impl<S: StaticStorage> Default for KeyChain<S> {
    fn default() -> KeyChain<S> {
        KeyChain::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::{FullStorage, SmallStorage};
    use crate::tesla::test::test_chain;
    use hex_literal::hex;
    use proptest::prelude::*;

    // Keys broadcast on 2022-03-07 ~9:00 UTC
    fn kroot() -> Key<Validated> {
        Key::from_slice(
            &hex!("84 1e 1d e4 d4 58 c0 e9 84 24 76 e0 04 66 6c f3"),
            Gst::new(1176, 0x21 * 3600 - 30),
            &test_chain(),
        )
        .force_valid()
    }

    fn key_120930() -> Key<NotValidated> {
        Key::from_slice(
            &hex!("42 b4 19 da 6a da 1c 0a 3d 6f 56 a5 e5 dc 59 a7"),
            Gst::new(1176, 120930),
            &test_chain(),
        )
    }

    fn key_120960() -> Key<NotValidated> {
        Key::from_slice(
            &hex!("95 42 aa d4 7a bf 39 ba fe 56 68 61 af e8 80 b2"),
            Gst::new(1176, 120960),
            &test_chain(),
        )
    }

    #[test]
    fn verify_keys() {
        let mut chain = KeyChain::<FullStorage>::new();
        assert_eq!(
            chain.verify_key(&key_120930()),
            Err(ValidationError::NoAnchor)
        );
        assert_eq!(chain.reanchor(kroot()), Reanchor::Replaced);
        assert_eq!(chain.reanchor(kroot()), Reanchor::Unchanged);

        // a missed key is not needed to validate the next one
        let outcome = chain.verify_key(&key_120960()).unwrap();
        assert!(matches!(outcome, KeyOutcome::Verified(k) if k.data() == key_120960().data()));
        assert_eq!(
            chain.verify_key(&key_120960()),
            Ok(KeyOutcome::AlreadyKnown)
        );
        assert_eq!(
            chain.verify_key(&key_120930()),
            Err(ValidationError::DoesNotFollow)
        );
        let mut wrong = key_120960().data().to_vec();
        wrong[0] ^= 1;
        assert_eq!(
            chain.verify_key(&Key::from_slice(&wrong, Gst::new(1176, 120960), &test_chain())),
            Err(ValidationError::WrongOneWayFunction)
        );
        assert_eq!(
            chain.anchor().unwrap().gst_subframe(),
            Gst::new(1176, 120960)
        );

        // the missed key is derived from the later one
        let missed = chain.key_at(Gst::new(1176, 120945)).unwrap();
        assert_eq!(missed.data(), key_120930().data());
        assert_eq!(chain.key_at(Gst::new(1176, 120990)), None);
        assert_eq!(chain.key_at(kroot().gst_subframe()), Some(kroot()));

        chain.reset();
        assert!(chain.anchor().is_none());
        assert!(chain.kroot().is_none());
    }

    #[test]
    fn reanchor_clears_history() {
        let mut chain = KeyChain::<FullStorage>::new();
        chain.reanchor(kroot());
        chain.verify_key(&key_120930()).unwrap();
        let new_kroot =
            Key::from_slice(&[0x55; 16], Gst::new(1176, 120900), &test_chain()).force_valid();
        assert_eq!(chain.reanchor(new_kroot), Reanchor::Replaced);
        assert_eq!(chain.anchor(), Some(&new_kroot));
        assert_eq!(chain.key_at(Gst::new(1176, 120930)), None);
        assert_eq!(
            chain.verify_key(&key_120960()),
            Err(ValidationError::WrongOneWayFunction)
        );
    }

    proptest! {
        #[test]
        fn chain_property(
            top in proptest::array::uniform16(any::<u8>()),
            len in 2usize..40,
            flip in 0usize..16,
        ) {
            let chain_params = test_chain();
            let top_gst = Gst::new(1248, 345600);
            let top = Key::from_slice(&top, top_gst, &chain_params);
            // keys[j] is the key of subframe j after the root
            let mut keys = vec![top];
            for _ in 1..len {
                let previous = keys[keys.len() - 1].one_way_function();
                keys.push(previous);
            }
            keys.reverse();
            let mut chain = KeyChain::<SmallStorage>::new();
            chain.reanchor(keys[0].force_valid());
            for key in keys.iter().skip(1) {
                prop_assert!(matches!(chain.verify_key(key), Ok(KeyOutcome::Verified(_))));
            }
            // every key is derivable from the last one, even if the history
            // only holds a few keys
            for key in keys.iter() {
                let derived = chain.key_at(key.gst_subframe()).unwrap();
                prop_assert_eq!(derived.data(), key.data());
            }
            let mut data = [0; 16];
            data.copy_from_slice(top.data());
            data[flip] ^= 0x80;
            let forged = Key::from_slice(&data, top_gst.add_subframes(1), &chain_params);
            prop_assert_eq!(
                chain.verify_key(&forged),
                Err(ValidationError::WrongOneWayFunction)
            );
        }
    }
}
