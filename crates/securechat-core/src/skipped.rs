//! Bounded cache of message keys for messages not yet received
//!
//! Keys are indexed by the partner ratchet key of their epoch and the
//! message counter. When the cache is full the oldest insertion is evicted.

use std::collections::{HashMap, VecDeque};

use securechat_crypto::kdf::SymmetricKey;
use securechat_crypto::keys::PublicKey;
use tracing::warn;
use zeroize::Zeroize;

type SkippedKeyId = (PublicKey, u32);

/// Skipped message keys with insertion-order eviction
pub(crate) struct SkippedKeys {
    keys: HashMap<SkippedKeyId, SymmetricKey>,
    order: VecDeque<SkippedKeyId>,
    capacity: usize,
}

impl SkippedKeys {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            keys: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn get(&self, ratchet: &PublicKey, counter: u32) -> Option<&SymmetricKey> {
        self.keys.get(&(*ratchet, counter))
    }

    /// Remove a key after it was used; single use
    pub(crate) fn remove(&mut self, ratchet: &PublicKey, counter: u32) -> Option<SymmetricKey> {
        let id = (*ratchet, counter);
        let key = self.keys.remove(&id)?;
        self.order.retain(|entry| *entry != id);
        Some(key)
    }

    /// Insert a key, evicting the oldest entries beyond capacity
    pub(crate) fn insert(&mut self, ratchet: PublicKey, counter: u32, key: SymmetricKey) {
        let id = (ratchet, counter);
        if self.keys.insert(id, key).is_none() {
            self.order.push_back(id);
        }

        while self.keys.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.keys.remove(&oldest).is_some() {
                warn!(
                    counter = oldest.1,
                    ratchet = %oldest.0.fingerprint().short(),
                    "Evicted skipped message key"
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Zeroize for SkippedKeys {
    fn zeroize(&mut self) {
        for key in self.keys.values_mut() {
            key.zeroize();
        }
        self.keys.clear();
        self.order.clear();
    }
}
