//! Long-term identity
//!
//! One X25519 key pair per Chatter. The identity is deliberately not
//! `Clone`: sessions borrow it for the handshake DH computations and never
//! keep a copy.

use std::fmt;

use securechat_crypto::keys::{Fingerprint, KeyPair, PublicKey, SharedSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;

/// A long-term identity key pair
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    key_pair: KeyPair,
}

impl Identity {
    /// Generate a fresh identity
    pub fn generate() -> Self {
        Self::from_key_pair(KeyPair::generate())
    }

    /// Wrap an existing key pair
    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }

    /// Public identity key
    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }

    /// Fingerprint of the public identity key
    pub fn fingerprint(&self) -> Fingerprint {
        self.key_pair.public_key().fingerprint()
    }

    /// DH between the identity secret and `their_public`
    pub(crate) fn diffie_hellman(&self, their_public: &PublicKey) -> Result<SharedSecret> {
        Ok(self.key_pair.diffie_hellman(their_public)?)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &self.fingerprint().short())
            .finish_non_exhaustive()
    }
}
