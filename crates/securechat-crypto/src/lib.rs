//! # SecureChat Cryptographic Primitives
//!
//! The primitive layer consumed by the SecureChat session protocol. Nothing
//! here holds session state: every item is a value or a pure function.
//!
//! ## Core Components
//!
//! - [`keys`]: X25519 key pairs, public keys with stable byte/base64 forms,
//!   fingerprints and DH shared secrets
//! - [`kdf`]: symmetric keys, one-byte domain labels, HMAC label derivation,
//!   handshake secret combination and the root-key ratchet KDF
//! - [`aead`]: XChaCha20-Poly1305 seal/open with additional data
//!
//! ## Zeroization
//!
//! Secret-bearing types implement [`zeroize::Zeroize`] and wipe themselves
//! on drop. This is best effort: moves and compiler-introduced copies may
//! leave residues in memory that the library cannot reach.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keys;

pub use error::{CryptoError, Result};

/// Maximum plaintext size accepted by [`aead::seal`] (64 KB)
pub const MAX_MESSAGE_SIZE: usize = 65536;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aead::{open, seal, Nonce};
    pub use crate::error::{CryptoError, Result};
    pub use crate::kdf::{combine_keys, label, ratchet_root, SymmetricKey};
    pub use crate::keys::{Fingerprint, KeyPair, PublicKey, SharedSecret};
}
