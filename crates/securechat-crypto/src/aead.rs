//! Authenticated Encryption with Associated Data (AEAD)
//!
//! XChaCha20-Poly1305 with random 192-bit nonces. The large nonce makes
//! random generation safe without a counter.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead as _, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305;
use rand::RngCore;

use crate::error::{CryptoError, Result};
use crate::kdf::SymmetricKey;
use crate::MAX_MESSAGE_SIZE;

/// Nonce size for XChaCha20-Poly1305 (192 bits)
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (128 bits)
pub const TAG_SIZE: usize = 16;

/// Nonce (number used once) for AEAD
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a random nonce
    pub fn random() -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self(nonce)
    }

    /// Parse a nonce from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let nonce: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: NONCE_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(nonce))
    }

    /// Parse a base64 encoded nonce
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Get nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Base64 text form
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

/// Encrypt `plaintext` under `key`, binding `aad` into the tag
///
/// Returns ciphertext with the 16-byte tag appended.
pub fn seal(key: &SymmetricKey, nonce: &Nonce, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() > MAX_MESSAGE_SIZE {
        return Err(CryptoError::MessageTooLarge {
            size: plaintext.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .encrypt(
            nonce.as_bytes().into(),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed("XChaCha20-Poly1305 failed".to_string()))
}

/// Decrypt and authenticate `ciphertext`
///
/// Every failure, whatever its cause, is reported as
/// [`CryptoError::AuthenticationFailed`].
pub fn open(key: &SymmetricKey, nonce: &Nonce, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(
            nonce.as_bytes().into(),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}
