//! Key derivation for the SecureChat protocol
//!
//! Two constructions are used:
//!
//! - **Label derivation** ([`SymmetricKey::derive_key`]): `HMAC-SHA256(key,
//!   label)` with a one-byte domain label. Deterministic, and distinct labels
//!   give independent outputs. Drives the symmetric chain ratchet.
//! - **HKDF-SHA256** ([`combine_keys`], [`ratchet_root`]): mixes fresh DH
//!   output into key material, for the handshake and the DH ratchet step.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};
use crate::keys::SharedSecret;

/// HKDF using SHA-256 for key derivation
pub type HkdfSha256 = Hkdf<Sha256>;

/// HMAC-SHA256 for label derivation
pub type HmacSha256 = Hmac<Sha256>;

/// Size of every symmetric key in the protocol
pub const KEY_SIZE: usize = 32;

/// One-byte domain labels
pub mod label {
    /// Handshake check value, compared out of band
    pub const HANDSHAKE_CHECK: u8 = 0x11;
    /// Ratcheting the root key after a chain was derived from it
    pub const ROOT: u8 = 0x22;
    /// Advancing a chain key
    pub const CHAIN: u8 = 0x33;
    /// Deriving a message key from a chain key
    pub const KEY: u8 = 0x44;
}

/// Prefix mixed in ahead of the handshake DH outputs
const COMBINE_PREFIX: [u8; 32] = [0xFF; 32];

/// A 256-bit symmetric key with automatic zeroization
///
/// Root keys, chain keys, message keys and handshake check values all use
/// this type.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Derive a new key from this one under a domain label
    pub fn derive_key(&self, label: u8) -> SymmetricKey {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.0)
            .expect("HMAC can take key of any size");
        mac.update(&[label]);
        let result = mac.finalize().into_bytes();

        let mut output = [0u8; KEY_SIZE];
        output.copy_from_slice(&result);
        SymmetricKey(output)
    }

    /// Base64 text form, used for check values at the API edge
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// True once the key bytes have been wiped
    pub fn is_zeroized(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Key derivation context for HKDF operations
pub struct KeyDerivationContext {
    hkdf: HkdfSha256,
}

impl KeyDerivationContext {
    /// Create a new KDF context from input key material
    pub fn new(salt: Option<&[u8]>, ikm: &[u8]) -> Self {
        Self {
            hkdf: HkdfSha256::new(salt, ikm),
        }
    }

    /// Derive a key under a one-byte label
    pub fn derive(&self, label: u8) -> Result<SymmetricKey> {
        let mut output = [0u8; KEY_SIZE];
        self.hkdf
            .expand(&[label], &mut output)
            .map_err(|_| CryptoError::KeyDerivation("HKDF expansion failed".to_string()))?;
        Ok(SymmetricKey(output))
    }
}

/// Combine handshake DH outputs into one root key
///
/// Order-sensitive: both parties must pass the agreements in the same order.
pub fn combine_keys(secrets: &[&SharedSecret]) -> Result<SymmetricKey> {
    let mut ikm = Vec::with_capacity(COMBINE_PREFIX.len() + secrets.len() * KEY_SIZE);
    ikm.extend_from_slice(&COMBINE_PREFIX);
    for secret in secrets {
        ikm.extend_from_slice(secret.as_bytes());
    }

    let root = KeyDerivationContext::new(None, &ikm).derive(label::ROOT);
    ikm.zeroize();
    root
}

/// Root-key ratchet: mix a DH output into the root key
///
/// Returns `(new_root_key, chain_key)`.
pub fn ratchet_root(
    root_key: &SymmetricKey,
    dh_output: &SharedSecret,
) -> Result<(SymmetricKey, SymmetricKey)> {
    let kdf = KeyDerivationContext::new(Some(root_key.as_bytes()), dh_output.as_bytes());

    let new_root_key = kdf.derive(label::ROOT)?;
    let chain_key = kdf.derive(label::CHAIN)?;

    Ok((new_root_key, chain_key))
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
