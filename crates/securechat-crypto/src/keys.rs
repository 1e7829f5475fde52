//! Key types for the SecureChat protocol
//!
//! - [`KeyPair`]: X25519 key pair used both for long-term identities and for
//!   DH ratchet keys
//! - [`PublicKey`]: a 32-byte value type with structural equality and a
//!   content-based hash, usable directly as a map key
//! - [`Fingerprint`]: SHA-256 of the public key bytes
//! - [`SharedSecret`]: raw X25519 output, zeroized on drop

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

/// Size of X25519 public keys in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a public key fingerprint in bytes
pub const FINGERPRINT_SIZE: usize = 32;

/// An X25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Parse a serialized public key
    ///
    /// Rejects inputs of the wrong length and the all-zero point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; PUBLIC_KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_SIZE,
                    actual: bytes.len(),
                })?;

        if bytes == [0u8; PUBLIC_KEY_SIZE] {
            return Err(CryptoError::InvalidPublicKey(
                "all-zero point".to_string(),
            ));
        }

        Ok(Self(bytes))
    }

    /// Parse a base64 (standard alphabet) encoded public key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Stable byte serialization
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }

    /// Base64 (standard alphabet) text form
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Content-derived fixed-length identifier
    pub fn fingerprint(&self) -> Fingerprint {
        let digest = Sha256::digest(self.0);
        let mut fingerprint = [0u8; FINGERPRINT_SIZE];
        fingerprint.copy_from_slice(&digest);
        Fingerprint(fingerprint)
    }

    fn to_x25519(self) -> X25519PublicKey {
        X25519PublicKey::from(self.0)
    }
}

impl From<&X25519PublicKey> for PublicKey {
    fn from(key: &X25519PublicKey) -> Self {
        Self(*key.as_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint().short())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(de::Error::custom)
    }
}

/// Fingerprint of a public key (SHA-256 over the key bytes)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex::serde")] pub [u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    /// Get as hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get as base64 string
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// First eight hex characters, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Format for human display (groups of 4 hex chars)
    pub fn to_display(&self) -> String {
        let hex = self.to_hex();
        hex.as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display())
    }
}

/// An X25519 key pair for Diffie-Hellman key exchange
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    /// The secret key (zeroized on drop)
    secret: X25519StaticSecret,
    /// The public key
    #[zeroize(skip)]
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair from the OS RNG
    pub fn generate() -> Self {
        let secret = X25519StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&X25519PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Create from existing secret bytes
    ///
    /// # Security
    /// The input bytes should come from a secure random source
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = X25519StaticSecret::from(bytes);
        let public = PublicKey::from(&X25519PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Perform X25519 Diffie-Hellman with the partner's public key
    ///
    /// Fails for low-order points, whose output does not depend on our secret.
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> Result<SharedSecret> {
        let shared = self.secret.diffie_hellman(&their_public.to_x25519());
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidPublicKey("low-order point".to_string()));
        }
        Ok(SharedSecret(*shared.as_bytes()))
    }

    /// True once the secret scalar has been wiped
    pub fn is_zeroized(&self) -> bool {
        self.secret.as_bytes().iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A shared secret derived from Diffie-Hellman key exchange
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(pub(crate) [u8; 32]);

impl SharedSecret {
    /// Get the secret bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for SharedSecret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_keypair_generation() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();

        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_diffie_hellman_exchange() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let alice_shared = alice.diffie_hellman(&bob.public_key()).unwrap();
        let bob_shared = bob.diffie_hellman(&alice.public_key()).unwrap();

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn test_diffie_hellman_rejects_low_order_points() {
        let alice = KeyPair::generate();

        // u = 1 is a point of order 4; it parses but contributes nothing
        let mut one = [0u8; 32];
        one[0] = 1;
        let low_order = PublicKey::from_bytes(&one).unwrap();

        assert!(matches!(
            alice.diffie_hellman(&low_order),
            Err(CryptoError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_public_key_is_value_type() {
        let kp = KeyPair::generate();
        let a = kp.public_key();
        let b = PublicKey::from_bytes(&a.to_bytes()).unwrap();

        let mut map = HashMap::new();
        map.insert(a, "session");
        assert_eq!(map.get(&b), Some(&"session"));
    }

    #[test]
    fn test_public_key_base64() {
        let kp = KeyPair::generate();
        let encoded = kp.public_key().to_base64();
        let decoded = PublicKey::from_base64(&encoded).unwrap();
        assert_eq!(kp.public_key(), decoded);
    }

    #[test]
    fn test_public_key_rejects_bad_input() {
        assert!(matches!(
            PublicKey::from_bytes(&[1u8; 31]),
            Err(CryptoError::InvalidKeyLength { expected: 32, actual: 31 })
        ));
        assert!(matches!(
            PublicKey::from_bytes(&[0u8; 32]),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            PublicKey::from_base64("not base64!"),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let kp = KeyPair::from_secret_bytes([7u8; 32]);
        let fp1 = kp.public_key().fingerprint();
        let fp2 = PublicKey::from_bytes(kp.public_key().as_bytes())
            .unwrap()
            .fingerprint();

        assert_eq!(fp1, fp2);
        assert_eq!(fp1.to_display().split(' ').count(), 16);
        assert_eq!(fp1.short().len(), 8);
    }

    #[test]
    fn test_public_key_serde() {
        let kp = KeyPair::generate();
        let json = serde_json::to_string(&kp.public_key()).unwrap();
        assert_eq!(json, format!("\"{}\"", kp.public_key().to_base64()));

        let restored: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, kp.public_key());
    }

    #[test]
    fn test_keypair_zeroize() {
        let mut kp = KeyPair::generate();
        assert!(!kp.is_zeroized());

        kp.zeroize();
        assert!(kp.is_zeroized());
        // Public half is not secret and survives
        assert_ne!(kp.public_key().to_bytes(), [0u8; 32]);
    }
}
