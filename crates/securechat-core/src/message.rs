//! Encrypted message envelope
//!
//! A [`Message`] is immutable once built. Every header field is bound into
//! the AEAD tag through [`Message::encode_additional_data`], so changing any
//! of them makes the message fail to open.

use securechat_crypto::aead::Nonce;
use securechat_crypto::keys::{PublicKey, FINGERPRINT_SIZE};

/// Length of the encoded additional data: two u32 fields and three fingerprints
pub const AAD_SIZE: usize = 4 + 4 + 3 * FINGERPRINT_SIZE;

/// An encrypted message between two identities
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    sender: PublicKey,
    receiver: PublicKey,
    next_dh_ratchet: PublicKey,
    counter: u32,
    last_update: u32,
    ciphertext: Vec<u8>,
    iv: Nonce,
}

impl Message {
    /// Assemble a message from its parts, e.g. after decoding one off the wire
    pub fn from_parts(
        sender: PublicKey,
        receiver: PublicKey,
        next_dh_ratchet: PublicKey,
        counter: u32,
        last_update: u32,
        ciphertext: Vec<u8>,
        iv: Nonce,
    ) -> Self {
        Self {
            sender,
            receiver,
            next_dh_ratchet,
            counter,
            last_update,
            ciphertext,
            iv,
        }
    }

    /// Sender's identity key
    pub fn sender(&self) -> &PublicKey {
        &self.sender
    }

    /// Receiver's identity key
    pub fn receiver(&self) -> &PublicKey {
        &self.receiver
    }

    /// Sender's current DH ratchet public key
    pub fn next_dh_ratchet(&self) -> &PublicKey {
        &self.next_dh_ratchet
    }

    /// Index of the message within its sending chain
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Length of the sender's previous sending chain
    pub fn last_update(&self) -> u32 {
        self.last_update
    }

    /// Ciphertext with the authentication tag appended
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// AEAD nonce
    pub fn iv(&self) -> &Nonce {
        &self.iv
    }

    /// Additional data bound into the AEAD tag for this message
    pub fn encode_additional_data(&self) -> [u8; AAD_SIZE] {
        encode_additional_data(
            &self.sender,
            &self.receiver,
            &self.next_dh_ratchet,
            self.counter,
            self.last_update,
        )
    }
}

/// Encode the header fields in their fixed layout:
/// `counter ‖ last_update ‖ fp(sender) ‖ fp(receiver) ‖ fp(next_dh_ratchet)`
/// with both integers little-endian.
pub(crate) fn encode_additional_data(
    sender: &PublicKey,
    receiver: &PublicKey,
    next_dh_ratchet: &PublicKey,
    counter: u32,
    last_update: u32,
) -> [u8; AAD_SIZE] {
    let mut aad = [0u8; AAD_SIZE];
    aad[0..4].copy_from_slice(&counter.to_le_bytes());
    aad[4..8].copy_from_slice(&last_update.to_le_bytes());

    let mut offset = 8;
    for key in [sender, receiver, next_dh_ratchet] {
        aad[offset..offset + FINGERPRINT_SIZE].copy_from_slice(key.fingerprint().as_bytes());
        offset += FINGERPRINT_SIZE;
    }
    aad
}

#[cfg(test)]
mod tests {
    use super::*;
    use securechat_crypto::keys::KeyPair;

    fn message(counter: u32, last_update: u32) -> Message {
        let key = |seed| KeyPair::from_secret_bytes([seed; 32]).public_key();
        Message::from_parts(
            key(1),
            key(2),
            key(3),
            counter,
            last_update,
            vec![0xAA; 20],
            Nonce::random(),
        )
    }

    #[test]
    fn test_aad_layout() {
        let msg = message(7, 3);
        let aad = msg.encode_additional_data();

        assert_eq!(aad.len(), 104);
        assert_eq!(&aad[0..4], &[7, 0, 0, 0]);
        assert_eq!(&aad[4..8], &[3, 0, 0, 0]);
        assert_eq!(&aad[8..40], msg.sender().fingerprint().as_bytes());
        assert_eq!(&aad[40..72], msg.receiver().fingerprint().as_bytes());
        assert_eq!(&aad[72..104], msg.next_dh_ratchet().fingerprint().as_bytes());
    }

    #[test]
    fn test_aad_depends_on_every_header_field() {
        let base = message(7, 3).encode_additional_data();
        assert_ne!(base, message(8, 3).encode_additional_data());
        assert_ne!(base, message(7, 4).encode_additional_data());

        let msg = message(7, 3);
        let swapped = Message::from_parts(
            *msg.receiver(),
            *msg.sender(),
            *msg.next_dh_ratchet(),
            7,
            3,
            msg.ciphertext().to_vec(),
            *msg.iv(),
        );
        assert_ne!(base, swapped.encode_additional_data());
    }

    #[test]
    fn test_aad_ignores_ciphertext_and_iv() {
        let a = message(1, 0);
        let b = Message::from_parts(
            *a.sender(),
            *a.receiver(),
            *a.next_dh_ratchet(),
            1,
            0,
            vec![0xBB; 5],
            Nonce::random(),
        );
        assert_eq!(a.encode_additional_data(), b.encode_additional_data());
    }
}
