//! Request and response types for the chat API
//!
//! Field names are camelCase. Keys, fingerprints, check values, nonces and
//! ciphertexts travel as standard base64; plaintexts are UTF-8 strings.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use securechat_core::Message;
use securechat_crypto::aead::Nonce;
use securechat_crypto::keys::PublicKey;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Identity public key and fingerprint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    /// Public identity key (base64)
    pub public_key: String,
    /// SHA-256 fingerprint of the key (base64)
    pub fingerprint: String,
}

impl IdentityResponse {
    pub(crate) fn for_key(key: &PublicKey) -> Self {
        Self {
            public_key: key.to_base64(),
            fingerprint: key.fingerprint().to_base64(),
        }
    }
}

/// Handshake step request
///
/// `ephemeralKey` is absent when initiating.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    /// Partner identity key (base64)
    pub partner_key: String,
    /// Partner ephemeral key (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_key: Option<String>,
}

impl HandshakeRequest {
    /// Request to start a handshake
    pub fn initiate(partner_key: &PublicKey) -> Self {
        Self {
            partner_key: partner_key.to_base64(),
            ephemeral_key: None,
        }
    }

    /// Request carrying the partner's ephemeral key
    pub fn with_ephemeral(partner_key: &PublicKey, ephemeral_key: &PublicKey) -> Self {
        Self {
            partner_key: partner_key.to_base64(),
            ephemeral_key: Some(ephemeral_key.to_base64()),
        }
    }

    pub(crate) fn partner(&self) -> Result<PublicKey> {
        decode_key("partnerKey", &self.partner_key)
    }

    pub(crate) fn ephemeral(&self) -> Result<PublicKey> {
        let encoded = self
            .ephemeral_key
            .as_deref()
            .ok_or_else(|| ProtocolError::InvalidRequest("missing ephemeralKey".to_string()))?;
        decode_key("ephemeralKey", encoded)
    }
}

/// Handshake step response
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeResponse {
    /// Our ephemeral key (base64), for initiate and return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_key: Option<String>,
    /// Partner fingerprint (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Handshake check value (base64), for return and finalize
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_value: Option<String>,
    /// Whether the step succeeded
    pub success: bool,
}

/// Send request
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    /// Partner identity key (base64)
    pub partner_key: String,
    /// Message text
    pub plaintext: String,
}

/// Receive request
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessageRequest {
    /// The encrypted message
    pub message: WireMessage,
}

/// Send or receive response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// The encrypted message
    pub message: WireMessage,
    /// Whether the operation succeeded
    pub success: bool,
    /// Decrypted text, for receive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
}

/// Plain success acknowledgement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always true when returned
    pub success: bool,
}

/// One entry of the partner listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerResponse {
    /// Partner identity key (base64)
    pub key: String,
    /// Partner fingerprint (base64)
    pub fingerprint: String,
    /// Display name derived from the fingerprint
    pub name: String,
    /// True once the handshake completed
    pub initialized: bool,
}

/// An encrypted message as it travels between clients
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Sender identity key
    pub sender: String,
    /// Receiver identity key
    pub receiver: String,
    /// Sender's current ratchet key
    #[serde(rename = "nextDHRatchet")]
    pub next_dh_ratchet: String,
    /// Index in the sending chain
    pub counter: u32,
    /// Length of the sender's previous chain
    pub last_update: u32,
    /// Ciphertext with tag
    pub ciphertext: String,
    /// AEAD nonce
    pub iv: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender().to_base64(),
            receiver: message.receiver().to_base64(),
            next_dh_ratchet: message.next_dh_ratchet().to_base64(),
            counter: message.counter(),
            last_update: message.last_update(),
            ciphertext: STANDARD.encode(message.ciphertext()),
            iv: message.iv().to_base64(),
        }
    }
}

impl TryFrom<&WireMessage> for Message {
    type Error = ProtocolError;

    fn try_from(wire: &WireMessage) -> Result<Self> {
        let ciphertext = STANDARD
            .decode(&wire.ciphertext)
            .map_err(|err| invalid_encoding("ciphertext", err))?;
        let iv = Nonce::from_base64(&wire.iv).map_err(|err| invalid_encoding("iv", err))?;

        Ok(Message::from_parts(
            decode_key("sender", &wire.sender)?,
            decode_key("receiver", &wire.receiver)?,
            decode_key("nextDHRatchet", &wire.next_dh_ratchet)?,
            wire.counter,
            wire.last_update,
            ciphertext,
            iv,
        ))
    }
}

/// Decode a base64 public key field
pub fn decode_key(field: &'static str, encoded: &str) -> Result<PublicKey> {
    PublicKey::from_base64(encoded).map_err(|err| invalid_encoding(field, err))
}

fn invalid_encoding(field: &'static str, err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::InvalidEncoding {
        field,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securechat_crypto::keys::KeyPair;

    fn sample_message() -> Message {
        let key = |seed| KeyPair::from_secret_bytes([seed; 32]).public_key();
        Message::from_parts(
            key(1),
            key(2),
            key(3),
            4,
            2,
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17],
            Nonce::random(),
        )
    }

    #[test]
    fn test_wire_message_field_names() {
        let wire = WireMessage::from(&sample_message());
        let json = serde_json::to_value(&wire).unwrap();

        for field in [
            "sender",
            "receiver",
            "nextDHRatchet",
            "counter",
            "lastUpdate",
            "ciphertext",
            "iv",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["counter"], 4);
        assert_eq!(json["lastUpdate"], 2);
    }

    #[test]
    fn test_wire_message_decodes() {
        let message = sample_message();
        let wire = WireMessage::from(&message);
        assert_eq!(Message::try_from(&wire).unwrap(), message);
    }

    #[test]
    fn test_bad_wire_fields_are_named() {
        let mut wire = WireMessage::from(&sample_message());
        wire.next_dh_ratchet = "%%%".to_string();

        match Message::try_from(&wire) {
            Err(ProtocolError::InvalidEncoding { field, .. }) => assert_eq!(field, "nextDHRatchet"),
            other => panic!("unexpected {:?}", other),
        }

        let mut wire = WireMessage::from(&sample_message());
        wire.iv = STANDARD.encode([0u8; 12]);
        assert!(matches!(
            Message::try_from(&wire),
            Err(ProtocolError::InvalidEncoding { field: "iv", .. })
        ));
    }

    #[test]
    fn test_handshake_request_json() {
        let request: HandshakeRequest =
            serde_json::from_str(r#"{"partnerKey":"abc"}"#).unwrap();
        assert!(request.ephemeral_key.is_none());
        assert!(matches!(
            request.ephemeral(),
            Err(ProtocolError::InvalidRequest(_))
        ));

        let response = HandshakeResponse {
            success: true,
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"success":true}"#);
    }
}
