//! Chat service: owns the current Chatter and hands out request contexts
//!
//! Each request works against a [`RequestContext`] holding an `Arc` to the
//! Chatter that was current when the request started. Replacing the identity
//! swaps the Chatter and ends every session of the old one, so a request
//! still running against it sees its session as gone.

use std::sync::Arc;

use parking_lot::RwLock;
use securechat_core::{Chatter, Message, SessionState};
use securechat_crypto::keys::PublicKey;
use tracing::{debug, info};

use crate::api::{
    decode_key, HandshakeRequest, HandshakeResponse, IdentityResponse, MessageRequest,
    MessageResponse, PartnerResponse, ReceiveMessageRequest, SuccessResponse, WireMessage,
};
use crate::config::ServiceConfig;
use crate::error::{ProtocolError, Result};

/// Display name for a partner: `Partner-` plus the first eight characters of
/// the base64 fingerprint
pub fn partner_label(key: &PublicKey) -> String {
    let fingerprint = key.fingerprint().to_base64();
    format!("Partner-{}", &fingerprint[..8])
}

/// The chat service
pub struct ChatService {
    config: ServiceConfig,
    chatter: RwLock<Arc<Chatter>>,
}

impl ChatService {
    /// Create a service with a fresh identity
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let chatter = Chatter::with_config(config.session.clone())?;
        info!(
            "{} started with identity {}",
            config.service_name,
            chatter.fingerprint().short()
        );

        Ok(Self {
            config,
            chatter: RwLock::new(Arc::new(chatter)),
        })
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Context for one request, bound to the current identity
    pub fn context(&self) -> RequestContext {
        RequestContext {
            chatter: Arc::clone(&self.chatter.read()),
        }
    }

    /// Replace the identity; every existing session is ended and wiped
    pub fn create_identity(&self) -> Result<IdentityResponse> {
        let chatter = Arc::new(Chatter::with_config(self.config.session.clone())?);
        let response = IdentityResponse::for_key(&chatter.public_key());

        let previous = std::mem::replace(&mut *self.chatter.write(), chatter);
        let ended = previous.end_all_sessions();

        info!(
            "Replaced identity {} with {} ({} sessions ended)",
            previous.fingerprint().short(),
            self.chatter.read().fingerprint().short(),
            ended
        );
        Ok(response)
    }

    /// Current identity
    pub fn get_identity(&self) -> IdentityResponse {
        self.context().identity()
    }
}

/// Per-request handle on the Chatter
#[derive(Clone)]
pub struct RequestContext {
    chatter: Arc<Chatter>,
}

impl RequestContext {
    /// The Chatter this request runs against
    pub fn chatter(&self) -> &Chatter {
        &self.chatter
    }

    /// Identity of the Chatter
    pub fn identity(&self) -> IdentityResponse {
        IdentityResponse::for_key(&self.chatter.public_key())
    }

    /// Start a handshake
    pub fn initiate_handshake(&self, request: &HandshakeRequest) -> Result<HandshakeResponse> {
        let partner = request.partner()?;
        let ephemeral = self.chatter.initiate_handshake(&partner)?;
        debug!("Handshake initiated with {}", partner_label(&partner));

        Ok(HandshakeResponse {
            ephemeral_key: Some(ephemeral.to_base64()),
            fingerprint: Some(partner.fingerprint().to_base64()),
            check_value: None,
            success: true,
        })
    }

    /// Answer a handshake
    pub fn return_handshake(&self, request: &HandshakeRequest) -> Result<HandshakeResponse> {
        let partner = request.partner()?;
        let partner_ephemeral = request.ephemeral()?;
        let (ephemeral, check) = self
            .chatter
            .return_handshake(&partner, &partner_ephemeral)?;
        debug!("Handshake returned to {}", partner_label(&partner));

        Ok(HandshakeResponse {
            ephemeral_key: Some(ephemeral.to_base64()),
            fingerprint: Some(partner.fingerprint().to_base64()),
            check_value: Some(check.to_base64()),
            success: true,
        })
    }

    /// Complete a handshake
    pub fn finalize_handshake(&self, request: &HandshakeRequest) -> Result<HandshakeResponse> {
        let partner = request.partner()?;
        let partner_ephemeral = request.ephemeral()?;
        let check = self
            .chatter
            .finalize_handshake(&partner, &partner_ephemeral)?;
        debug!("Handshake finalized with {}", partner_label(&partner));

        Ok(HandshakeResponse {
            ephemeral_key: None,
            fingerprint: Some(partner.fingerprint().to_base64()),
            check_value: Some(check.to_base64()),
            success: true,
        })
    }

    /// Encrypt a text message
    pub fn send(&self, request: &MessageRequest) -> Result<MessageResponse> {
        let partner = decode_key("partnerKey", &request.partner_key)?;
        let message = self.chatter.send(&partner, request.plaintext.as_bytes())?;

        Ok(MessageResponse {
            message: WireMessage::from(&message),
            success: true,
            plaintext: None,
        })
    }

    /// Decrypt a text message
    pub fn receive(&self, request: &ReceiveMessageRequest) -> Result<MessageResponse> {
        let message = Message::try_from(&request.message)?;
        let plaintext = self.chatter.receive_with(&message, |plaintext| {
            String::from_utf8(plaintext).map_err(|err| ProtocolError::InvalidEncoding {
                field: "plaintext",
                reason: err.to_string(),
            })
        })?;

        Ok(MessageResponse {
            message: request.message.clone(),
            success: true,
            plaintext: Some(plaintext),
        })
    }

    /// End the session with a partner
    pub fn end_session(&self, partner_key: &str) -> Result<SuccessResponse> {
        let partner = decode_key("partnerKey", partner_key)?;
        self.chatter.end_session(&partner)?;
        Ok(SuccessResponse { success: true })
    }

    /// Every partner with a session
    pub fn partners(&self) -> Vec<PartnerResponse> {
        self.chatter
            .partners()
            .into_iter()
            .map(|partner| PartnerResponse {
                key: partner.to_base64(),
                fingerprint: partner.fingerprint().to_base64(),
                name: partner_label(&partner),
                initialized: self.chatter.session_state(&partner) == Some(SessionState::Established),
            })
            .collect()
    }
}
