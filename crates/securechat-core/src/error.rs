//! Error types for the session protocol

use securechat_crypto::CryptoError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ChatError>;

/// Session protocol errors
///
/// None of these are fatal. A failed operation leaves the affected session
/// as it was before the call.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A session with this partner already exists
    #[error("Session already exists with partner {0}")]
    SessionAlreadyExists(String),

    /// No session with this partner
    #[error("No session with partner {0}")]
    NoSuchSession(String),

    /// The handshake with this partner has not been finalized
    #[error("Handshake with partner {0} not finalized")]
    HandshakeNotReady(String),

    /// AEAD open failed; deliberately carries no detail
    #[error("Message authentication failed")]
    AuthenticationFailed,

    /// The message is further ahead than the skip window allows
    #[error("Skip window exceeded: message is {gap} ahead, maximum is {max}")]
    SkipWindowExceeded { gap: u32, max: u32 },

    /// The message belongs to the past and its key is not cached
    /// (already consumed, evicted, or never stored)
    #[error("No cached key for message {counter}")]
    SkippedKeyNotFound { counter: u32 },

    /// A public key could not be used
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Plaintext exceeds the configured maximum
    #[error("Message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// The sending chain ran out of counter space
    #[error("Sending chain exhausted")]
    ChainExhausted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Any other primitive-layer failure
    #[error("Crypto error: {0}")]
    Crypto(#[source] CryptoError),
}

impl From<CryptoError> for ChatError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => ChatError::AuthenticationFailed,
            CryptoError::InvalidPublicKey(reason) => ChatError::InvalidKey(reason),
            CryptoError::InvalidKeyLength { .. } | CryptoError::Encoding(_) => {
                ChatError::InvalidKey(err.to_string())
            }
            CryptoError::MessageTooLarge { size, max } => ChatError::MessageTooLarge { size, max },
            other => ChatError::Crypto(other),
        }
    }
}

impl ChatError {
    /// Stable machine-readable name of the error kind
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::SessionAlreadyExists(_) => "session_already_exists",
            ChatError::NoSuchSession(_) => "no_such_session",
            ChatError::HandshakeNotReady(_) => "handshake_not_ready",
            ChatError::AuthenticationFailed => "authentication_failed",
            ChatError::SkipWindowExceeded { .. } => "skip_window_exceeded",
            ChatError::SkippedKeyNotFound { .. } => "skipped_key_not_found",
            ChatError::InvalidKey(_) => "invalid_key",
            ChatError::MessageTooLarge { .. } => "message_too_large",
            ChatError::ChainExhausted => "chain_exhausted",
            ChatError::Configuration(_) => "invalid_configuration",
            ChatError::Crypto(_) => "crypto_error",
        }
    }
}
