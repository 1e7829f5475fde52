//! Protocol error types and their HTTP-style mapping

use securechat_core::ChatError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors surfaced at the API edge
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Session protocol error
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// A request field was not valid base64 or UTF-8
    #[error("Invalid encoding in {field}: {reason}")]
    InvalidEncoding {
        /// Name of the offending field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The request is structurally wrong
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or saved
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProtocolError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Chat(err) => match err {
                ChatError::NoSuchSession(_) => 404,
                ChatError::SessionAlreadyExists(_)
                | ChatError::HandshakeNotReady(_)
                | ChatError::ChainExhausted => 409,
                ChatError::SkippedKeyNotFound { .. } => 410,
                ChatError::MessageTooLarge { .. } => 413,
                ChatError::AuthenticationFailed
                | ChatError::SkipWindowExceeded { .. }
                | ChatError::InvalidKey(_) => 400,
                ChatError::Configuration(_) | ChatError::Crypto(_) => 500,
            },
            Self::InvalidEncoding { .. } | Self::InvalidRequest(_) => 400,
            Self::Configuration(_) => 500,
        }
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Chat(err) => err.code(),
            Self::InvalidEncoding { .. } => "invalid_encoding",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// JSON error body; server-side failures carry no detail
    pub fn to_error_body(&self) -> serde_json::Value {
        if self.status_code() >= 500 {
            return serde_json::json!({
                "error": "internal_error",
                "message": "An internal error occurred"
            });
        }

        serde_json::json!({
            "error": self.error_code(),
            "message": self.to_string()
        })
    }
}

impl From<toml::de::Error> for ProtocolError {
    fn from(err: toml::de::Error) -> Self {
        ProtocolError::Configuration(err.to_string())
    }
}

impl From<toml::ser::Error> for ProtocolError {
    fn from(err: toml::ser::Error) -> Self {
        ProtocolError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Configuration(err.to_string())
    }
}
