//! Session configuration

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Limits applied to every session a Chatter owns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest counter gap a single receive may skip over
    pub max_skip: u32,
    /// Capacity of the per-session skipped-key cache
    pub max_skipped_keys: usize,
    /// How many closed partner ratchet epochs are remembered
    pub max_retired_ratchets: usize,
    /// Maximum plaintext size in bytes
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_skip: 1000,
            max_skipped_keys: 1000,
            max_retired_ratchets: 8,
            max_message_size: securechat_crypto::MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_skipped_keys == 0 {
            return Err(ChatError::Configuration(
                "max_skipped_keys must be > 0".to_string(),
            ));
        }
        if self.max_message_size == 0 || self.max_message_size > securechat_crypto::MAX_MESSAGE_SIZE
        {
            return Err(ChatError::Configuration(format!(
                "max_message_size must be between 1 and {}",
                securechat_crypto::MAX_MESSAGE_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_skip, 1000);
        assert_eq!(config.max_skipped_keys, 1000);
    }

    #[test]
    fn test_invalid_config() {
        let config = SessionConfig {
            max_skipped_keys: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ChatError::Configuration(_))));

        let config = SessionConfig {
            max_message_size: securechat_crypto::MAX_MESSAGE_SIZE + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"max_skip": 10}"#).unwrap();
        assert_eq!(config.max_skip, 10);
        assert_eq!(config.max_retired_ratchets, 8);
    }
}
