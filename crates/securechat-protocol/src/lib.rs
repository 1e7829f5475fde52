//! # SecureChat Protocol
//!
//! The API edge of SecureChat: JSON request and response types, the
//! [`ChatService`] that owns the current identity, and the mapping from
//! errors to HTTP-style status codes. The transport that carries these
//! types is left to the embedding application.
//!
//! ## Usage
//!
//! ```
//! use securechat_protocol::prelude::*;
//!
//! let alice = ChatService::new(ServiceConfig::default()).unwrap();
//! let bob = ChatService::new(ServiceConfig::default()).unwrap();
//! let (alice_key, bob_key) = (alice.get_identity().public_key, bob.get_identity().public_key);
//!
//! let initiated = alice
//!     .context()
//!     .initiate_handshake(&HandshakeRequest {
//!         partner_key: bob_key.clone(),
//!         ephemeral_key: None,
//!     })
//!     .unwrap();
//! let returned = bob
//!     .context()
//!     .return_handshake(&HandshakeRequest {
//!         partner_key: alice_key.clone(),
//!         ephemeral_key: initiated.ephemeral_key,
//!     })
//!     .unwrap();
//! let finalized = alice
//!     .context()
//!     .finalize_handshake(&HandshakeRequest {
//!         partner_key: bob_key.clone(),
//!         ephemeral_key: returned.ephemeral_key,
//!     })
//!     .unwrap();
//! assert_eq!(returned.check_value, finalized.check_value);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod api;
pub mod config;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use error::{ProtocolError, Result};
pub use service::{partner_label, ChatService, RequestContext};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::api::{
        HandshakeRequest, HandshakeResponse, IdentityResponse, MessageRequest, MessageResponse,
        PartnerResponse, ReceiveMessageRequest, SuccessResponse, WireMessage,
    };
    pub use crate::config::ServiceConfig;
    pub use crate::error::{ProtocolError, Result};
    pub use crate::service::{partner_label, ChatService, RequestContext};
}
