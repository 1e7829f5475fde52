//! # SecureChat Core
//!
//! The pairwise session protocol for SecureChat.
//!
//! This crate provides:
//! - [`Chatter`]: an identity plus its sessions, the entry point for callers
//! - [`Session`]: the double ratchet state shared with one partner
//! - [`Message`]: the encrypted envelope and its additional-data encoding
//! - [`SessionConfig`] and [`ChatError`]
//!
//! ## Example
//!
//! ```
//! use securechat_core::Chatter;
//!
//! let alice = Chatter::new();
//! let bob = Chatter::new();
//!
//! let alice_ephemeral = alice.initiate_handshake(&bob.public_key()).unwrap();
//! let (bob_ephemeral, bob_check) = bob
//!     .return_handshake(&alice.public_key(), &alice_ephemeral)
//!     .unwrap();
//! let alice_check = alice
//!     .finalize_handshake(&bob.public_key(), &bob_ephemeral)
//!     .unwrap();
//! assert_eq!(alice_check, bob_check);
//!
//! let message = alice.send(&bob.public_key(), b"hello").unwrap();
//! assert_eq!(bob.receive(&message).unwrap(), b"hello");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod chatter;
pub mod config;
pub mod error;
pub mod identity;
pub mod message;
pub mod session;
mod skipped;

pub use chatter::Chatter;
pub use config::SessionConfig;
pub use error::{ChatError, Result};
pub use identity::Identity;
pub use message::Message;
pub use session::{Session, SessionState, SessionStatus};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::chatter::Chatter;
    pub use crate::config::SessionConfig;
    pub use crate::error::{ChatError, Result};
    pub use crate::message::Message;
    pub use crate::session::{SessionState, SessionStatus};
    pub use securechat_crypto::keys::{Fingerprint, PublicKey};
}
