//! Chatter: one identity and its sessions
//!
//! The session map sits behind a `RwLock`; each session has its own `Mutex`
//! and is shared through an `Arc`. Operations on the same partner serialize
//! on that mutex, operations on different partners run in parallel.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use securechat_crypto::kdf::SymmetricKey;
use securechat_crypto::keys::{Fingerprint, PublicKey};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{ChatError, Result};
use crate::identity::Identity;
use crate::message::Message;
use crate::session::{Session, SessionState, SessionStatus};

type SessionHandle = Arc<Mutex<Session>>;

/// A long-term identity and its pairwise sessions
pub struct Chatter {
    identity: Identity,
    sessions: RwLock<HashMap<PublicKey, SessionHandle>>,
    config: SessionConfig,
}

impl Chatter {
    /// Create a chatter with a fresh identity and default limits
    pub fn new() -> Self {
        Self::from_parts(Identity::generate(), SessionConfig::default())
    }

    /// Create a chatter with a fresh identity and custom limits
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        Self::with_identity(Identity::generate(), config)
    }

    /// Create a chatter around an existing identity
    pub fn with_identity(identity: Identity, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(identity, config))
    }

    fn from_parts(identity: Identity, config: SessionConfig) -> Self {
        info!("Created chatter {}", identity.fingerprint().short());
        Self {
            identity,
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Our identity public key
    pub fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    /// Our identity fingerprint
    pub fn fingerprint(&self) -> Fingerprint {
        self.identity.fingerprint()
    }

    /// Session limits in force
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Begin a handshake with `partner`
    ///
    /// Returns the ephemeral public key to hand to the partner.
    pub fn initiate_handshake(&self, partner: &PublicKey) -> Result<PublicKey> {
        self.check_partner(partner)?;

        let mut sessions = self.sessions.write();
        match sessions.entry(*partner) {
            Entry::Occupied(_) => Err(ChatError::SessionAlreadyExists(partner.fingerprint().short())),
            Entry::Vacant(entry) => {
                let session = Session::initiate(*partner, self.config.clone());
                let ephemeral = session.status().ratchet_key;
                entry.insert(Arc::new(Mutex::new(session)));

                info!("Initiated handshake with {}", partner.fingerprint().short());
                Ok(ephemeral)
            }
        }
    }

    /// Answer a handshake `partner` initiated with `partner_ephemeral`
    ///
    /// Returns our ephemeral public key and the check value both sides can
    /// compare out of band.
    pub fn return_handshake(
        &self,
        partner: &PublicKey,
        partner_ephemeral: &PublicKey,
    ) -> Result<(PublicKey, SymmetricKey)> {
        self.check_partner(partner)?;

        let mut sessions = self.sessions.write();
        match sessions.entry(*partner) {
            Entry::Occupied(_) => Err(ChatError::SessionAlreadyExists(partner.fingerprint().short())),
            Entry::Vacant(entry) => {
                let (session, check) = Session::respond(
                    &self.identity,
                    *partner,
                    *partner_ephemeral,
                    self.config.clone(),
                )?;
                let ephemeral = session.status().ratchet_key;
                entry.insert(Arc::new(Mutex::new(session)));

                info!("Established session with {} (responder)", partner.fingerprint().short());
                Ok((ephemeral, check))
            }
        }
    }

    /// Complete a handshake we initiated
    pub fn finalize_handshake(
        &self,
        partner: &PublicKey,
        partner_ephemeral: &PublicKey,
    ) -> Result<SymmetricKey> {
        let handle = self.session(partner)?;
        let mut session = handle.lock();
        let check = session.finalize(&self.identity, *partner_ephemeral)?;

        info!("Established session with {} (initiator)", partner.fingerprint().short());
        Ok(check)
    }

    /// Encrypt `plaintext` for `partner`
    pub fn send(&self, partner: &PublicKey, plaintext: &[u8]) -> Result<Message> {
        let handle = self.session(partner)?;
        let mut session = handle.lock();
        let message = session.encrypt(&self.identity.public_key(), plaintext)?;

        debug!(
            "Sent message {} to {}",
            message.counter(),
            partner.fingerprint().short()
        );
        Ok(message)
    }

    /// Decrypt a message from one of our partners
    pub fn receive(&self, message: &Message) -> Result<Vec<u8>> {
        self.receive_with(message, Ok)
    }

    /// Decrypt a message and check the plaintext before the session advances
    ///
    /// When `accept` rejects the plaintext its error is returned and the
    /// session stays as it was, so the same message can be received again.
    pub fn receive_with<T, E, F>(&self, message: &Message, accept: F) -> std::result::Result<T, E>
    where
        E: From<ChatError>,
        F: FnOnce(Vec<u8>) -> std::result::Result<T, E>,
    {
        let handle = self.session(message.sender())?;
        let mut session = handle.lock();
        let accepted = session.decrypt_with(message, accept)?;

        debug!(
            "Received message {} from {}",
            message.counter(),
            message.sender().fingerprint().short()
        );
        Ok(accepted)
    }

    /// Tear down the session with `partner` and wipe its keys
    pub fn end_session(&self, partner: &PublicKey) -> Result<()> {
        let handle = self
            .sessions
            .write()
            .remove(partner)
            .ok_or_else(|| ChatError::NoSuchSession(partner.fingerprint().short()))?;

        handle.lock().close();
        info!("Ended session with {}", partner.fingerprint().short());
        Ok(())
    }

    /// Tear down every session; returns how many were closed
    pub fn end_all_sessions(&self) -> usize {
        let drained: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write();
            sessions.drain().map(|(_, handle)| handle).collect()
        };

        for handle in &drained {
            handle.lock().close();
        }
        if !drained.is_empty() {
            info!("Ended {} sessions", drained.len());
        }
        drained.len()
    }

    /// Partners we hold a session with, in key order
    pub fn partners(&self) -> Vec<PublicKey> {
        let mut partners: Vec<PublicKey> = self.sessions.read().keys().copied().collect();
        partners.sort();
        partners
    }

    /// True if a session with `partner` exists
    pub fn has_session(&self, partner: &PublicKey) -> bool {
        self.sessions.read().contains_key(partner)
    }

    /// Lifecycle state of the session with `partner`
    pub fn session_state(&self, partner: &PublicKey) -> Option<SessionState> {
        let handle = self.sessions.read().get(partner).cloned()?;
        let state = handle.lock().state();
        Some(state)
    }

    /// Non-secret snapshot of the session with `partner`
    pub fn session_status(&self, partner: &PublicKey) -> Result<SessionStatus> {
        let handle = self.session(partner)?;
        let status = handle.lock().status();
        Ok(status)
    }

    fn session(&self, partner: &PublicKey) -> Result<SessionHandle> {
        self.sessions
            .read()
            .get(partner)
            .cloned()
            .ok_or_else(|| ChatError::NoSuchSession(partner.fingerprint().short()))
    }

    fn check_partner(&self, partner: &PublicKey) -> Result<()> {
        if *partner == self.identity.public_key() {
            return Err(ChatError::InvalidKey(
                "cannot open a session with our own identity".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Chatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Chatter {
    fn drop(&mut self) {
        self.end_all_sessions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(alice: &Chatter, bob: &Chatter) {
        let alice_ephemeral = alice.initiate_handshake(&bob.public_key()).unwrap();
        let (bob_ephemeral, bob_check) = bob
            .return_handshake(&alice.public_key(), &alice_ephemeral)
            .unwrap();
        let alice_check = alice
            .finalize_handshake(&bob.public_key(), &bob_ephemeral)
            .unwrap();
        assert_eq!(alice_check, bob_check);
    }

    #[test]
    fn test_duplicate_handshake_fails() {
        let alice = Chatter::new();
        let bob = Chatter::new();
        alice.initiate_handshake(&bob.public_key()).unwrap();

        assert!(matches!(
            alice.initiate_handshake(&bob.public_key()),
            Err(ChatError::SessionAlreadyExists(_))
        ));
    }

    #[test]
    fn test_finalize_without_initiate() {
        let alice = Chatter::new();
        let bob = Chatter::new();
        let ephemeral = bob.initiate_handshake(&alice.public_key()).unwrap();

        assert!(matches!(
            alice.finalize_handshake(&bob.public_key(), &ephemeral),
            Err(ChatError::NoSuchSession(_))
        ));
    }

    #[test]
    fn test_handshake_with_self_rejected() {
        let alice = Chatter::new();
        assert!(matches!(
            alice.initiate_handshake(&alice.public_key()),
            Err(ChatError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_session_listing() {
        let alice = Chatter::new();
        let bob = Chatter::new();
        let carol = Chatter::new();

        connect(&alice, &bob);
        alice.initiate_handshake(&carol.public_key()).unwrap();

        let mut expected = vec![bob.public_key(), carol.public_key()];
        expected.sort();
        assert_eq!(alice.partners(), expected);
        assert_eq!(alice.session_state(&bob.public_key()), Some(SessionState::Established));
        assert_eq!(alice.session_state(&carol.public_key()), Some(SessionState::Initiated));
        assert!(alice.session_state(&Chatter::new().public_key()).is_none());
    }

    #[test]
    fn test_teardown_observed_through_retained_handle() {
        let alice = Chatter::new();
        let bob = Chatter::new();
        connect(&alice, &bob);

        let _lost = alice.send(&bob.public_key(), b"never delivered").unwrap();
        let msg = alice.send(&bob.public_key(), b"delivered").unwrap();
        bob.receive(&msg).unwrap();

        // An in-flight operation holding the handle across teardown
        let retained = bob.session(&alice.public_key()).unwrap();
        assert_eq!(retained.lock().status().skipped_keys, 1);

        bob.end_session(&alice.public_key()).unwrap();

        let session = retained.lock();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.is_zeroized());
        drop(session);

        assert!(!bob.has_session(&alice.public_key()));
        assert!(matches!(
            bob.end_session(&alice.public_key()),
            Err(ChatError::NoSuchSession(_))
        ));
    }

    #[test]
    fn test_end_all_sessions() {
        let alice = Chatter::new();
        let bob = Chatter::new();
        let carol = Chatter::new();
        connect(&alice, &bob);
        connect(&alice, &carol);

        let retained = alice.session(&bob.public_key()).unwrap();
        assert_eq!(alice.end_all_sessions(), 2);
        assert!(alice.partners().is_empty());
        assert!(retained.lock().is_zeroized());
    }

    #[test]
    fn test_rejected_plaintext_leaves_session_unchanged() {
        let alice = Chatter::new();
        let bob = Chatter::new();
        connect(&alice, &bob);

        let reject = |_: Vec<u8>| -> Result<()> { Err(ChatError::InvalidKey("rejected".into())) };

        // Current epoch
        let m0 = alice.send(&bob.public_key(), b"zero").unwrap();
        let m1 = alice.send(&bob.public_key(), b"one").unwrap();
        let before = bob.session_status(&alice.public_key()).unwrap();
        assert!(bob.receive_with(&m1, reject).is_err());
        assert_eq!(bob.session_status(&alice.public_key()).unwrap(), before);
        assert_eq!(bob.receive(&m1).unwrap(), b"one");

        // Cached skipped key
        assert!(bob.receive_with(&m0, reject).is_err());
        assert_eq!(bob.session_status(&alice.public_key()).unwrap().skipped_keys, 1);
        assert_eq!(bob.receive(&m0).unwrap(), b"zero");

        // New epoch
        let reply = bob.send(&alice.public_key(), b"turn").unwrap();
        let before = alice.session_status(&bob.public_key()).unwrap();
        assert!(alice.receive_with(&reply, reject).is_err());
        assert_eq!(alice.session_status(&bob.public_key()).unwrap(), before);
        assert_eq!(alice.receive(&reply).unwrap(), b"turn");
    }

    #[test]
    fn test_low_order_ephemeral_rejected() {
        let alice = Chatter::new();
        let bob = Chatter::new();

        let mut one = [0u8; 32];
        one[0] = 1;
        let low_order = PublicKey::from_bytes(&one).unwrap();

        assert!(matches!(
            bob.return_handshake(&alice.public_key(), &low_order),
            Err(ChatError::InvalidKey(_))
        ));
        assert!(!bob.has_session(&alice.public_key()));

        alice.initiate_handshake(&bob.public_key()).unwrap();
        assert!(matches!(
            alice.finalize_handshake(&bob.public_key(), &low_order),
            Err(ChatError::InvalidKey(_))
        ));
        assert_eq!(alice.session_state(&bob.public_key()), Some(SessionState::Initiated));
    }
}
