//! Double ratchet session with a single partner
//!
//! A session starts with a triple Diffie-Hellman handshake between the two
//! long-term identities and one ephemeral key pair per side. After that every
//! message advances a symmetric chain, and every change of speaker performs a
//! Diffie-Hellman ratchet step that mixes fresh key material into the root
//! key.
//!
//! Receiving is staged: every key derived while processing a message is held
//! aside, and the session is only updated once the AEAD open succeeded. A
//! message that fails to authenticate leaves the session exactly as it was.

use std::collections::VecDeque;
use std::fmt;

use securechat_crypto::aead::{self, Nonce};
use securechat_crypto::kdf::{combine_keys, label, ratchet_root, SymmetricKey};
use securechat_crypto::keys::{KeyPair, PublicKey};
use serde::Serialize;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::SessionConfig;
use crate::error::{ChatError, Result};
use crate::identity::Identity;
use crate::message::{encode_additional_data, Message};
use crate::skipped::SkippedKeys;

/// Session lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Handshake sent, waiting for the partner's ephemeral key
    Initiated,
    /// Keys agreed, messages can flow
    Established,
    /// Torn down and wiped
    Closed,
}

/// Which side of the handshake a party played
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandshakeRole {
    Initiator,
    Responder,
}

/// Public view of a session, free of key material
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Partner identity key
    pub partner: PublicKey,
    /// Lifecycle state
    pub state: SessionState,
    /// Our current ratchet public key
    pub ratchet_key: PublicKey,
    /// Last ratchet key the partner announced
    pub partner_ratchet: Option<PublicKey>,
    /// Messages sent on the current sending chain
    pub send_counter: u32,
    /// Next expected counter on the current receiving chain
    pub receive_counter: u32,
    /// Length of the previous sending chain
    pub previous_send_count: u32,
    /// Number of cached skipped message keys
    pub skipped_keys: usize,
}

/// A message key derived during a receive, waiting for commit
type StagedKey = (PublicKey, u32, SymmetricKey);

struct NewEpoch {
    partner_ratchet: PublicKey,
    root_key: SymmetricKey,
}

/// Everything a receive would change, held until the AEAD open succeeds
struct PendingReceive {
    skipped: Vec<StagedKey>,
    new_epoch: Option<NewEpoch>,
    receive_chain: SymmetricKey,
    receive_counter: u32,
    message_key: SymmetricKey,
    lost_tail: u32,
}

/// Ratchet state shared with one partner
pub struct Session {
    partner: PublicKey,
    state: SessionState,
    my_ratchet: KeyPair,
    partner_ratchet: Option<PublicKey>,
    root_key: Option<SymmetricKey>,
    send_chain: Option<SymmetricKey>,
    receive_chain: Option<SymmetricKey>,
    send_counter: u32,
    receive_counter: u32,
    previous_send_count: u32,
    skipped_keys: SkippedKeys,
    retired_partner_ratchets: VecDeque<PublicKey>,
    config: SessionConfig,
}

impl Session {
    fn new(partner: PublicKey, config: SessionConfig) -> Self {
        Self {
            partner,
            state: SessionState::Initiated,
            my_ratchet: KeyPair::generate(),
            partner_ratchet: None,
            root_key: None,
            send_chain: None,
            receive_chain: None,
            send_counter: 0,
            receive_counter: 0,
            previous_send_count: 0,
            skipped_keys: SkippedKeys::new(config.max_skipped_keys),
            retired_partner_ratchets: VecDeque::new(),
            config,
        }
    }

    /// Start a handshake as initiator
    ///
    /// The fresh ratchet key doubles as the handshake ephemeral; its public
    /// half goes to the partner.
    pub(crate) fn initiate(partner: PublicKey, config: SessionConfig) -> Self {
        Self::new(partner, config)
    }

    /// Answer a handshake as responder
    ///
    /// Returns the established session and the handshake check value.
    pub(crate) fn respond(
        identity: &Identity,
        partner: PublicKey,
        partner_ephemeral: PublicKey,
        config: SessionConfig,
    ) -> Result<(Self, SymmetricKey)> {
        let mut session = Self::new(partner, config);
        let root = handshake_root(
            identity,
            &session.my_ratchet,
            &partner,
            &partner_ephemeral,
            HandshakeRole::Responder,
        )?;
        let check = root.derive_key(label::HANDSHAKE_CHECK);

        session.partner_ratchet = Some(partner_ephemeral);
        session.establish(root, HandshakeRole::Responder);
        Ok((session, check))
    }

    /// Complete a handshake this side initiated
    pub(crate) fn finalize(
        &mut self,
        identity: &Identity,
        partner_ephemeral: PublicKey,
    ) -> Result<SymmetricKey> {
        match self.state {
            SessionState::Initiated => {}
            SessionState::Established => {
                return Err(ChatError::SessionAlreadyExists(self.partner_id()))
            }
            SessionState::Closed => return Err(ChatError::NoSuchSession(self.partner_id())),
        }

        let root = handshake_root(
            identity,
            &self.my_ratchet,
            &self.partner,
            &partner_ephemeral,
            HandshakeRole::Initiator,
        )?;
        let check = root.derive_key(label::HANDSHAKE_CHECK);

        self.partner_ratchet = Some(partner_ephemeral);
        self.establish(root, HandshakeRole::Initiator);
        Ok(check)
    }

    /// Split the handshake root into the first chain and the next root key
    fn establish(&mut self, root: SymmetricKey, role: HandshakeRole) {
        let chain = root.derive_key(label::CHAIN);
        self.root_key = Some(root.derive_key(label::ROOT));

        match role {
            HandshakeRole::Initiator => self.send_chain = Some(chain),
            HandshakeRole::Responder => self.receive_chain = Some(chain),
        }
        self.state = SessionState::Established;
        debug!(partner = %self.partner_id(), ?role, "Handshake complete");
    }

    /// Encrypt `plaintext` for the partner
    ///
    /// `sender` is our own identity key; it is bound into the message header.
    pub(crate) fn encrypt(&mut self, sender: &PublicKey, plaintext: &[u8]) -> Result<Message> {
        self.ensure_established()?;

        if plaintext.len() > self.config.max_message_size {
            return Err(ChatError::MessageTooLarge {
                size: plaintext.len(),
                max: self.config.max_message_size,
            });
        }

        if self.send_chain.is_none() {
            self.ratchet_send()?;
        }

        let counter = self.send_counter;
        let next_counter = counter.checked_add(1).ok_or(ChatError::ChainExhausted)?;

        let chain = self
            .send_chain
            .as_ref()
            .ok_or_else(|| ChatError::HandshakeNotReady(self.partner_id()))?;
        let (chain, message_key) = next_message_key(chain);

        let next_dh_ratchet = self.my_ratchet.public_key();
        let aad = encode_additional_data(
            sender,
            &self.partner,
            &next_dh_ratchet,
            counter,
            self.previous_send_count,
        );
        let iv = Nonce::random();
        let ciphertext = aead::seal(&message_key, &iv, &aad, plaintext)?;

        self.send_chain = Some(chain);
        self.send_counter = next_counter;

        Ok(Message::from_parts(
            *sender,
            self.partner,
            next_dh_ratchet,
            counter,
            self.previous_send_count,
            ciphertext,
            iv,
        ))
    }

    /// Decrypt a message from the partner
    pub(crate) fn decrypt(&mut self, message: &Message) -> Result<Vec<u8>> {
        self.decrypt_with(message, Ok)
    }

    /// Decrypt a message and hand the plaintext to `accept` before committing
    ///
    /// The session only advances when both the AEAD open and `accept`
    /// succeed; an error from either leaves it unchanged.
    pub(crate) fn decrypt_with<T, E, F>(
        &mut self,
        message: &Message,
        accept: F,
    ) -> std::result::Result<T, E>
    where
        E: From<ChatError>,
        F: FnOnce(Vec<u8>) -> std::result::Result<T, E>,
    {
        self.ensure_established()?;

        let ratchet = *message.next_dh_ratchet();
        let counter = message.counter();
        let aad = message.encode_additional_data();

        let cached = self
            .skipped_keys
            .get(&ratchet, counter)
            .map(|key| aead::open(key, message.iv(), &aad, message.ciphertext()));
        if let Some(opened) = cached {
            let plaintext = opened.map_err(|err| self.authentication_failure(counter, err))?;
            let accepted = accept(plaintext)?;
            self.skipped_keys.remove(&ratchet, counter);
            debug!(partner = %self.partner_id(), counter, "Used skipped message key");
            return Ok(accepted);
        }

        let pending = if self.partner_ratchet == Some(ratchet) {
            self.stage_current_epoch(ratchet, counter)?
        } else if self.retired_partner_ratchets.contains(&ratchet) {
            return Err(ChatError::SkippedKeyNotFound { counter }.into());
        } else {
            self.stage_new_epoch(message)?
        };

        let plaintext = aead::open(&pending.message_key, message.iv(), &aad, message.ciphertext())
            .map_err(|err| self.authentication_failure(counter, err))?;
        let accepted = accept(plaintext)?;

        self.commit(pending);
        Ok(accepted)
    }

    fn stage_current_epoch(&self, ratchet: PublicKey, counter: u32) -> Result<PendingReceive> {
        // The initiator has no receiving chain until the responder's first
        // ratchet step, so nothing can be valid here yet
        let chain = self
            .receive_chain
            .as_ref()
            .ok_or(ChatError::AuthenticationFailed)?;

        if counter < self.receive_counter {
            return Err(ChatError::SkippedKeyNotFound { counter });
        }
        self.check_skip_window(counter - self.receive_counter)?;

        let mut skipped = Vec::new();
        let chain = skip_message_keys(chain, ratchet, self.receive_counter, counter, &mut skipped);
        let (receive_chain, message_key) = next_message_key(&chain);

        Ok(PendingReceive {
            skipped,
            new_epoch: None,
            receive_chain,
            receive_counter: counter.saturating_add(1),
            message_key,
            lost_tail: 0,
        })
    }

    fn stage_new_epoch(&self, message: &Message) -> Result<PendingReceive> {
        let ratchet = *message.next_dh_ratchet();
        let counter = message.counter();
        self.check_skip_window(counter)?;

        let mut skipped = Vec::new();
        let mut lost_tail = 0;

        // Keys for the rest of the epoch being closed, up to the sender's
        // previous chain length
        if let (Some(previous), Some(chain)) = (self.partner_ratchet, self.receive_chain.as_ref()) {
            let until = message.last_update();
            if until > self.receive_counter {
                let tail = until - self.receive_counter;
                if tail > self.config.max_skip {
                    lost_tail = tail;
                } else {
                    skip_message_keys(chain, previous, self.receive_counter, until, &mut skipped);
                }
            }
        }

        let root = self
            .root_key
            .as_ref()
            .ok_or_else(|| ChatError::HandshakeNotReady(self.partner_id()))?;
        let dh = self.my_ratchet.diffie_hellman(&ratchet)?;
        let (root_key, chain) = ratchet_root(root, &dh)?;

        let chain = skip_message_keys(&chain, ratchet, 0, counter, &mut skipped);
        let (receive_chain, message_key) = next_message_key(&chain);

        Ok(PendingReceive {
            skipped,
            new_epoch: Some(NewEpoch {
                partner_ratchet: ratchet,
                root_key,
            }),
            receive_chain,
            receive_counter: counter.saturating_add(1),
            message_key,
            lost_tail,
        })
    }

    fn commit(&mut self, pending: PendingReceive) {
        let PendingReceive {
            skipped,
            new_epoch,
            receive_chain,
            receive_counter,
            lost_tail,
            ..
        } = pending;

        if lost_tail > 0 {
            warn!(
                partner = %self.partner_id(),
                lost = lost_tail,
                "Previous epoch tail exceeds skip window, keys not cached"
            );
        }
        for (ratchet, counter, key) in skipped {
            self.skipped_keys.insert(ratchet, counter, key);
        }

        self.receive_chain = Some(receive_chain);
        self.receive_counter = receive_counter;

        if let Some(epoch) = new_epoch {
            if let Some(previous) = self.partner_ratchet.replace(epoch.partner_ratchet) {
                self.retire_partner_ratchet(previous);
            }
            self.root_key = Some(epoch.root_key);
            self.send_chain = None;
            debug!(
                partner = %self.partner_id(),
                ratchet = %epoch.partner_ratchet.fingerprint().short(),
                "DH ratchet step (receive)"
            );

            // A failure here only defers the step to the next send
            if let Err(err) = self.ratchet_send() {
                warn!(partner = %self.partner_id(), %err, "Sending ratchet step deferred");
            }
        }
    }

    /// Send half of the DH ratchet: fresh local key pair, new sending chain
    fn ratchet_send(&mut self) -> Result<()> {
        let partner_ratchet = self
            .partner_ratchet
            .ok_or_else(|| ChatError::HandshakeNotReady(self.partner_id()))?;
        let root = self
            .root_key
            .as_ref()
            .ok_or_else(|| ChatError::HandshakeNotReady(self.partner_id()))?;

        let my_ratchet = KeyPair::generate();
        let dh = my_ratchet.diffie_hellman(&partner_ratchet)?;
        let (root_key, send_chain) = ratchet_root(root, &dh)?;

        self.root_key = Some(root_key);
        self.send_chain = Some(send_chain);
        self.my_ratchet = my_ratchet;
        self.previous_send_count = self.send_counter;
        self.send_counter = 0;

        debug!(
            partner = %self.partner_id(),
            ratchet = %self.my_ratchet.public_key().fingerprint().short(),
            previous = self.previous_send_count,
            "DH ratchet step (send)"
        );
        Ok(())
    }

    fn retire_partner_ratchet(&mut self, ratchet: PublicKey) {
        self.retired_partner_ratchets.push_back(ratchet);
        while self.retired_partner_ratchets.len() > self.config.max_retired_ratchets {
            self.retired_partner_ratchets.pop_front();
        }
    }

    fn check_skip_window(&self, gap: u32) -> Result<()> {
        if gap > self.config.max_skip {
            warn!(partner = %self.partner_id(), gap, "Skip window exceeded");
            return Err(ChatError::SkipWindowExceeded {
                gap,
                max: self.config.max_skip,
            });
        }
        Ok(())
    }

    fn authentication_failure(&self, counter: u32, err: securechat_crypto::CryptoError) -> ChatError {
        warn!(partner = %self.partner_id(), counter, "Message authentication failed");
        err.into()
    }

    fn ensure_established(&self) -> Result<()> {
        match self.state {
            SessionState::Established => Ok(()),
            SessionState::Initiated => Err(ChatError::HandshakeNotReady(self.partner_id())),
            SessionState::Closed => Err(ChatError::NoSuchSession(self.partner_id())),
        }
    }

    fn partner_id(&self) -> String {
        self.partner.fingerprint().short()
    }

    /// Wipe all key material and mark the session closed
    pub(crate) fn close(&mut self) {
        self.zeroize();
        self.state = SessionState::Closed;
    }

    /// Partner identity key
    pub fn partner(&self) -> &PublicKey {
        &self.partner
    }

    /// Lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Snapshot of the non-secret session fields
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            partner: self.partner,
            state: self.state,
            ratchet_key: self.my_ratchet.public_key(),
            partner_ratchet: self.partner_ratchet,
            send_counter: self.send_counter,
            receive_counter: self.receive_counter,
            previous_send_count: self.previous_send_count,
            skipped_keys: self.skipped_keys.len(),
        }
    }

    /// True once every secret the session held has been wiped
    pub fn is_zeroized(&self) -> bool {
        let wiped = |key: &Option<SymmetricKey>| key.as_ref().map_or(true, SymmetricKey::is_zeroized);

        self.my_ratchet.is_zeroized()
            && wiped(&self.root_key)
            && wiped(&self.send_chain)
            && wiped(&self.receive_chain)
            && self.skipped_keys.is_empty()
    }
}

impl Zeroize for Session {
    fn zeroize(&mut self) {
        self.my_ratchet.zeroize();
        self.root_key.zeroize();
        self.send_chain.zeroize();
        self.receive_chain.zeroize();
        self.skipped_keys.zeroize();
        self.partner_ratchet = None;
        self.retired_partner_ratchets.clear();
        self.send_counter = 0;
        self.receive_counter = 0;
        self.previous_send_count = 0;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("partner", &self.partner)
            .field("state", &self.state)
            .field("send_counter", &self.send_counter)
            .field("receive_counter", &self.receive_counter)
            .field("skipped_keys", &self.skipped_keys.len())
            .finish_non_exhaustive()
    }
}

/// Triple DH root key
///
/// Both sides feed the agreements in the same order: responder ephemeral
/// with initiator identity, responder identity with initiator ephemeral,
/// then ephemeral with ephemeral.
fn handshake_root(
    identity: &Identity,
    ephemeral: &KeyPair,
    partner: &PublicKey,
    partner_ephemeral: &PublicKey,
    role: HandshakeRole,
) -> Result<SymmetricKey> {
    let ephemeral_identity = ephemeral.diffie_hellman(partner)?;
    let identity_ephemeral = identity.diffie_hellman(partner_ephemeral)?;
    let ephemeral_ephemeral = ephemeral.diffie_hellman(partner_ephemeral)?;

    let root = match role {
        HandshakeRole::Responder => {
            combine_keys(&[&ephemeral_identity, &identity_ephemeral, &ephemeral_ephemeral])?
        }
        HandshakeRole::Initiator => {
            combine_keys(&[&identity_ephemeral, &ephemeral_identity, &ephemeral_ephemeral])?
        }
    };
    Ok(root)
}

/// Advance `chain` by one step; returns the new chain key and its message key
fn next_message_key(chain: &SymmetricKey) -> (SymmetricKey, SymmetricKey) {
    let chain = chain.derive_key(label::CHAIN);
    let message_key = chain.derive_key(label::KEY);
    (chain, message_key)
}

/// Derive and stage the message keys for counters `from..until`
///
/// Returns the chain key positioned just before message `until`.
fn skip_message_keys(
    chain: &SymmetricKey,
    ratchet: PublicKey,
    from: u32,
    until: u32,
    staged: &mut Vec<StagedKey>,
) -> SymmetricKey {
    let mut chain = chain.clone();
    for counter in from..until {
        let (next, message_key) = next_message_key(&chain);
        staged.push((ratchet, counter, message_key));
        chain = next;
    }
    chain
}
