//! Shared helpers for the integration tests

#![allow(dead_code)]

use securechat_core::prelude::*;
use securechat_crypto::aead::Nonce;

/// Run the three-step handshake between two chatters
pub fn connect(initiator: &Chatter, responder: &Chatter) {
    let ephemeral = initiator
        .initiate_handshake(&responder.public_key())
        .unwrap();
    let (reply, responder_check) = responder
        .return_handshake(&initiator.public_key(), &ephemeral)
        .unwrap();
    let initiator_check = initiator
        .finalize_handshake(&responder.public_key(), &reply)
        .unwrap();
    assert_eq!(initiator_check, responder_check);
}

/// Editable copy of a message's fields
pub struct Parts {
    pub sender: PublicKey,
    pub receiver: PublicKey,
    pub next_dh_ratchet: PublicKey,
    pub counter: u32,
    pub last_update: u32,
    pub ciphertext: Vec<u8>,
    pub iv: Nonce,
}

/// Rebuild `message` after applying `edit` to its fields
pub fn tamper(message: &Message, edit: impl FnOnce(&mut Parts)) -> Message {
    let mut parts = Parts {
        sender: *message.sender(),
        receiver: *message.receiver(),
        next_dh_ratchet: *message.next_dh_ratchet(),
        counter: message.counter(),
        last_update: message.last_update(),
        ciphertext: message.ciphertext().to_vec(),
        iv: *message.iv(),
    };
    edit(&mut parts);

    Message::from_parts(
        parts.sender,
        parts.receiver,
        parts.next_dh_ratchet,
        parts.counter,
        parts.last_update,
        parts.ciphertext,
        parts.iv,
    )
}
