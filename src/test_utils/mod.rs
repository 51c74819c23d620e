// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic in-process face and packet fixtures for tests.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use crate::crypto::{aes, rsa, Rng};
use crate::encrypted_content::{EncryptAlgorithm, EncryptedContent};
use crate::name::Name;
use crate::packet::{Data, Interest};
use crate::traits::{Face, FaceEvent, OnFaceResponse, ScheduledEvent};

/// Scripted face running a single-threaded event loop.
///
/// Expressed interests queue up together with their continuations; calling
/// [`TestFace::run`] drains scheduled events and answers each interest
/// through the installed responder. Pacing delays collapse to FIFO order,
/// which preserves the total ordering the engines rely on.
#[derive(Default)]
pub struct TestFace {
    inner: RefCell<TestFaceInner>,
}

#[derive(Default)]
struct TestFaceInner {
    scheduled: VecDeque<ScheduledEvent>,
    pending: VecDeque<(Interest, OnFaceResponse)>,
    sent: Vec<Interest>,
    responder: Option<Responder>,
}

type Responder = Box<dyn FnMut(&Interest) -> FaceEvent>;

impl TestFace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the script deciding each interest's outcome. Without one,
    /// every interest times out.
    pub fn set_responder(&self, responder: impl FnMut(&Interest) -> FaceEvent + 'static) {
        self.inner.borrow_mut().responder = Some(Box::new(responder));
    }

    /// Every interest expressed so far, in dispatch order.
    pub fn sent(&self) -> Vec<Interest> {
        self.inner.borrow().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.borrow().sent.len()
    }

    /// Runs the event loop until no scheduled events or unanswered
    /// interests remain.
    pub fn run(&self) {
        loop {
            let event = self.inner.borrow_mut().scheduled.pop_front();
            if let Some(event) = event {
                event();
                continue;
            }

            let next = self.inner.borrow_mut().pending.pop_front();
            let Some((interest, on_response)) = next else {
                break;
            };

            // The responder is taken out while it runs so that it may use
            // the face itself.
            let mut responder = self.inner.borrow_mut().responder.take();
            let response = match responder.as_mut() {
                Some(responder) => responder(&interest),
                None => FaceEvent::Timeout,
            };
            if let Some(responder) = responder {
                let mut inner = self.inner.borrow_mut();
                if inner.responder.is_none() {
                    inner.responder = Some(responder);
                }
            }

            on_response(interest, response);
        }
    }
}

impl Face for TestFace {
    fn express_interest(&self, interest: Interest, on_response: OnFaceResponse) {
        let mut inner = self.inner.borrow_mut();
        inner.sent.push(interest.clone());
        inner.pending.push_back((interest, on_response));
    }

    fn schedule(&self, _delay: Duration, event: ScheduledEvent) {
        self.inner.borrow_mut().scheduled.push_back(event);
    }
}

/// Builds an E-KEY data packet for `node` covering `[begin, end)`, carrying
/// the public key bits as content.
pub fn ekey_data(node: &Name, begin: &str, end: &str, public_der: &[u8]) -> Data {
    let name = node.clone().append(begin).append(end);
    Data::new(name, public_der.to_vec())
}

/// Builds a two-block D-KEY packet: a random nonce wrapped under the
/// consumer's public key, then `dkey_bits` wrapped under the nonce.
pub fn dkey_packet(
    name: Name,
    consumer_key_name: &Name,
    consumer_public_der: &[u8],
    dkey_bits: &[u8],
    rng: &Rng,
) -> Data {
    let nonce = rng.fresh_nonce().expect("randomness");
    let wrapped_nonce = rsa::encrypt(consumer_public_der, &nonce, EncryptAlgorithm::RsaOaep)
        .expect("nonce wrapping");
    let nonce_block = EncryptedContent::new(
        EncryptAlgorithm::RsaOaep,
        consumer_key_name.clone(),
        None,
        wrapped_nonce,
    )
    .expect("nonce block");

    let iv = rng.fresh_iv().expect("randomness");
    let wrapped_payload = aes::encrypt(&nonce, dkey_bits, &iv).expect("payload wrapping");
    let payload_block = EncryptedContent::new(
        EncryptAlgorithm::AesCbc,
        name.clone(),
        Some(iv),
        wrapped_payload,
    )
    .expect("payload block");

    let mut content = nonce_block.encode();
    content.extend(payload_block.encode());
    Data::new(name, content)
}
