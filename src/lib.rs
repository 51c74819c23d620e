// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ndn-gep` implements the core of a group-based encryption protocol (GEP)
//! for Named-Data Networking: producers publish data encrypted for a group
//! of authorized consumers without any direct key exchange.
//!
//! ## How the key chain works
//!
//! Producers encrypt content under short-lived symmetric content keys
//! (C-KEYs), one per wall-clock hour. Each C-KEY is wrapped under the
//! group-wide asymmetric encryption keys (E-KEYs) advertised for every node
//! of the producer's hierarchical data type. Consumers hold a per-consumer
//! decryption key (D-KEY) which unwraps the group key material; recovering
//! a plaintext walks the chain backwards, fetching the encrypted content,
//! the wrapped C-KEY and the D-KEY packet, each step guided by the key
//! locator embedded in the previous one.
//!
//! The two engines doing this work are the [`Producer`] (per-timeslot C-KEY
//! lifecycle, E-KEY coverage tracking, batched key wrapping) and the
//! [`Consumer`] (three-stage fetch-validate-decrypt pipeline with key
//! caching and link-delegation fallback).
//!
//! ## Integration
//!
//! The network, persistence and trust layers stay outside this crate and
//! plug in through seams: a [`Face`](traits::Face) expresses interests and
//! delivers data, NACKs and timeouts on a single-threaded cooperative event
//! loop; a [`KeyStore`](store::KeyStore) persists consumer D-KEYs by name
//! and producer C-KEYs by rounded hour; [`DataSigner`](traits::DataSigner)
//! and [`DataValidator`](traits::DataValidator) stand in for the signing
//! and validation service. All outcomes are reported through callbacks
//! carrying an [`ErrorCode`] on failure.
//!
//! Both engines rate-limit themselves to one outbound interest per 100 ms
//! via the face's cooperative timer, see
//! [`INTEREST_PACING`](traits::INTEREST_PACING).
mod consumer;
pub mod crypto;
mod encrypted_content;
mod encryptor;
mod error;
pub mod name;
mod packet;
mod producer;
pub mod store;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;
mod timeslot;
mod tlv;
pub mod traits;

pub use consumer::{Consumer, ConsumerError, OnPlaintext};
pub use encrypted_content::{EncryptAlgorithm, EncryptedContent, EncryptedContentError};
pub use encryptor::{encrypt_data, EncryptParams};
pub use error::{noop_on_error, ErrorCode, OnError};
pub use name::{components, Component, Name};
pub use packet::{Data, Exclude, Interest, Link};
pub use producer::{OnEncryptedKeys, Producer};
pub use timeslot::{Timeslot, TimeslotError};
