// SPDX-License-Identifier: MIT OR Apache-2.0

//! Randomness for the protocol's key material.
//!
//! Every symmetric secret in the protocol is drawn here: the hourly content
//! keys, the CBC initialization vectors and the nonces under which D-KEY
//! payloads are wrapped. The generator is a ChaCha20 stream cipher seeded
//! from the operating system; a fixed seed under test makes all derived key
//! material deterministic.
use std::sync::Mutex;

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

use crate::crypto::aes::{IV_SIZE, KEY_SIZE};
use crate::crypto::SecretBytes;

/// Key-transport nonces are one AES key wide, so a wrapped D-KEY payload
/// block can be unwrapped like any other symmetric layer.
pub const NONCE_SIZE: usize = KEY_SIZE;

/// Source of fresh key material.
#[derive(Debug)]
pub struct Rng {
    chacha: Mutex<rand_chacha::ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            chacha: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
        }
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Rng {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            chacha: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
        }
    }
}

impl Rng {
    /// Draws a fresh 128-bit content key.
    pub fn fresh_content_key(&self) -> Result<SecretBytes, RngError> {
        Ok(SecretBytes::from_bytes(self.fill(KEY_SIZE)?))
    }

    /// Draws a fresh CBC initialization vector.
    pub fn fresh_iv(&self) -> Result<Vec<u8>, RngError> {
        self.fill(IV_SIZE)
    }

    /// Draws a fresh nonce for wrapping a D-KEY payload.
    pub fn fresh_nonce(&self) -> Result<Vec<u8>, RngError> {
        self.fill(NONCE_SIZE)
    }

    fn fill(&self, len: usize) -> Result<Vec<u8>, RngError> {
        let mut chacha = self.chacha.lock().map_err(|_| RngError::LockPoisoned)?;
        let mut out = vec![0u8; len];
        chacha
            .try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("rng lock is poisoned")]
    LockPoisoned,

    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}
