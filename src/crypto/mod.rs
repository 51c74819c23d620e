// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives and random number generator.
//!
//! Algorithms:
//! - AES-128-CBC with PKCS#7 padding (content encryption)
//! - RSA PKCS#1 v1.5 and RSA-OAEP (SHA-1) key wrapping
//!
//! Random Number Generator:
//! - ChaCha20 stream cipher, seeded via the operating system
pub mod aes;
mod rng;
pub mod rsa;
mod secret;

use thiserror::Error;

pub use rng::{Rng, RngError};
pub use secret::SecretBytes;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The requested algorithm is not usable with this primitive, for
    /// example asking the RSA layer for an AES wire scheme.
    #[error("unsupported encryption scheme")]
    UnsupportedScheme,

    #[error(transparent)]
    Rng(#[from] RngError),

    /// Malformed key bits, ciphertext length mismatch or padding-check
    /// failure, with a diagnostic.
    #[error("{0}")]
    Failure(String),
}
