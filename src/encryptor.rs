// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helper that wraps a plaintext into a data packet carrying an
//! [`EncryptedContent`] record.
use crate::crypto::{aes, rsa, CryptoError, Rng};
use crate::encrypted_content::{EncryptAlgorithm, EncryptedContent};
use crate::name::Name;
use crate::packet::Data;

/// How a plaintext should be wrapped.
#[derive(Clone, Debug)]
pub struct EncryptParams {
    algorithm: EncryptAlgorithm,
    initial_vector: Option<Vec<u8>>,
}

impl EncryptParams {
    pub fn new(algorithm: EncryptAlgorithm) -> Self {
        Self {
            algorithm,
            initial_vector: None,
        }
    }

    /// Pins the initialization vector instead of drawing a random one.
    pub fn with_initial_vector(mut self, iv: Vec<u8>) -> Self {
        self.initial_vector = Some(iv);
        self
    }

    pub fn algorithm(&self) -> EncryptAlgorithm {
        self.algorithm
    }
}

/// Encrypts `plaintext` under `key_bits` and returns an unsigned data packet
/// named `name` whose content is the encoded record. `key_locator` names the
/// wrapping key so consumers can find their way back to it. Signing is the
/// caller's responsibility.
pub fn encrypt_data(
    name: Name,
    plaintext: &[u8],
    key_locator: &Name,
    key_bits: &[u8],
    params: &EncryptParams,
    rng: &Rng,
) -> Result<Data, CryptoError> {
    let record = match params.algorithm {
        EncryptAlgorithm::AesCbc => {
            let iv = match &params.initial_vector {
                Some(iv) => iv.clone(),
                None => rng.fresh_iv()?,
            };
            let payload = aes::encrypt(key_bits, plaintext, &iv)?;
            EncryptedContent::new(EncryptAlgorithm::AesCbc, key_locator.clone(), Some(iv), payload)
        }
        scheme @ (EncryptAlgorithm::RsaPkcs1v15 | EncryptAlgorithm::RsaOaep) => {
            let payload = rsa::encrypt(key_bits, plaintext, scheme)?;
            EncryptedContent::new(scheme, key_locator.clone(), None, payload)
        }
    }
    .map_err(|err| CryptoError::Failure(err.to_string()))?;

    Ok(Data::new(name, record.encode()))
}
