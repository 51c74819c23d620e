// SPDX-License-Identifier: MIT OR Apache-2.0

//! RSA key generation and key wrapping.
//!
//! Keys travel as DER bytes (PKCS#8 for the private half, X.509/SPKI for the
//! public half) so they can be stored in the key-value store and carried as
//! packet payloads without further framing.
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::crypto::{CryptoError, SecretBytes};
use crate::encrypted_content::EncryptAlgorithm;

/// Freshly generated RSA key pair as DER bytes.
pub struct RsaKeyPair {
    decrypt_key: SecretBytes,
    encrypt_key: Vec<u8>,
}

impl RsaKeyPair {
    /// Private half (PKCS#8 DER).
    pub fn decrypt_key(&self) -> &[u8] {
        self.decrypt_key.as_bytes()
    }

    /// Public half (X.509/SPKI DER).
    pub fn encrypt_key(&self) -> &[u8] {
        &self.encrypt_key
    }
}

/// Generates an RSA key pair of the given modulus size.
pub fn generate_keypair(bits: usize) -> Result<RsaKeyPair, CryptoError> {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|err| CryptoError::Failure(format!("rsa key generation failed: {err}")))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_der = private_key
        .to_pkcs8_der()
        .map_err(|err| CryptoError::Failure(format!("private key der export failed: {err}")))?;
    let public_der = public_key
        .to_public_key_der()
        .map_err(|err| CryptoError::Failure(format!("public key der export failed: {err}")))?;

    Ok(RsaKeyPair {
        decrypt_key: SecretBytes::from_bytes(private_der.as_bytes().to_vec()),
        encrypt_key: public_der.as_bytes().to_vec(),
    })
}

/// Extracts the public half of a private key.
pub fn derive_encrypt_key(private_der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let private_key = parse_private(private_der)?;
    let public_der = RsaPublicKey::from(&private_key)
        .to_public_key_der()
        .map_err(|err| CryptoError::Failure(format!("public key der export failed: {err}")))?;
    Ok(public_der.as_bytes().to_vec())
}

pub fn encrypt(
    public_der: &[u8],
    plaintext: &[u8],
    scheme: EncryptAlgorithm,
) -> Result<Vec<u8>, CryptoError> {
    let public_key = RsaPublicKey::from_public_key_der(public_der)
        .map_err(|err| CryptoError::Failure(format!("malformed rsa public key: {err}")))?;
    let mut rng = OsRng;
    let result = match scheme {
        EncryptAlgorithm::RsaPkcs1v15 => public_key.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext),
        EncryptAlgorithm::RsaOaep => public_key.encrypt(&mut rng, Oaep::new::<Sha1>(), plaintext),
        EncryptAlgorithm::AesCbc => return Err(CryptoError::UnsupportedScheme),
    };
    result.map_err(|err| CryptoError::Failure(format!("rsa encryption failed: {err}")))
}

pub fn decrypt(
    private_der: &[u8],
    ciphertext: &[u8],
    scheme: EncryptAlgorithm,
) -> Result<Vec<u8>, CryptoError> {
    let private_key = parse_private(private_der)?;
    let result = match scheme {
        EncryptAlgorithm::RsaPkcs1v15 => private_key.decrypt(Pkcs1v15Encrypt, ciphertext),
        EncryptAlgorithm::RsaOaep => private_key.decrypt(Oaep::new::<Sha1>(), ciphertext),
        EncryptAlgorithm::AesCbc => return Err(CryptoError::UnsupportedScheme),
    };
    result.map_err(|err| CryptoError::Failure(format!("rsa decryption failed: {err}")))
}

fn parse_private(private_der: &[u8]) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_der(private_der)
        .map_err(|err| CryptoError::Failure(format!("malformed rsa private key: {err}")))
}
