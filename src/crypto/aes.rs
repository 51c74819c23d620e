// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-128-CBC with PKCS#7 padding.
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::crypto::CryptoError;

/// Content keys are 128 bit.
pub const KEY_SIZE: usize = 16;

/// CBC initialization vectors are one AES block.
pub const IV_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub fn encrypt(key: &[u8], plaintext: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|err| CryptoError::Failure(format!("bad aes key or iv length: {err}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

pub fn decrypt(key: &[u8], ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|err| CryptoError::Failure(format!("bad aes key or iv length: {err}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|err| CryptoError::Failure(format!("aes-cbc padding check failed: {err}")))
}
