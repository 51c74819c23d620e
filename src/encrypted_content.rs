// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `EncryptedContent` record and its TLV codec.
//!
//! Every encrypted payload in the protocol is framed as one of these
//! records: the wire algorithm, a key locator naming the wrapping key, an
//! initialization vector when the algorithm needs one and the ciphertext
//! itself. The key locator is what lets a consumer walk the decryption
//! chain without out-of-band hints.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::Name;
use crate::tlv::{types, write_element, TlvError, TlvReader};

/// Wire encryption algorithms.
///
/// The numeric ids are part of the wire format and must stay stable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptAlgorithm {
    AesCbc,
    RsaPkcs1v15,
    RsaOaep,
}

impl EncryptAlgorithm {
    pub fn id(&self) -> u64 {
        match self {
            EncryptAlgorithm::AesCbc => 1,
            EncryptAlgorithm::RsaPkcs1v15 => 2,
            EncryptAlgorithm::RsaOaep => 3,
        }
    }

    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(EncryptAlgorithm::AesCbc),
            2 => Some(EncryptAlgorithm::RsaPkcs1v15),
            3 => Some(EncryptAlgorithm::RsaOaep),
            _ => None,
        }
    }

    /// True when the algorithm requires an initialization vector.
    pub fn requires_iv(&self) -> bool {
        matches!(self, EncryptAlgorithm::AesCbc)
    }
}

/// One encrypted blob together with everything needed to decrypt it.
///
/// Invariant: `initial_vector` is present exactly when the algorithm
/// requires one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedContent {
    algorithm: EncryptAlgorithm,
    key_locator: Name,
    initial_vector: Option<Vec<u8>>,
    payload: Vec<u8>,
}

impl EncryptedContent {
    pub fn new(
        algorithm: EncryptAlgorithm,
        key_locator: Name,
        initial_vector: Option<Vec<u8>>,
        payload: Vec<u8>,
    ) -> Result<Self, EncryptedContentError> {
        if algorithm.requires_iv() != initial_vector.as_ref().is_some_and(|iv| !iv.is_empty()) {
            return Err(EncryptedContentError::InitialVectorMismatch(algorithm));
        }
        Ok(Self {
            algorithm,
            key_locator,
            initial_vector,
            payload,
        })
    }

    pub fn algorithm(&self) -> EncryptAlgorithm {
        self.algorithm
    }

    /// Name of the key that decrypts this record.
    pub fn key_locator(&self) -> &Name {
        &self.key_locator
    }

    pub fn initial_vector(&self) -> Option<&[u8]> {
        self.initial_vector.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encodes the record as a TLV block.
    pub fn encode(&self) -> Vec<u8> {
        let mut inner = Vec::new();

        let mut algorithm = Vec::new();
        crate::tlv::write_var_number(&mut algorithm, self.algorithm.id());
        write_element(&mut inner, types::ENCRYPTION_ALGORITHM, &algorithm);

        let mut locator = Vec::new();
        self.key_locator.encode_tlv(&mut locator);
        write_element(&mut inner, types::KEY_LOCATOR, &locator);

        if let Some(iv) = &self.initial_vector {
            write_element(&mut inner, types::INITIAL_VECTOR, iv);
        }
        write_element(&mut inner, types::ENCRYPTED_PAYLOAD, &self.payload);

        let mut out = Vec::new();
        write_element(&mut out, types::ENCRYPTED_CONTENT, &inner);
        out
    }

    /// Decodes one record from a TLV block.
    pub fn decode(bytes: &[u8]) -> Result<Self, EncryptedContentError> {
        let mut reader = TlvReader::new(bytes);
        let record = Self::decode_from(&mut reader)?;
        if reader.has_more() {
            return Err(EncryptedContentError::TrailingBytes);
        }
        Ok(record)
    }

    /// Decodes a concatenation of records, e.g. the two-block D-KEY payload.
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<Self>, EncryptedContentError> {
        let mut reader = TlvReader::new(bytes);
        let mut records = Vec::new();
        while reader.has_more() {
            records.push(Self::decode_from(&mut reader)?);
        }
        Ok(records)
    }

    fn decode_from(reader: &mut TlvReader<'_>) -> Result<Self, EncryptedContentError> {
        let outer = reader.read_expected(types::ENCRYPTED_CONTENT)?;
        let mut fields = TlvReader::new(outer);

        let algorithm_bytes = fields.read_expected(types::ENCRYPTION_ALGORITHM)?;
        let algorithm_id = read_sole_var_number(algorithm_bytes)?;
        let algorithm = EncryptAlgorithm::from_id(algorithm_id)
            .ok_or(EncryptedContentError::UnknownAlgorithm(algorithm_id))?;

        let locator_bytes = fields.read_expected(types::KEY_LOCATOR)?;
        let mut locator_reader = TlvReader::new(locator_bytes);
        let name_bytes = locator_reader.read_expected(types::NAME)?;
        let key_locator = Name::decode_tlv(name_bytes)?;

        let (typ, value) = fields.read_element()?;
        let (initial_vector, payload) = match typ {
            types::INITIAL_VECTOR => {
                let iv = value.to_vec();
                let payload = fields.read_expected(types::ENCRYPTED_PAYLOAD)?;
                (Some(iv), payload.to_vec())
            }
            types::ENCRYPTED_PAYLOAD => (None, value.to_vec()),
            found => {
                return Err(EncryptedContentError::Tlv(TlvError::UnexpectedType {
                    expected: types::ENCRYPTED_PAYLOAD,
                    found,
                }))
            }
        };
        if fields.has_more() {
            return Err(EncryptedContentError::TrailingBytes);
        }

        if algorithm.requires_iv() && !initial_vector.as_ref().is_some_and(|iv| !iv.is_empty()) {
            return Err(EncryptedContentError::InitialVectorMismatch(algorithm));
        }

        Ok(Self {
            algorithm,
            key_locator,
            initial_vector,
            payload,
        })
    }
}

fn read_sole_var_number(bytes: &[u8]) -> Result<u64, EncryptedContentError> {
    Ok(crate::tlv::parse_var_number(bytes)?)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptedContentError {
    #[error("unknown encryption algorithm id {0}")]
    UnknownAlgorithm(u64),

    #[error("initialization vector presence does not match algorithm {0:?}")]
    InitialVectorMismatch(EncryptAlgorithm),

    #[error("unexpected trailing bytes after encrypted content")]
    TrailingBytes,

    #[error(transparent)]
    Tlv(#[from] TlvError),
}
