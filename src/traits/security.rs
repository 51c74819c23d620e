// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::packet::Data;

/// Signs outgoing data packets.
pub trait DataSigner {
    fn sign(&self, data: &mut Data);
}

/// Validates incoming data packets against the trust policy.
pub trait DataValidator {
    fn validate(&self, data: &Data) -> Result<(), ValidationError>;
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Signer that attaches an empty signature.
pub struct NullSigner;

impl DataSigner for NullSigner {
    fn sign(&self, data: &mut Data) {
        data.set_signature(Vec::new());
    }
}

/// Validator that accepts every packet.
pub struct NullValidator;

impl DataValidator for NullValidator {
    fn validate(&self, _data: &Data) -> Result<(), ValidationError> {
        Ok(())
    }
}
