// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams towards the external collaborators: the network face and the
//! signing/validation service. The key-value store seam lives in
//! [`crate::store`].
mod face;
mod security;

pub(crate) use face::schedule_paced;
pub use face::{Face, FaceEvent, OnFaceResponse, ScheduledEvent, INTEREST_PACING};
pub use security::{DataSigner, DataValidator, NullSigner, NullValidator, ValidationError};
