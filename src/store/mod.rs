// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed persistence for decryption keys and content keys.
//!
//! Consumers store the asymmetric keys provisioned to them by the group
//! manager, producers store their per-hour content keys. Content-key rows
//! are keyed by the rounded timeslot, so two timeslots within the same hour
//! map to the same row.
//!
//! An in-memory implementation is provided behind the `memory` feature flag
//! (enabled by default); a SQLite-backed implementation sits behind the
//! `sqlite` feature flag (disabled by default).
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "memory")]
pub use memory::MemoryKeyStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteKeyStore;

use std::fmt::{Debug, Display};

use crate::name::Name;
use crate::timeslot::Timeslot;

/// Key-value persistence contract used by both engines.
pub trait KeyStore {
    type Error: Display + Debug;

    /// Stores a decryption key under its name, replacing any previous bits.
    fn add_key(&mut self, name: &Name, bits: &[u8]) -> Result<(), Self::Error>;

    /// Fetches a decryption key by name.
    fn get_key(&self, name: &Name) -> Result<Option<Vec<u8>>, Self::Error>;

    /// True when a content key exists for the hour containing `timeslot`.
    fn has_content_key(&self, timeslot: Timeslot) -> Result<bool, Self::Error>;

    /// Stores a content key for the hour containing `timeslot`.
    fn add_content_key(&mut self, timeslot: Timeslot, bits: &[u8]) -> Result<(), Self::Error>;

    /// Fetches the content key for the hour containing `timeslot`.
    fn get_content_key(&self, timeslot: Timeslot) -> Result<Option<Vec<u8>>, Self::Error>;
}
