// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wall-clock timeslots with millisecond resolution.
//!
//! Content is produced at a timeslot; content keys are shared by all
//! timeslots within the same wall-clock hour. Name components carry
//! timeslots in ISO-8601 basic form (`YYYYMMDDTHHMMSS`).
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::Component;

const ISO_FORMAT: &str = "%Y%m%dT%H%M%S";

const HOUR_MS: i64 = 3_600_000;

/// UTC time point with millisecond resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timeslot(i64);

impl Timeslot {
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn unix_millis(&self) -> i64 {
        self.0
    }

    /// Truncates to the start of the wall-clock hour, so that all timeslots
    /// within one hour share a content key.
    pub fn floor_hour(&self) -> Self {
        Self(self.0.div_euclid(HOUR_MS) * HOUR_MS)
    }

    /// Renders the timeslot in ISO-8601 basic form, the encoding used inside
    /// name components.
    pub fn iso_string(&self) -> String {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(instant) => instant.format(ISO_FORMAT).to_string(),
            // Out of chrono's range; only reachable with absurd inputs.
            None => self.0.to_string(),
        }
    }

    pub fn from_iso(value: &str) -> Result<Self, TimeslotError> {
        let instant = NaiveDateTime::parse_from_str(value, ISO_FORMAT)
            .map_err(|_| TimeslotError::InvalidIsoString(value.to_string()))?;
        Ok(Self(instant.and_utc().timestamp_millis()))
    }

    /// Parses a timeslot from an ISO name component.
    pub fn from_component(component: &Component) -> Result<Self, TimeslotError> {
        let value = component
            .as_str()
            .ok_or_else(|| TimeslotError::InvalidIsoString(component.to_string()))?;
        Self::from_iso(value)
    }
}

impl From<&Timeslot> for Component {
    fn from(timeslot: &Timeslot) -> Self {
        Component::from(timeslot.iso_string())
    }
}

impl fmt::Display for Timeslot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iso_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeslotError {
    #[error("'{0}' is not an ISO-8601 basic timestamp")]
    InvalidIsoString(String),
}
