// Copyright (c) 2025 - Cowboy AI, Inc.
//! Measurement Payload Models
//!
//! Records carried inside integration events and written by the consumer
//! handlers. All wire fields are optional; the validators in [`validation`]
//! decide which ones an operation requires.
//!
//! # Models
//!
//! - [`PhysicalActivity`] - an activity session for a child
//! - [`Sleep`] - a night of sleep with its stage pattern
//! - [`Environment`] - an indoor climate reading at an institution
//!
//! # Natural Keys
//!
//! Consumers de-duplicate on a [`NaturalKey`] rather than on the record id,
//! because the same logical measurement may be re-sent under a new envelope:
//! - activity, sleep → `(start_time, child_id)`
//! - environment → `(timestamp, institution_id, local, room)`

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

pub mod activity;
pub mod environment;
pub mod sleep;
pub mod validation;

pub use activity::{ActivityLevel, PhysicalActivity};
pub use environment::{Environment, Location, Measurement as EnvironmentMeasurement};
pub use sleep::{Sleep, SleepPattern, SleepPatternDataSet, SleepType};
pub use validation::{ValidationError, ValidationResult, Validator};

/// Domain identity used for idempotent writes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    /// A measurement spanning time, owned by a child
    ChildInterval {
        start_time: DateTime<Utc>,
        child_id: String,
    },
    /// A reading taken at a place
    PlaceReading {
        timestamp: DateTime<Utc>,
        institution_id: String,
        local: String,
        room: String,
    },
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::ChildInterval {
                start_time,
                child_id,
            } => write!(f, "child {} at {}", child_id, start_time.to_rfc3339()),
            NaturalKey::PlaceReading {
                timestamp,
                institution_id,
                local,
                room,
            } => write!(
                f,
                "institution {} {}/{} at {}",
                institution_id,
                local,
                room,
                timestamp.to_rfc3339()
            ),
        }
    }
}

/// Common behaviour of every payload record
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// JSON key the record is nested under inside an event envelope
    const PAYLOAD_KEY: &'static str;

    /// Human readable kind, used in log lines
    const KIND: &'static str;

    /// Storage id, if assigned
    fn id(&self) -> Option<&str>;

    /// Assign the storage id
    fn set_id(&mut self, id: String);

    /// Owning child or institution
    fn owner_id(&self) -> Option<&str>;

    /// Key used for idempotency checks; `None` when the fields are missing
    fn natural_key(&self) -> Option<NaturalKey>;
}
