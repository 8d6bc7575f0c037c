// Copyright (c) 2025 - Cowboy AI, Inc.
//! Consumer Handlers
//!
//! One handler per inbound event kind. Every handler runs the same pipeline
//! and never lets a failure escape to the bus:
//!
//! ```text
//! IntegrationEvent
//!   → deserialize payload   (Deserialization)
//!   → validate              (Validation)
//!   → idempotency check     (Conflict, logged as a no-op)
//!   → write                 (Storage)
//!   → count + log
//! ```
//!
//! Delivery is at-least-once, so the same event may arrive more than once;
//! the natural-key check turns repeats into no-ops.

use thiserror::Error;

use crate::domain::{Environment, PhysicalActivity, Sleep, ValidationError};
use crate::repository::StorageError;

pub mod delete;
pub mod registry;
pub mod save;
pub mod update;

pub use delete::DeleteHandler;
pub use registry::{ConsumerBinding, ConsumerRegistry, Repositories};
pub use save::SaveHandler;
pub use update::UpdateHandler;

/// Why a delivered event was not applied
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandlerError {
    /// The payload is not a valid record
    #[error("Payload could not be read: {0}")]
    Deserialization(String),

    /// The record failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The record is already stored
    #[error("Already stored: {0}")]
    Conflict(String),

    /// The repository failed
    #[error("Storage failed: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for HandlerError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Duplicate(key) => HandlerError::Conflict(key),
            other => HandlerError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        HandlerError::Deserialization(error.to_string())
    }
}

/// Counter name for an outcome, e.g. `physicalactivity.saved`
pub(crate) fn counter_name(payload_key: &str, outcome: &str) -> String {
    format!("{payload_key}.{outcome}")
}

pub type PhysicalActivitySaveHandler = SaveHandler<PhysicalActivity>;
pub type PhysicalActivityUpdateHandler = UpdateHandler<PhysicalActivity>;
pub type PhysicalActivityDeleteHandler = DeleteHandler<PhysicalActivity>;
pub type SleepSaveHandler = SaveHandler<Sleep>;
pub type SleepUpdateHandler = UpdateHandler<Sleep>;
pub type SleepDeleteHandler = DeleteHandler<Sleep>;
pub type EnvironmentSaveHandler = SaveHandler<Environment>;
pub type EnvironmentDeleteHandler = DeleteHandler<Environment>;
