// Copyright (c) 2025 - Cowboy AI, Inc.
//! Outbox
//!
//! Durable holding area for events that could not be published immediately.
//! A record is appended when a publish fails and deleted only after the
//! replay task republishes it, so presence in the store is the single source
//! of truth for "not yet delivered".
//!
//! # Record shape
//!
//! ```json
//! {
//!   "id": "0190b0c4-...",
//!   "event_name": "SleepSaveEvent",
//!   "type": "sleep",
//!   "timestamp": "2026-01-19T12:00:00Z",
//!   "sleep": { "...": "..." },
//!   "__operation": "publish",
//!   "__routing_key": "sleep.save"
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::events::IntegrationEvent;

pub mod file;
pub mod memory;
pub mod publisher;

pub use file::FileOutboxStore;
pub use memory::InMemoryOutboxStore;
pub use publisher::{OutboxPublisher, PublishOutcome};

/// Opaque outbox record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxId(String);

impl OutboxId {
    /// Fresh time-ordered id
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OutboxId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OutboxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for OutboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the replay task does with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxOperation {
    #[default]
    Publish,
}

/// A record not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub event: IntegrationEvent,
    pub routing_key: String,
    pub operation: OutboxOperation,
}

impl OutboxEntry {
    /// Entry that republishes `event` on `routing_key`
    pub fn publish(event: IntegrationEvent, routing_key: impl Into<String>) -> Self {
        Self {
            event,
            routing_key: routing_key.into(),
            operation: OutboxOperation::Publish,
        }
    }
}

/// A persisted outbox record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: OutboxId,

    #[serde(rename = "__routing_key")]
    pub routing_key: String,

    #[serde(rename = "__operation", default)]
    pub operation: OutboxOperation,

    #[serde(flatten)]
    pub event: IntegrationEvent,
}

impl OutboxRecord {
    /// Persist `entry` under `id`
    pub fn from_entry(id: OutboxId, entry: OutboxEntry) -> Self {
        Self {
            id,
            routing_key: entry.routing_key,
            operation: entry.operation,
            event: entry.event,
        }
    }

    /// Event to republish
    pub fn to_event(&self) -> IntegrationEvent {
        self.event.clone()
    }
}

/// Outbox store failures
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("outbox serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("outbox record not found: {0}")]
    NotFound(OutboxId),
}

/// Persisted collection of undelivered events
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Persist an entry and return it with its assigned id
    async fn append(&self, entry: OutboxEntry) -> Result<OutboxRecord, OutboxError>;

    /// Every record currently stored, oldest first
    async fn list(&self) -> Result<Vec<OutboxRecord>, OutboxError>;

    /// Remove one record; `false` if it was already gone
    async fn delete(&self, id: &OutboxId) -> Result<bool, OutboxError>;
}
