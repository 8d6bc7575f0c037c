// Copyright (c) 2025 - Cowboy AI, Inc.
//! Measurement Repositories
//!
//! Storage contract the consumer handlers write through. The document store
//! behind it lives outside this crate; [`InMemoryRepository`] implements the
//! same contract for tests and for running the worker without a database.
//!
//! # Contract
//!
//! - `check_exist` answers by [`NaturalKey`](crate::domain::NaturalKey), never
//!   by id
//! - `create` assigns an id when the record has none
//! - `update_by_natural_key` applies the change only if a stored record with
//!   the same natural key differs from it
//! - `remove` deletes by `(owner_id, id)` and reports whether anything was
//!   removed

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Record;

pub mod memory;

pub use memory::InMemoryRepository;

/// Errors raised by a repository
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A record with the same natural key already exists
    #[error("Record already exists: {0}")]
    Duplicate(String),

    /// The record lacks the fields needed to address it
    #[error("Record cannot be addressed: {0}")]
    Unaddressable(String),
}

/// Storage for one kind of measurement record
#[async_trait]
pub trait MeasurementRepository<R: Record>: Send + Sync {
    /// Whether a record with the same natural key is stored
    async fn check_exist(&self, record: &R) -> Result<bool, StorageError>;

    /// Store a new record and return it with its id
    async fn create(&self, record: R) -> Result<R, StorageError>;

    /// Replace the stored record with the same natural key if it differs
    ///
    /// Returns `None` when nothing was stored under that key or the stored
    /// record is already identical.
    async fn update_by_natural_key(&self, record: R) -> Result<Option<R>, StorageError>;

    /// Delete the record `id` owned by `owner_id`
    async fn remove(&self, owner_id: &str, id: &str) -> Result<bool, StorageError>;
}
