// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory measurement repository

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{MeasurementRepository, StorageError};
use crate::domain::Record;

/// Repository holding records in process memory
pub struct InMemoryRepository<R> {
    records: Mutex<Vec<R>>,
    unavailable: AtomicBool,
}

impl<R: Record> Default for InMemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> InMemoryRepository<R> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<R>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable(format!("{} store is offline", R::KIND)))
        } else {
            Ok(())
        }
    }

    /// Make every call fail with [`StorageError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of stored records
    pub fn all(&self) -> Vec<R> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl<R: Record + PartialEq> MeasurementRepository<R> for InMemoryRepository<R> {
    async fn check_exist(&self, record: &R) -> Result<bool, StorageError> {
        self.ensure_available()?;
        let Some(key) = record.natural_key() else {
            return Ok(false);
        };
        Ok(self
            .lock()
            .iter()
            .any(|stored| stored.natural_key().as_ref() == Some(&key)))
    }

    async fn create(&self, mut record: R) -> Result<R, StorageError> {
        self.ensure_available()?;
        let key = record
            .natural_key()
            .ok_or_else(|| StorageError::Unaddressable(format!("{} without natural key", R::KIND)))?;

        let mut records = self.lock();
        if records
            .iter()
            .any(|stored| stored.natural_key().as_ref() == Some(&key))
        {
            return Err(StorageError::Duplicate(key.to_string()));
        }

        if record.id().is_none() {
            record.set_id(Uuid::now_v7().simple().to_string());
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update_by_natural_key(&self, mut record: R) -> Result<Option<R>, StorageError> {
        self.ensure_available()?;
        let key = record
            .natural_key()
            .ok_or_else(|| StorageError::Unaddressable(format!("{} without natural key", R::KIND)))?;

        let mut records = self.lock();
        let Some(stored) = records
            .iter_mut()
            .find(|stored| stored.natural_key().as_ref() == Some(&key))
        else {
            return Ok(None);
        };

        if let Some(id) = stored.id() {
            record.set_id(id.to_string());
        }
        if *stored == record {
            return Ok(None);
        }
        *stored = record.clone();
        Ok(Some(record))
    }

    async fn remove(&self, owner_id: &str, id: &str) -> Result<bool, StorageError> {
        self.ensure_available()?;
        let mut records = self.lock();
        let before = records.len();
        records.retain(|stored| !(stored.id() == Some(id) && stored.owner_id() == Some(owner_id)));
        Ok(records.len() != before)
    }
}
