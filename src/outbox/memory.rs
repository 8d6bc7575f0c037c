// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory outbox store

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{OutboxEntry, OutboxError, OutboxId, OutboxRecord, OutboxStore};

#[derive(Default)]
struct Inner {
    records: Vec<OutboxRecord>,
    failing_deletes: HashSet<OutboxId>,
}

/// Outbox kept in process memory; lost on restart
#[derive(Default)]
pub struct InMemoryOutboxStore {
    inner: Mutex<Inner>,
    list_calls: AtomicU64,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record with a caller-chosen id
    pub fn insert(&self, record: OutboxRecord) {
        self.lock().records.push(record);
    }

    /// Make deleting `id` fail with an I/O error
    pub fn fail_delete(&self, id: OutboxId) {
        self.lock().failing_deletes.insert(id);
    }

    /// How many times [`list`](OutboxStore::list) has been called
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Ids currently stored, in insertion order
    pub fn ids(&self) -> Vec<OutboxId> {
        self.lock().records.iter().map(|record| record.id.clone()).collect()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn append(&self, entry: OutboxEntry) -> Result<OutboxRecord, OutboxError> {
        let record = OutboxRecord::from_entry(OutboxId::generate(), entry);
        self.lock().records.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<OutboxRecord>, OutboxError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().records.clone())
    }

    async fn delete(&self, id: &OutboxId) -> Result<bool, OutboxError> {
        let mut inner = self.lock();
        if inner.failing_deletes.contains(id) {
            return Err(OutboxError::Io(std::io::Error::other(format!(
                "delete of {id} rejected"
            ))));
        }
        let before = inner.records.len();
        inner.records.retain(|record| &record.id != id);
        Ok(inner.records.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IntegrationEvent;
    use chrono::Utc;

    fn entry(name: &str) -> OutboxEntry {
        OutboxEntry::publish(IntegrationEvent::new(name, Utc::now()), "sleep.save")
    }

    #[tokio::test]
    async fn test_append_list_delete() {
        let store = InMemoryOutboxStore::new();

        let first = store.append(entry("SleepSaveEvent")).await.unwrap();
        let second = store.append(entry("SleepUpdateEvent")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.list().await.unwrap().len(), 2);

        assert!(store.delete(&first.id).await.unwrap());
        assert!(!store.delete(&first.id).await.unwrap());
        assert_eq!(store.ids(), vec![second.id]);
    }

    #[tokio::test]
    async fn test_injected_delete_failure() {
        let store = InMemoryOutboxStore::new();
        let record = store.append(entry("SleepSaveEvent")).await.unwrap();
        store.fail_delete(record.id.clone());

        assert!(matches!(
            store.delete(&record.id).await,
            Err(OutboxError::Io(_))
        ));
        assert_eq!(store.len(), 1);
    }
}
