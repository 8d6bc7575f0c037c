// Copyright (c) 2025 - Cowboy AI, Inc.
//! File-backed outbox store
//!
//! One JSON document per record, named `<id>.json`, inside a single
//! directory. Records are written to a temporary file and renamed into
//! place, so a crash never leaves a half-written record behind. Ids are
//! UUID v7, so sorting file names lists records oldest first.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{OutboxEntry, OutboxError, OutboxId, OutboxRecord, OutboxStore};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Outbox persisted as files in a directory
#[derive(Debug, Clone)]
pub struct FileOutboxStore {
    dir: PathBuf,
}

impl FileOutboxStore {
    /// Open (creating if needed) the outbox directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, OutboxError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Outbox directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &OutboxId) -> PathBuf {
        self.dir.join(format!("{}.{RECORD_EXTENSION}", id.as_str()))
    }
}

#[async_trait]
impl OutboxStore for FileOutboxStore {
    async fn append(&self, entry: OutboxEntry) -> Result<OutboxRecord, OutboxError> {
        let record = OutboxRecord::from_entry(OutboxId::generate(), entry);
        let body = serde_json::to_vec_pretty(&record)?;

        let path = self.record_path(&record.id);
        let temp = path.with_extension(TEMP_EXTENSION);
        fs::write(&temp, body).await?;
        fs::rename(&temp, &path).await?;

        debug!(record_id = %record.id, routing_key = %record.routing_key, "Outbox record written");
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<OutboxRecord>, OutboxError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let body = match fs::read(&path).await {
                Ok(body) => body,
                // Deleted by a concurrent drain between read_dir and read.
                Err(error) if error.kind() == ErrorKind::NotFound => continue,
                Err(error) => return Err(error.into()),
            };
            match serde_json::from_slice::<OutboxRecord>(&body) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "Skipping unreadable outbox record");
                }
            }
        }
        Ok(records)
    }

    async fn delete(&self, id: &OutboxId) -> Result<bool, OutboxError> {
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IntegrationEvent;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry() -> OutboxEntry {
        let mut event = IntegrationEvent::new("PhysicalActivitySaveEvent", Utc::now());
        event
            .payload
            .insert("physicalactivity".to_string(), json!({ "child_id": "c1" }));
        OutboxEntry::publish(event, "activities.save")
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();

        let written = {
            let store = FileOutboxStore::open(dir.path()).await.unwrap();
            store.append(entry()).await.unwrap()
        };

        let reopened = FileOutboxStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.list().await.unwrap(), vec![written]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileOutboxStore::open(dir.path()).await.unwrap();
        let record = store.append(entry()).await.unwrap();

        assert!(store.delete(&record.id).await.unwrap());
        assert!(!store.delete(&record.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_with_foreign_event_type_is_listed() {
        let dir = TempDir::new().unwrap();
        let store = FileOutboxStore::open(dir.path()).await.unwrap();
        let body = json!({
            "id": "weight-1",
            "event_name": "WeightSaveEvent",
            "type": "weight",
            "timestamp": "2026-01-19T12:00:00Z",
            "weight": { "child_id": "c1" },
            "__operation": "publish",
            "__routing_key": "weights.save"
        });
        fs::write(dir.path().join("weight-1.json"), body.to_string()).await.unwrap();

        let listed = store.list().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].to_event().to_json()["type"], "weight");
        assert!(store.delete(&OutboxId::from("weight-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_and_foreign_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = FileOutboxStore::open(dir.path()).await.unwrap();
        let record = store.append(entry()).await.unwrap();

        fs::write(dir.path().join("broken.json"), b"{").await.unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);
    }

    #[tokio::test]
    async fn test_open_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("var").join("outbox");

        let store = FileOutboxStore::open(&nested).await.unwrap();

        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }
}
