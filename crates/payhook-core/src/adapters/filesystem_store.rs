//! # Filesystem Idempotency Store
//!
//! Durable [`IdempotencyStore`] keeping one JSON file per processed event.
//!
//! The unique-insert primitive is a hard link: the record is written to a
//! private temporary file and then linked to its final name, which fails with
//! `AlreadyExists` if another writer got there first. Readers therefore never
//! observe a partially written record.
//!
//! The store cannot update orders in the same transaction, so the service runs
//! it in two-step mode.

use crate::{
    idempotency::{IdempotencyStore, MarkOutcome, ProcessedWebhookRecord, StoreError},
    identity::EventIdentity,
    Clock, Gateway, SystemClock, Timestamp, DEFAULT_RETENTION_DAYS,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const RECORD_EXTENSION: &str = "json";

/// Staging file for a record, unlinked when dropped.
///
/// Covers every exit from a write, including a failed `write_all` or
/// `sync_all`, so no `.tmp` file outlives the call.
struct TempRecordFile {
    path: PathBuf,
}

impl TempRecordFile {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!(".{}.tmp", Uuid::new_v4().simple())),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempRecordFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove temporary record file");
            }
        }
    }
}

/// One file per event under `<base>/processed/`
#[derive(Clone)]
pub struct FilesystemIdempotencyStore {
    records_dir: PathBuf,
    clock: Arc<dyn Clock>,
    retention_days: u32,
}

impl FilesystemIdempotencyStore {
    /// Create the store, creating `base_path/processed` if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let records_dir = base_path.as_ref().join("processed");
        fs::create_dir_all(&records_dir).await?;

        Ok(Self {
            records_dir,
            clock: Arc::new(SystemClock),
            retention_days: DEFAULT_RETENTION_DAYS,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Event ids are gateway-controlled strings; hash them into safe file names.
    fn record_path(&self, event_id: &str) -> PathBuf {
        let digest = Sha256::digest(event_id.as_bytes());
        self.records_dir
            .join(format!("{}.{}", hex::encode(digest), RECORD_EXTENSION))
    }

    async fn read_record(path: &Path) -> Result<Option<ProcessedWebhookRecord>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IdempotencyStore for FilesystemIdempotencyStore {
    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    #[instrument(skip(self, identity), fields(event_id = %identity.event_id))]
    async fn check_and_mark(
        &self,
        gateway: Gateway,
        identity: &EventIdentity,
    ) -> Result<MarkOutcome, StoreError> {
        let final_path = self.record_path(&identity.event_id);
        let record = ProcessedWebhookRecord::new(gateway, identity, self.now(), self.retention_days);
        let json = serde_json::to_vec_pretty(&record)?;

        let temp = TempRecordFile::new(&self.records_dir);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp.path())
            .await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        let linked = fs::hard_link(temp.path(), &final_path).await;
        drop(temp);

        match linked {
            Ok(()) => Ok(MarkOutcome::Fresh),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Processed-webhook record already exists");
                Ok(MarkOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_record(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookRecord>, StoreError> {
        Self::read_record(&self.record_path(event_id)).await
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut entries = fs::read_dir(&self.records_dir).await?;
        let mut purged = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let record = match Self::read_record(&path).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                    continue;
                }
            };

            if record.is_expired(now) {
                match fs::remove_file(&path).await {
                    Ok(()) => purged += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(purged)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let metadata = fs::metadata(&self.records_dir).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                message: format!("{} is not a directory", self.records_dir.display()),
            })
        }
    }
}

#[cfg(test)]
#[path = "filesystem_store_tests.rs"]
mod tests;
