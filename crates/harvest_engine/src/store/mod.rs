//! Durable record keeping for job handles, raw responses and emails.
//!
//! Every write that is guarded by a unique key reports `Duplicate` as a normal
//! outcome; only genuine storage faults come back as `StoreError`.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_core::{DateWindow, EmailRecord, MarkOutcome, ResponseRecord, WriteOutcome};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Source of creation timestamps for email records.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Operations the pipeline needs from a backing store.
///
/// Implementations must be safe to use from independent pipeline runs at the
/// same time: unique inserts let exactly one writer win and status flips
/// never move a record backwards.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Record a new pending job handle.
    async fn create_job(&self, job_id: &str) -> Result<WriteOutcome, StoreError>;

    /// Job handles still waiting for a result, oldest first.
    async fn list_pending_jobs(&self) -> Result<Vec<String>, StoreError>;

    async fn mark_job_processed(&self, job_id: &str) -> Result<MarkOutcome, StoreError>;

    /// Store the raw payload for a job; at most one per job.
    async fn save_response(&self, job_id: &str, payload: &Value)
        -> Result<WriteOutcome, StoreError>;

    /// A page of responses not yet scanned for emails, in insertion order.
    ///
    /// Rows leave this set once marked extracted, so re-reading from offset 0
    /// after a fully marked page advances through the backlog.
    async fn list_unextracted(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ResponseRecord>, StoreError>;

    async fn mark_extracted(&self, job_id: &str) -> Result<MarkOutcome, StoreError>;

    /// Store an address once for the lifetime of the store.
    async fn save_email(&self, address: &str) -> Result<WriteOutcome, StoreError>;

    /// Emails created inside `window`, newest first.
    async fn query_emails(&self, window: &DateWindow) -> Result<Vec<EmailRecord>, StoreError>;
}
