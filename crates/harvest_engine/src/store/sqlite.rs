//! SQLite storage implementation.
//!
//! Unique constraints on `job_id` and `address` are enforced by the database;
//! inserts use `ON CONFLICT DO NOTHING` so concurrent writers race safely and
//! the loser observes `Duplicate` instead of an error.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use harvest_core::{
    DateWindow, EmailRecord, JobRecord, JobStatus, MarkOutcome, ResponseRecord, WriteOutcome,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{system_clock, Clock, RecordStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'pending'
);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, id);

CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL UNIQUE,
    payload TEXT NOT NULL,
    extracted INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_responses_extracted ON responses(extracted, id);

CREATE TABLE IF NOT EXISTS emails (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_emails_created_at ON emails(created_at);
"#;

pub struct SqliteStore {
    pool: SqlitePool,
    clock: Clock,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url`.
    ///
    /// # Example URLs
    /// - `sqlite://harvest.db` - File-based database
    /// - `sqlite::memory:` - use [`SqliteStore::in_memory`] instead
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// A private in-memory database.
    ///
    /// Pinned to a single long-lived connection, since every SQLite memory
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self {
            pool,
            clock: system_clock(),
        })
    }

    /// Use `clock` to stamp new email records.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Look up one job handle and its status.
    pub async fn job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query("SELECT job_id, status FROM jobs WHERE job_id = ?1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }
}

// Fixed-width UTC text so that string comparison in SQL orders like time.
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("invalid created_at {raw:?}: {err}")))
}

fn write_outcome(rows_affected: u64) -> WriteOutcome {
    if rows_affected == 0 {
        WriteOutcome::Duplicate
    } else {
        WriteOutcome::Created
    }
}

fn mark_outcome(rows_affected: u64) -> MarkOutcome {
    if rows_affected == 0 {
        MarkOutcome::NotFound
    } else {
        MarkOutcome::Updated
    }
}

fn job_from_row(row: &SqliteRow) -> Result<JobRecord, StoreError> {
    let job_id: String = row.try_get("job_id")?;
    let raw: String = row.try_get("status")?;
    let status = raw
        .parse::<JobStatus>()
        .map_err(|err| StoreError::Corrupt(format!("job {job_id}: {err}")))?;
    Ok(JobRecord { job_id, status })
}

fn response_from_row(row: &SqliteRow) -> Result<ResponseRecord, StoreError> {
    let job_id: String = row.try_get("job_id")?;
    let raw: String = row.try_get("payload")?;
    // A payload that no longer parses is still scanned as plain text.
    let payload = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    Ok(ResponseRecord {
        job_id,
        payload,
        extracted: false,
    })
}

fn email_from_row(row: &SqliteRow) -> Result<EmailRecord, StoreError> {
    let address: String = row.try_get("address")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(EmailRecord {
        address,
        created_at: decode_timestamp(&created_at)?,
    })
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create_job(&self, job_id: &str) -> Result<WriteOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO jobs (job_id, status) VALUES (?1, ?2) ON CONFLICT(job_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(JobStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(write_outcome(result.rows_affected()))
    }

    async fn list_pending_jobs(&self) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT job_id FROM jobs WHERE status = ?1 ORDER BY id",
        )
        .bind(JobStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn mark_job_processed(&self, job_id: &str) -> Result<MarkOutcome, StoreError> {
        let result = sqlx::query("UPDATE jobs SET status = ?2 WHERE job_id = ?1")
            .bind(job_id)
            .bind(JobStatus::Processed.as_str())
            .execute(&self.pool)
            .await?;
        Ok(mark_outcome(result.rows_affected()))
    }

    async fn save_response(
        &self,
        job_id: &str,
        payload: &Value,
    ) -> Result<WriteOutcome, StoreError> {
        let encoded = serde_json::to_string(payload)?;
        let result = sqlx::query(
            "INSERT INTO responses (job_id, payload, extracted) VALUES (?1, ?2, 0) \
             ON CONFLICT(job_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(encoded)
        .execute(&self.pool)
        .await?;
        Ok(write_outcome(result.rows_affected()))
    }

    async fn list_unextracted(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ResponseRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT job_id, payload FROM responses WHERE extracted = 0 ORDER BY id LIMIT ?1 OFFSET ?2",
        )
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(response_from_row).collect()
    }

    async fn mark_extracted(&self, job_id: &str) -> Result<MarkOutcome, StoreError> {
        let result = sqlx::query("UPDATE responses SET extracted = 1 WHERE job_id = ?1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(mark_outcome(result.rows_affected()))
    }

    async fn save_email(&self, address: &str) -> Result<WriteOutcome, StoreError> {
        let created_at = encode_timestamp((self.clock)());
        let result = sqlx::query(
            "INSERT INTO emails (address, created_at) VALUES (?1, ?2) ON CONFLICT(address) DO NOTHING",
        )
        .bind(address)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(write_outcome(result.rows_affected()))
    }

    async fn query_emails(&self, window: &DateWindow) -> Result<Vec<EmailRecord>, StoreError> {
        let (lower, upper) = window.bounds();
        let rows = sqlx::query(
            "SELECT address, created_at FROM emails \
             WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at < ?2) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(lower.map(encode_timestamp))
        .bind(upper.map(encode_timestamp))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(email_from_row).collect()
    }
}
