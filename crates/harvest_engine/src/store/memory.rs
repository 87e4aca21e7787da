//! In-memory store for tests and dry runs. Data is lost on drop.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use harvest_core::{DateWindow, EmailRecord, JobRecord, MarkOutcome, ResponseRecord, WriteOutcome};
use serde_json::Value;

use super::{system_clock, Clock, RecordStore, StoreError};

#[derive(Default)]
struct Tables {
    jobs: Vec<JobRecord>,
    job_index: HashMap<String, usize>,
    responses: Vec<ResponseRecord>,
    response_index: HashMap<String, usize>,
    emails: Vec<EmailRecord>,
    addresses: HashSet<String>,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    clock: Clock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock: system_clock(),
        }
    }

    /// Use `clock` to stamp new email records.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    pub fn job(&self, job_id: &str) -> Option<JobRecord> {
        let tables = self.lock().ok()?;
        tables
            .job_index
            .get(job_id)
            .map(|&idx| tables.jobs[idx].clone())
    }

    pub fn response(&self, job_id: &str) -> Option<ResponseRecord> {
        let tables = self.lock().ok()?;
        tables
            .response_index
            .get(job_id)
            .map(|&idx| tables.responses[idx].clone())
    }

    pub fn job_count(&self) -> usize {
        self.lock().map(|t| t.jobs.len()).unwrap_or(0)
    }

    pub fn response_count(&self) -> usize {
        self.lock().map(|t| t.responses.len()).unwrap_or(0)
    }

    pub fn email_count(&self) -> usize {
        self.lock().map(|t| t.emails.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_job(&self, job_id: &str) -> Result<WriteOutcome, StoreError> {
        let mut tables = self.lock()?;
        if tables.job_index.contains_key(job_id) {
            return Ok(WriteOutcome::Duplicate);
        }
        let idx = tables.jobs.len();
        tables.jobs.push(JobRecord::pending(job_id));
        tables.job_index.insert(job_id.to_string(), idx);
        Ok(WriteOutcome::Created)
    }

    async fn list_pending_jobs(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .jobs
            .iter()
            .filter(|job| !job.status.is_terminal())
            .map(|job| job.job_id.clone())
            .collect())
    }

    async fn mark_job_processed(&self, job_id: &str) -> Result<MarkOutcome, StoreError> {
        let mut tables = self.lock()?;
        let Some(&idx) = tables.job_index.get(job_id) else {
            return Ok(MarkOutcome::NotFound);
        };
        let job = &mut tables.jobs[idx];
        job.status = job.status.advance();
        Ok(MarkOutcome::Updated)
    }

    async fn save_response(
        &self,
        job_id: &str,
        payload: &Value,
    ) -> Result<WriteOutcome, StoreError> {
        let mut tables = self.lock()?;
        if tables.response_index.contains_key(job_id) {
            return Ok(WriteOutcome::Duplicate);
        }
        let idx = tables.responses.len();
        tables.responses.push(ResponseRecord {
            job_id: job_id.to_string(),
            payload: payload.clone(),
            extracted: false,
        });
        tables.response_index.insert(job_id.to_string(), idx);
        Ok(WriteOutcome::Created)
    }

    async fn list_unextracted(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ResponseRecord>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .responses
            .iter()
            .filter(|row| !row.extracted)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_extracted(&self, job_id: &str) -> Result<MarkOutcome, StoreError> {
        let mut tables = self.lock()?;
        let Some(&idx) = tables.response_index.get(job_id) else {
            return Ok(MarkOutcome::NotFound);
        };
        tables.responses[idx].extracted = true;
        Ok(MarkOutcome::Updated)
    }

    async fn save_email(&self, address: &str) -> Result<WriteOutcome, StoreError> {
        let created_at = (self.clock)();
        let mut tables = self.lock()?;
        if !tables.addresses.insert(address.to_string()) {
            return Ok(WriteOutcome::Duplicate);
        }
        tables.emails.push(EmailRecord {
            address: address.to_string(),
            created_at,
        });
        Ok(WriteOutcome::Created)
    }

    async fn query_emails(&self, window: &DateWindow) -> Result<Vec<EmailRecord>, StoreError> {
        let tables = self.lock()?;
        // Reverse first so equal timestamps keep newest-inserted first after the stable sort.
        let mut matching: Vec<EmailRecord> = tables
            .emails
            .iter()
            .rev()
            .filter(|email| window.contains(email.created_at))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}
