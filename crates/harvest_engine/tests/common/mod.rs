#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use harvest_core::{
    BatchSize, DateWindow, EmailRecord, MarkOutcome, PollOutcome, ResponseRecord, WriteOutcome,
};
use harvest_engine::{
    FailureKind, JobRetriever, JobSubmitter, Pipeline, PipelineEvent, PipelineSettings,
    ProgressSink, ProviderError, RecordStore, StoreError,
};
use serde_json::Value;

pub fn init_logging() {
    harvest_logging::initialize_for_tests();
}

pub fn queries(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn fast_settings(batch_size: usize) -> PipelineSettings {
    PipelineSettings {
        batch_size: BatchSize::new(batch_size).unwrap(),
        submit_delay: Duration::ZERO,
        poll_delay: Duration::ZERO,
        extract_page_size: 2,
    }
}

/// Provider double: hands out sequential job ids (or scripted failures) and
/// answers polls from a per-job table.
#[derive(Default)]
pub struct ScriptedProvider {
    submitted: Mutex<Vec<Vec<String>>>,
    submit_failures: Mutex<VecDeque<bool>>,
    polls: Mutex<HashMap<String, Result<PollOutcome, ProviderError>>>,
    poll_count: AtomicUsize,
    next_id: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue pass/fail results for upcoming submissions; unscripted calls succeed.
    pub fn script_submissions(&self, fail: &[bool]) {
        self.submit_failures.lock().unwrap().extend(fail.iter().copied());
    }

    pub fn set_poll(&self, job_id: &str, outcome: Result<PollOutcome, ProviderError>) {
        self.polls.lock().unwrap().insert(job_id.to_string(), outcome);
    }

    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSubmitter for ScriptedProvider {
    async fn submit(&self, batch: &[String]) -> Result<String, ProviderError> {
        self.submitted.lock().unwrap().push(batch.to_vec());
        let fail = self.submit_failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(ProviderError::new(FailureKind::HttpStatus(503), "unavailable"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("s_{n}"))
    }
}

#[async_trait]
impl JobRetriever for ScriptedProvider {
    async fn poll(&self, job_id: &str) -> Result<PollOutcome, ProviderError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or(Ok(PollOutcome::Running))
    }
}

pub fn pipeline(
    store: Arc<dyn RecordStore>,
    provider: Arc<ScriptedProvider>,
    settings: PipelineSettings,
) -> Pipeline {
    Pipeline::new(store, provider.clone(), provider, settings)
}

/// Store wrapper that can be told to fail specific operations.
pub struct FlakyStore<S> {
    pub inner: S,
    pub fail_listing: AtomicBool,
    pub fail_mark_extracted: Mutex<Vec<String>>,
    pub fail_save_response: AtomicBool,
    pub list_unextracted_calls: AtomicUsize,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_listing: AtomicBool::new(false),
            fail_mark_extracted: Mutex::new(Vec::new()),
            fail_save_response: AtomicBool::new(false),
            list_unextracted_calls: AtomicUsize::new(0),
        }
    }
}

fn fault() -> StoreError {
    StoreError::Unavailable("injected fault".to_string())
}

#[async_trait]
impl<S: RecordStore> RecordStore for FlakyStore<S> {
    async fn create_job(&self, job_id: &str) -> Result<WriteOutcome, StoreError> {
        self.inner.create_job(job_id).await
    }

    async fn list_pending_jobs(&self) -> Result<Vec<String>, StoreError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(fault());
        }
        self.inner.list_pending_jobs().await
    }

    async fn mark_job_processed(&self, job_id: &str) -> Result<MarkOutcome, StoreError> {
        self.inner.mark_job_processed(job_id).await
    }

    async fn save_response(
        &self,
        job_id: &str,
        payload: &Value,
    ) -> Result<WriteOutcome, StoreError> {
        if self.fail_save_response.load(Ordering::SeqCst) {
            return Err(fault());
        }
        self.inner.save_response(job_id, payload).await
    }

    async fn list_unextracted(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ResponseRecord>, StoreError> {
        self.list_unextracted_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(fault());
        }
        self.inner.list_unextracted(limit, offset).await
    }

    async fn mark_extracted(&self, job_id: &str) -> Result<MarkOutcome, StoreError> {
        if self
            .fail_mark_extracted
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == job_id)
        {
            return Err(fault());
        }
        self.inner.mark_extracted(job_id).await
    }

    async fn save_email(&self, address: &str) -> Result<WriteOutcome, StoreError> {
        self.inner.save_email(address).await
    }

    async fn query_emails(&self, window: &DateWindow) -> Result<Vec<EmailRecord>, StoreError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(fault());
        }
        self.inner.query_emails(window).await
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
