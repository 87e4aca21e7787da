use std::sync::Arc;
use std::time::Duration;

use harvest_core::{
    plan_batches, BatchSize, DateWindow, EmailExtractor, EmailReport, ExtractStats, MarkOutcome,
    PollOutcome, RetrieveStats, Stage, SubmitStats, WriteOutcome,
};
use harvest_logging::{harvest_debug, harvest_error, harvest_info, harvest_warn, in_stage};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{JobRetriever, JobSubmitter, PipelineEvent, RecordStore, StageProgress};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: BatchSize,
    /// Pause between submissions, to respect provider rate limits.
    pub submit_delay: Duration,
    /// Pause between polls of consecutive job handles.
    pub poll_delay: Duration,
    /// Responses fetched per extraction page.
    pub extract_page_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: BatchSize::default(),
            submit_delay: Duration::from_secs(2),
            poll_delay: Duration::from_millis(500),
            extract_page_size: 100,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Drives work items through submission, retrieval, extraction and lookup.
///
/// Each stage handles one item at a time, in list order. Per-item failures are
/// counted and skipped; only failing to read the initial work list aborts a
/// run. Every stage only moves records forward, so re-running any stage after
/// a partial failure converges.
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    submitter: Arc<dyn JobSubmitter>,
    retriever: Arc<dyn JobRetriever>,
    extractor: EmailExtractor,
    settings: PipelineSettings,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        submitter: Arc<dyn JobSubmitter>,
        retriever: Arc<dyn JobRetriever>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            submitter,
            retriever,
            extractor: EmailExtractor::new(),
            settings,
            sink: Arc::new(NoopSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Stop at the next item boundary once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Stage 1: submit queries in fixed-size batches and record each job handle.
    ///
    /// A failed batch is counted and not retried within the run.
    pub async fn submit_queries(&self, queries: &[String]) -> SubmitStats {
        in_stage(Stage::Submit.label(), self.run_submit(queries)).await
    }

    async fn run_submit(&self, queries: &[String]) -> SubmitStats {
        let batches = plan_batches(queries, self.settings.batch_size);
        let total = batches.len();
        let mut stats = SubmitStats::new(queries.len());
        harvest_info!(
            "Starting to process {} queries with batch size {}",
            queries.len(),
            self.settings.batch_size
        );

        for (index, batch) in batches.iter().enumerate() {
            if index > 0 && !self.pause(self.settings.submit_delay).await {
                stats.cancelled = true;
                break;
            }
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let position = index + 1;
            self.progress(Stage::Submit, position, Some(total), format!("batch {position}"));
            stats.record_attempt();

            let job_id = match self.submitter.submit(batch).await {
                Ok(job_id) => job_id,
                Err(err) => {
                    harvest_warn!("Batch {} ({} queries) failed: {}", position, batch.len(), err);
                    stats.record_failure();
                    continue;
                }
            };
            match self.store.create_job(&job_id).await {
                Ok(outcome) => {
                    if outcome == WriteOutcome::Duplicate {
                        harvest_warn!("Job {} was already recorded", job_id);
                    }
                    stats.record_job(&job_id, outcome);
                }
                Err(err) => {
                    // The provider holds this job but we could not record it.
                    harvest_error!("Failed to record job {}: {}", job_id, err);
                    stats.record_failure();
                }
            }
        }

        self.finished(Stage::Submit);
        let stats = stats.finish();
        harvest_info!("{}", stats.message);
        stats
    }

    /// Stage 2: poll every pending job and persist completed results.
    ///
    /// Running, empty and unreachable jobs stay pending for a later run.
    pub async fn retrieve_pending(&self) -> RetrieveStats {
        in_stage(Stage::Retrieve.label(), self.run_retrieve()).await
    }

    async fn run_retrieve(&self) -> RetrieveStats {
        let job_ids = match self.store.list_pending_jobs().await {
            Ok(ids) => ids,
            Err(err) => {
                harvest_error!("Could not list pending jobs: {}", err);
                return RetrieveStats::aborted(format!("Error: {err}"));
            }
        };
        let total = job_ids.len();
        let mut stats = RetrieveStats::new(total);
        harvest_info!("Found {} pending jobs", total);

        for (index, job_id) in job_ids.iter().enumerate() {
            if index > 0 && !self.pause(self.settings.poll_delay).await {
                stats.cancelled = true;
                break;
            }
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            self.progress(Stage::Retrieve, index + 1, Some(total), job_id.clone());

            let polled = self.retriever.poll(job_id).await;
            if let Ok(outcome) = &polled {
                harvest_debug!("Job {} polled: {}", job_id, outcome.label());
            }
            match polled {
                Ok(PollOutcome::Completed(payload)) => {
                    self.store_result(job_id, &payload, &mut stats).await;
                }
                Ok(PollOutcome::Running) => {
                    harvest_info!("Job {} still running, leaving pending", job_id);
                    stats.running += 1;
                }
                Ok(PollOutcome::NoData) => {
                    harvest_warn!("Skipped job {}: no data received", job_id);
                    stats.skipped += 1;
                }
                Err(err) => {
                    harvest_warn!("Polling job {} failed: {}", job_id, err);
                    stats.poll_errors += 1;
                }
            }
        }

        self.finished(Stage::Retrieve);
        let stats = stats.finish();
        harvest_info!("{}", stats.message);
        stats
    }

    async fn store_result(&self, job_id: &str, payload: &Value, stats: &mut RetrieveStats) {
        let saved = match self.store.save_response(job_id, payload).await {
            Ok(saved) => saved,
            Err(err) => {
                harvest_error!("Failed to save response for {}: {}", job_id, err);
                stats.record_db_error();
                return;
            }
        };
        if saved == WriteOutcome::Duplicate {
            harvest_warn!("Response for {} already stored", job_id);
        }
        // A duplicate still closes the job: the data exists under this key.
        match self.store.mark_job_processed(job_id).await {
            Ok(mark) => {
                if mark == MarkOutcome::NotFound {
                    harvest_error!("Job {} vanished before it could be marked processed", job_id);
                }
                stats.record_mark(saved, mark);
            }
            Err(err) => {
                harvest_error!("Failed to mark {} as processed: {}", job_id, err);
                stats.record_db_error();
            }
        }
    }

    /// Stage 3: scan every unextracted response and store the emails found.
    ///
    /// A response is marked extracted even when it holds no emails. Pages are
    /// re-read from the head of the shrinking unextracted set; rows whose mark
    /// failed stay at the head, so the offset skips exactly those.
    pub async fn extract_emails(&self) -> ExtractStats {
        in_stage(Stage::Extract.label(), self.run_extract()).await
    }

    async fn run_extract(&self) -> ExtractStats {
        let page_size = self.settings.extract_page_size.max(1);
        let mut stats = ExtractStats::default();
        let mut stuck = 0usize;

        'pages: loop {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let page = match self.store.list_unextracted(page_size, stuck).await {
                Ok(page) => page,
                Err(err) if stats.pages == 0 => {
                    harvest_error!("Could not list unextracted responses: {}", err);
                    return ExtractStats::aborted(format!("Error: {err}"));
                }
                Err(err) => {
                    harvest_error!("Could not list the next page of responses: {}", err);
                    stats.db_errors += 1;
                    break;
                }
            };
            stats.pages += 1;
            let fetched = page.len();

            for row in page {
                if self.cancel.is_cancelled() {
                    stats.cancelled = true;
                    break 'pages;
                }
                stats.total += 1;
                self.progress(Stage::Extract, stats.total, None, row.job_id.clone());

                let emails = self.extractor.extract(&row.payload);
                for address in &emails {
                    match self.store.save_email(address).await {
                        Ok(outcome) => stats.record_email(Some(outcome)),
                        Err(err) => {
                            harvest_error!("Failed to save email {}: {}", address, err);
                            stats.record_email(None);
                        }
                    }
                }
                if !emails.is_empty() {
                    harvest_info!("Extracted {} emails from {}", emails.len(), row.job_id);
                }

                match self.store.mark_extracted(&row.job_id).await {
                    Ok(mark) => {
                        if mark == MarkOutcome::NotFound {
                            harvest_warn!("Response {} disappeared before marking", row.job_id);
                        }
                        stats.record_mark(Some(mark));
                    }
                    Err(err) => {
                        harvest_error!("Failed to mark {} as extracted: {}", row.job_id, err);
                        stuck += 1;
                        stats.record_mark(None);
                    }
                }
            }

            if fetched < page_size {
                break;
            }
        }

        self.finished(Stage::Extract);
        let stats = stats.finish();
        harvest_info!("{}", stats.message);
        stats
    }

    /// Stage 4: read stored emails within `window`, newest first.
    pub async fn query_emails(&self, window: &DateWindow) -> EmailReport {
        in_stage(Stage::Query.label(), self.run_query(window)).await
    }

    async fn run_query(&self, window: &DateWindow) -> EmailReport {
        let report = match self.store.query_emails(window).await {
            Ok(emails) => EmailReport::new(emails),
            Err(err) => {
                harvest_error!("Error fetching emails: {}", err);
                EmailReport::aborted(format!("Error: {err}"))
            }
        };
        harvest_info!("{}", report.message);
        report
    }

    /// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn progress(&self, stage: Stage, position: usize, total: Option<usize>, item: String) {
        self.sink.emit(PipelineEvent::Progress(StageProgress {
            stage,
            position,
            total,
            item,
        }));
    }

    fn finished(&self, stage: Stage) {
        self.sink.emit(PipelineEvent::StageFinished { stage });
    }
}
