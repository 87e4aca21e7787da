//! Per-run tallies returned by each pipeline stage.
//!
//! A tally is always produced, even when the run could not start: the
//! `aborted` constructors give an all-zero tally carrying the reason.

use serde::Serialize;

use crate::{EmailRecord, MarkOutcome, WriteOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SubmitStats {
    pub total_queries: usize,
    pub total_batches: usize,
    pub successful_jobs: usize,
    pub duplicate_jobs: usize,
    pub failed_batches: usize,
    pub submitted_ids: Vec<String>,
    pub cancelled: bool,
    pub message: String,
}

impl SubmitStats {
    pub fn new(total_queries: usize) -> Self {
        Self {
            total_queries,
            ..Self::default()
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn record_attempt(&mut self) {
        self.total_batches += 1;
    }

    /// A batch was accepted by the provider and its job handle recorded.
    pub fn record_job(&mut self, job_id: &str, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.successful_jobs += 1,
            WriteOutcome::Duplicate => self.duplicate_jobs += 1,
        }
        self.submitted_ids.push(job_id.to_string());
    }

    pub fn record_failure(&mut self) {
        self.failed_batches += 1;
    }

    pub fn finish(mut self) -> Self {
        self.message = format!(
            "Submitted {}/{} batches ({} queries)",
            self.successful_jobs + self.duplicate_jobs,
            self.total_batches,
            self.total_queries
        );
        if self.cancelled {
            self.message.push_str(", cancelled");
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RetrieveStats {
    /// Pending jobs found at the start of the run.
    pub total: usize,
    /// Response stored and job marked processed.
    pub successful: usize,
    /// Response already stored by an earlier or concurrent run.
    pub duplicates: usize,
    /// Provider still working; left pending.
    pub running: usize,
    /// Provider finished with nothing to keep; left pending.
    pub skipped: usize,
    /// Poll request failed; left pending.
    pub poll_errors: usize,
    /// Store faults while saving or marking.
    pub db_errors: usize,
    /// Jobs that could not be advanced because of a store fault or a missing row.
    pub failed: usize,
    pub cancelled: bool,
    pub message: String,
}

impl RetrieveStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Count the outcome of marking a job processed after its response was saved
    /// (`saved`) or found already present.
    pub fn record_mark(&mut self, saved: WriteOutcome, mark: MarkOutcome) {
        match (saved, mark) {
            (WriteOutcome::Created, MarkOutcome::Updated) => self.successful += 1,
            (WriteOutcome::Duplicate, MarkOutcome::Updated) => self.duplicates += 1,
            (_, MarkOutcome::NotFound) => self.failed += 1,
        }
    }

    pub fn record_db_error(&mut self) {
        self.db_errors += 1;
        self.failed += 1;
    }

    pub fn finish(mut self) -> Self {
        self.message = if self.total == 0 {
            "No pending jobs found".to_string()
        } else {
            format!(
                "Processed {}/{} jobs successfully",
                self.successful + self.duplicates,
                self.total
            )
        };
        if self.cancelled {
            self.message.push_str(", cancelled");
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExtractStats {
    /// Unextracted responses visited.
    pub total: usize,
    /// Responses marked extracted.
    pub successful: usize,
    /// Responses left unextracted.
    pub failed: usize,
    pub emails_found: usize,
    pub emails_saved: usize,
    pub duplicate_emails: usize,
    pub db_errors: usize,
    pub pages: usize,
    pub cancelled: bool,
    pub message: String,
}

impl ExtractStats {
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn record_email(&mut self, outcome: Option<WriteOutcome>) {
        self.emails_found += 1;
        match outcome {
            Some(WriteOutcome::Created) => self.emails_saved += 1,
            Some(WriteOutcome::Duplicate) => self.duplicate_emails += 1,
            None => self.db_errors += 1,
        }
    }

    /// Count the status flip for one response; `None` means the store faulted.
    pub fn record_mark(&mut self, mark: Option<MarkOutcome>) {
        match mark {
            Some(MarkOutcome::Updated) => self.successful += 1,
            Some(MarkOutcome::NotFound) => self.failed += 1,
            None => {
                self.db_errors += 1;
                self.failed += 1;
            }
        }
    }

    pub fn finish(mut self) -> Self {
        self.message = if self.total == 0 {
            "No unextracted responses found".to_string()
        } else {
            format!(
                "Processed {}/{} responses, saved {} new emails",
                self.successful, self.total, self.emails_saved
            )
        };
        if self.cancelled {
            self.message.push_str(", cancelled");
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EmailReport {
    /// Newest first.
    pub emails: Vec<EmailRecord>,
    pub message: String,
}

impl EmailReport {
    pub fn new(emails: Vec<EmailRecord>) -> Self {
        let message = if emails.is_empty() {
            "No emails found for the selected date range".to_string()
        } else {
            format!("Found {} emails", emails.len())
        };
        Self { emails, message }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            emails: Vec::new(),
            message: message.into(),
        }
    }

    pub fn total(&self) -> usize {
        self.emails.len()
    }
}
