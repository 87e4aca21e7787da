use serde_json::Value;

/// Non-error result of an insert guarded by a unique key.
///
/// Storage faults travel separately as the `Err` arm, so callers can tell
/// "already stored" apart from "could not store".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Duplicate,
}

impl WriteOutcome {
    pub fn is_created(self) -> bool {
        self == WriteOutcome::Created
    }
}

/// Result of a status flip on an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Updated,
    NotFound,
}

/// What the provider reports for a job handle.
///
/// `Running` is expected and retryable. `NoData` means the job finished
/// without anything to keep. Transport failures are reported as errors, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(Value),
    Running,
    NoData,
}

impl PollOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Completed(_) => "completed",
            PollOutcome::Running => "running",
            PollOutcome::NoData => "no data",
        }
    }
}
