use std::fmt;

use harvest_core::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    pub stage: Stage,
    /// 1-based position of the item within the run.
    pub position: usize,
    /// Known up front for submission and retrieval; extraction pages lazily.
    pub total: Option<usize>,
    pub item: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Progress(StageProgress),
    StageFinished { stage: Stage },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    EmptyBatch,
    BatchTooLarge { max: usize, actual: usize },
    HttpStatus(u16),
    Timeout,
    Network,
    MalformedResponse,
    MissingJobId,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::EmptyBatch => write!(f, "empty batch"),
            FailureKind::BatchTooLarge { max, actual } => {
                write!(f, "batch too large (max {max}, actual {actual})")
            }
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
            FailureKind::MissingJobId => write!(f, "missing job id"),
        }
    }
}
