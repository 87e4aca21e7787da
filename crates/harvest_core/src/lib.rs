//! Harvest core: record lifecycle, outcomes, extraction and per-run tallies.
//!
//! Nothing in this crate performs I/O; the engine drives these types against a
//! provider and a store.
mod batch;
mod extract;
mod outcome;
mod record;
mod stage;
mod stats;
mod window;

pub use batch::{plan_batches, BatchSize, BatchSizeError, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
pub use extract::EmailExtractor;
pub use outcome::{MarkOutcome, PollOutcome, WriteOutcome};
pub use record::{EmailRecord, JobRecord, JobStatus, ParseStatusError, ResponseRecord};
pub use stage::Stage;
pub use stats::{EmailReport, ExtractStats, RetrieveStats, SubmitStats};
pub use window::{DateWindow, WindowError};
