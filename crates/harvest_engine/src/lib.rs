//! Harvest engine: provider client, record store and the stage pipeline.
mod export;
mod persist;
mod pipeline;
mod provider;
mod store;
mod types;

pub use export::{export_emails_csv, export_filename, render_emails_csv, ExportError};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{NoopSink, Pipeline, PipelineSettings, ProgressSink};
pub use provider::{JobRetriever, JobSubmitter, ProviderClient, ProviderSettings};
pub use store::{system_clock, Clock, MemoryStore, RecordStore, SqliteStore, StoreError};
pub use types::{FailureKind, PipelineEvent, ProviderError, StageProgress};
