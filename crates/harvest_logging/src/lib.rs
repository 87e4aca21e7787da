#![deny(missing_docs)]
//! Shared logging utilities for the harvest workspace.
//!
//! This crate provides the `harvest_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every message is
//! prefixed with the pipeline stage of the future that emitted it.

use std::future::Future;

#[doc(hidden)]
pub use log as __log;

const NO_STAGE: &str = "-";

tokio::task_local! {
    /// Label of the pipeline stage the current future is driving.
    static STAGE: &'static str;
}

/// Retrieves the stage label of the future being polled.
/// Returns `"-"` outside any [`in_stage`] scope.
pub fn current_stage() -> &'static str {
    STAGE.try_with(|label| *label).unwrap_or(NO_STAGE)
}

/// Runs `future` with `label` as its stage.
///
/// The label travels with the future, so stages interleaved on one thread
/// (for example under `tokio::join!`) each log under their own label.
pub async fn in_stage<F: Future>(label: &'static str, future: F) -> F::Output {
    STAGE.scope(label, future).await
}

/// Logs a trace-level message tagged with the current stage.
#[macro_export]
macro_rules! harvest_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current stage.
#[macro_export]
macro_rules! harvest_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current stage.
#[macro_export]
macro_rules! harvest_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current stage.
#[macro_export]
macro_rules! harvest_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current stage.
#[macro_export]
macro_rules! harvest_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
