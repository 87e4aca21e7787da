//! Operator shell for the harvest pipeline.
pub mod config;
pub mod logging;
pub mod queries;
pub mod report;
