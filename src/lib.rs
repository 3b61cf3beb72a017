//! Almanac - test-report aggregation and release timeline library.
//!
//! This library provides the core functionality for the `almanac` CLI tool:
//! classifying generated report artifacts into a browsable index, keeping a
//! local release-report store in sync with a remote file store, extracting
//! defect metrics from semi-structured documents, and laying out a
//! branch-aware release timeline.

pub mod cli;
pub mod commands;
pub mod config;
pub mod export;
pub mod metrics;
pub mod models;
pub mod releases;
pub mod scanner;
pub mod sync;
pub mod timeline;


/// Library-level error type for Almanac operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("Remote store error: {0}")]
    Remote(#[from] sync::RemoteError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Almanac operations.
pub type Result<T> = std::result::Result<T, Error>;
