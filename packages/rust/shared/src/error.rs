//! Error types for paperscout.
//!
//! Library crates use [`PaperScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-record failures (fetch, model, validation) are caught at component
//! boundaries and converted into recorded outcomes; only setup-time errors
//! (config, storage) propagate to the caller and halt a run.

use std::path::PathBuf;

/// Top-level error type for all paperscout operations.
#[derive(Debug, thiserror::Error)]
pub enum PaperScoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// One source or record was unreachable. Recovered per record: the
    /// record stays unenriched, the batch continues.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Model invocation failed or returned an unparseable structure.
    /// Recovered per record: the paper is recorded as rejected-with-error,
    /// never silently treated as "not relevant".
    #[error("model error: {0}")]
    Model(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A judgment cache entry was unreadable. Treated as a cache miss:
    /// re-computed and rewritten.
    #[error("cache corruption: {0}")]
    CacheCorruption(String),

    /// Malformed input record. Fatal only for that record.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Structured-data parsing error (JSON payloads, HTML scrape formats).
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PaperScoutError>;

impl PaperScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
