//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Fetch, Transcode, Config, etc.)
//! - Context information (url, file path, engine output)
//!
//! Per-file failures inside a running stage are reported through the event
//! channel as `ProgressStatus::Error` and never unwind past the stage; the
//! `Err` path is reserved for configuration, resource loading, and engine
//! startup problems that the caller must handle.

use crate::types::JobKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "defaultDownloadFolder")
        key: Option<String>,
    },

    /// Retrieval-related error
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Transcoding-related error
    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool missing or failed to execute (yt-dlp, ffmpeg, ffprobe)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Requested language is not in the language registry
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Named resource (preset, theme) not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A job of this kind is already running in its stage
    #[error("a {0} job is already running")]
    AlreadyRunning(JobKind),

    /// Job was cancelled via its cancellation token
    #[error("job cancelled")]
    Cancelled,
}

/// Retrieval engine errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Metadata probe for a URL failed
    #[error("probe failed for {url}: {reason}")]
    ProbeFailed {
        /// The URL that was probed
        url: String,
        /// The reason the probe failed
        reason: String,
    },

    /// Engine process exited with a failure status
    #[error("engine exited with status {code:?}: {reason}")]
    EngineExited {
        /// Process exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured diagnostic output
        reason: String,
    },

    /// Engine produced metadata that could not be interpreted
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
}

/// Transcoding engine errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Input file does not exist
    #[error("input file missing: {path}")]
    InputMissing {
        /// The path that was expected to exist
        path: PathBuf,
    },

    /// Engine process exited with a failure status for one input
    #[error("engine failed for {input}: {reason}")]
    EngineFailed {
        /// The input file being transcoded
        input: PathBuf,
        /// Captured diagnostic output
        reason: String,
    },
}
