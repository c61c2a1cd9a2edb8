//! Core types and events for media-dl

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Status carried by a [`Event::Progress`] update
///
/// The values mirror the states a consumer UI distinguishes: the retrieval
/// stage emits `Downloading`, `Finished` and `Merging`; the transcoding stage
/// emits `Processing`, `Completed` and `Deleted`; both stages emit `Error`
/// for per-item failures, and the orchestrator emits `Conversion` when it
/// hands a finished batch over to the transcoding stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// Retrieval engine is downloading a file
    Downloading,
    /// Transcoding engine is converting a file
    Processing,
    /// A collection item finished in its final container
    Finished,
    /// A single item finished and is being merged into its container
    Merging,
    /// A file finished converting
    Completed,
    /// Original file was deleted after conversion
    Deleted,
    /// A per-item failure (the batch continues)
    Error,
    /// Retrieval batch handed over to the transcoding stage
    Conversion,
}

/// The two pipeline stages, used to key the active-job map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Retrieval stage
    Download,
    /// Transcoding stage
    Conversion,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Download => write!(f, "download"),
            JobKind::Conversion => write!(f, "conversion"),
        }
    }
}

/// Event emitted during pipeline execution
///
/// Consumers subscribe via [`crate::pipeline::MediaPipeline::subscribe`] and
/// receive every event for both stages. Events serialize with a `type` tag so
/// they can be forwarded to IPC or logged as JSON directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Incremental progress update from either stage
    Progress {
        /// Rendered, human-readable progress message
        message: String,
        /// Progress percentage, clamped to 0..=100
        percent: u8,
        /// What the stage is currently doing
        status: ProgressStatus,
    },

    /// A stage finished its whole batch
    Completed {
        /// Which stage completed
        job: JobKind,
        /// Rendered completion message
        message: String,
        /// Destination directory of the batch output
        destination: PathBuf,
    },

    /// A job was cancelled before its batch completed
    Cancelled {
        /// Which stage was cancelled
        job: JobKind,
    },
}

/// Broad media classification derived from a file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    /// Video container
    Video,
    /// Audio file
    Audio,
    /// Subtitle file
    Subtitle,
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv"];
const SUBTITLE_EXTENSIONS: &[&str] = &["ass", "srt", "sub", "vtt"];

impl MediaKind {
    /// Classify a path by its extension (case-insensitive)
    ///
    /// Anything that is not a known video or subtitle extension classifies
    /// as audio: during retrieval the separate audio track arrives as a bare
    /// `.webm` stream before the merge step produces the final container,
    /// and the label only feeds progress messages.
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return MediaKind::Audio;
        };
        let ext = ext.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Subtitle
        } else {
            MediaKind::Audio
        }
    }

    /// Lowercase label used in progress messages
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Subtitle => "subtitle",
        }
    }
}

/// Clamp a fractional percentage into the integer 0..=100 range
///
/// Values below zero and NaN map to 0, values above 100 map to 100.
/// Fractions truncate, matching the integer percentages shown in progress
/// events.
pub fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0) as u8
}
