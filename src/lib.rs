//! # media-dl
//!
//! Backend library for desktop media download and conversion applications.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Engine-agnostic** - yt-dlp and ffmpeg are driven behind trait seams,
//!   so stages are testable and other engines can be plugged in
//!
//! The pipeline runs two stages: a retrieval stage that drives an external
//! download engine, and a transcoding stage that drives an external
//! conversion engine. Each stage admits one job at a time; a download can
//! hand its produced files to the transcoding stage automatically.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{
//!     DownloadPreset, DownloadRequest, FfmpegEngine, LanguageTable, MediaPipeline, YtDlpEngine,
//! };
//! use media_dl::config::ToolsConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tools = ToolsConfig::default();
//!     let pipeline = MediaPipeline::new(
//!         Arc::new(YtDlpEngine::from_config(&tools)?),
//!         Arc::new(FfmpegEngine::from_config(&tools)?),
//!         LanguageTable::default(),
//!     );
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let handle = pipeline
//!         .start_download(DownloadRequest {
//!             url: "https://example.com/watch?v=abc".to_string(),
//!             destination: "/media/downloads".into(),
//!             playlist: false,
//!             preset: DownloadPreset::default(),
//!             convert_after: None,
//!         })
//!         .await?;
//!     handle.await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types (settings record, tool paths, app directories)
pub mod config;
/// External engine adapters behind trait seams
pub mod engine;
/// Error types
pub mod error;
/// UI string tables and template rendering
pub mod language;
/// Pipeline orchestrator and stage tasks
pub mod pipeline;
/// Download and conversion preset bundles
pub mod presets;
/// Theme registry and stylesheet loading
pub mod theme;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{AppDirs, Settings, ToolsConfig};
pub use engine::{
    FetchEngine, FetchRequest, FetchSink, FetchStatus, FetchUpdate, FfmpegEngine, MediaProbe,
    TranscodeArgs, TranscodeEngine, TranscodeInvocation, TranscodeSink, YtDlpEngine,
};
pub use error::{Error, FetchError, Result, TranscodeError};
pub use language::{LanguageStore, LanguageTable};
pub use pipeline::{ConversionRequest, ConversionSettings, DownloadRequest, MediaPipeline};
pub use presets::{ConversionPreset, DownloadPreset, PresetSet, PresetType};
pub use theme::ThemeStore;
pub use types::{Event, JobKind, MediaKind, ProgressStatus};
