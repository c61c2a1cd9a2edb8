//! Pipeline orchestrator and the two stage tasks
//!
//! [`MediaPipeline`] owns the event channel and the active-job map. Each
//! stage admits one job at a time; starting a second job of the same kind
//! fails with [`Error::AlreadyRunning`]. When a download request asks for
//! conversion, the retrieval task hands its produced files to the
//! transcoding task inside the same background task, so the stages run
//! strictly in sequence.

mod control;
mod convert_task;
mod download_task;

use crate::engine::{FetchEngine, TranscodeEngine};
use crate::error::{Error, Result};
use crate::language::LanguageTable;
use crate::presets::{ConversionPreset, DownloadPreset};
use crate::types::{Event, JobKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Parameters the transcoding stage needs, carried by both request kinds
#[derive(Clone, Debug)]
pub struct ConversionSettings {
    /// Directory converted files land in
    pub destination: PathBuf,
    /// Conversion preset to apply to every input
    pub preset: ConversionPreset,
    /// Delete each source file after its successful conversion
    pub delete_original: bool,
}

/// A retrieval job
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    /// Source URL
    pub url: String,
    /// Directory retrieved files land in
    pub destination: PathBuf,
    /// Treat the URL as a collection
    pub playlist: bool,
    /// Download preset to derive engine options from
    pub preset: DownloadPreset,
    /// When set, convert the produced files once retrieval completes
    pub convert_after: Option<ConversionSettings>,
}

/// A transcoding job
#[derive(Clone, Debug)]
pub struct ConversionRequest {
    /// Files to convert, processed front to back
    pub inputs: Vec<PathBuf>,
    /// Conversion parameters
    pub settings: ConversionSettings,
}

/// Pipeline orchestrator (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaPipeline {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Retrieval engine (trait object for pluggable implementations)
    pub(crate) fetch_engine: Arc<dyn FetchEngine>,
    /// Transcoding engine (trait object for pluggable implementations)
    pub(crate) transcode_engine: Arc<dyn TranscodeEngine>,
    /// Loaded UI string table for progress messages
    pub(crate) language: Arc<LanguageTable>,
    /// Map of active jobs to their cancellation tokens
    pub(crate) active_jobs: Arc<tokio::sync::Mutex<HashMap<JobKind, CancellationToken>>>,
}

impl MediaPipeline {
    /// Create a new pipeline around the given engines
    pub fn new(
        fetch_engine: Arc<dyn FetchEngine>,
        transcode_engine: Arc<dyn TranscodeEngine>,
        language: LanguageTable,
    ) -> Self {
        // Buffer of 1000 events lets multiple subscribers receive all events
        // independently without backpressure on the stages.
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        Self {
            event_tx,
            fetch_engine,
            transcode_engine,
            language: Arc::new(language),
            active_jobs: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Emit an event, silently dropping it when nobody is subscribed
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Whether a job of this kind is currently running
    pub async fn is_running(&self, job: JobKind) -> bool {
        self.active_jobs.lock().await.contains_key(&job)
    }

    async fn register_job(&self, job: JobKind) -> Result<CancellationToken> {
        let mut active = self.active_jobs.lock().await;
        if active.contains_key(&job) {
            return Err(Error::AlreadyRunning(job));
        }
        let token = CancellationToken::new();
        active.insert(job, token.clone());
        Ok(token)
    }

    async fn finish_job(&self, job: JobKind) {
        self.active_jobs.lock().await.remove(&job);
    }

    /// Start a retrieval job in the background
    ///
    /// Progress and completion are reported through the event channel. When
    /// the request carries `convert_after` and retrieval produced files, the
    /// transcoding stage starts automatically after the retrieval stage
    /// finishes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] when a download job is active.
    pub async fn start_download(&self, request: DownloadRequest) -> Result<JoinHandle<()>> {
        let token = self.register_job(JobKind::Download).await?;
        let pipeline = self.clone();
        let handle = tokio::spawn(async move {
            let produced =
                download_task::run_download_task(&pipeline, &request, &token).await;
            pipeline.finish_job(JobKind::Download).await;
            if token.is_cancelled() {
                pipeline.emit_event(Event::Cancelled {
                    job: JobKind::Download,
                });
                return;
            }
            let Some(settings) = request.convert_after else {
                return;
            };
            if produced.is_empty() {
                tracing::info!("no files produced, skipping conversion handoff");
                return;
            }
            pipeline.run_handoff(produced, settings).await;
        });
        Ok(handle)
    }

    /// Start a transcoding job in the background
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] when a conversion job is active.
    pub async fn start_conversion(&self, request: ConversionRequest) -> Result<JoinHandle<()>> {
        let token = self.register_job(JobKind::Conversion).await?;
        let pipeline = self.clone();
        let handle = tokio::spawn(async move {
            pipeline.run_conversion_stage(request, token).await;
        });
        Ok(handle)
    }

    /// Sequential handoff from retrieval to transcoding
    async fn run_handoff(&self, produced: Vec<PathBuf>, settings: ConversionSettings) {
        let message = self.language.template("download", "startingConversion");
        self.emit_event(Event::Progress {
            message: message.to_string(),
            percent: 100,
            status: crate::types::ProgressStatus::Conversion,
        });
        match self.register_job(JobKind::Conversion).await {
            Ok(token) => {
                let request = ConversionRequest {
                    inputs: produced,
                    settings,
                };
                self.run_conversion_stage(request, token).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "conversion stage occupied, dropping handoff");
            }
        }
    }

    async fn run_conversion_stage(&self, request: ConversionRequest, token: CancellationToken) {
        convert_task::run_convert_task(self, request, &token).await;
        self.finish_job(JobKind::Conversion).await;
        if token.is_cancelled() {
            self.emit_event(Event::Cancelled {
                job: JobKind::Conversion,
            });
        }
    }
}
