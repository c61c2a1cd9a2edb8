//! End-to-end pipeline scenarios with mock engines
//!
//! These tests exercise the orchestrator and both stage tasks without any
//! external binaries: the mock retrieval engine replays a scripted sequence
//! of sink callbacks, and the mock transcoding engine records its
//! invocations and replays scripted stats lines.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use media_dl::{
    ConversionPreset, ConversionRequest, ConversionSettings, DownloadPreset, DownloadRequest,
    Error, Event, FetchEngine, FetchError, FetchRequest, FetchSink, FetchStatus, FetchUpdate,
    JobKind, LanguageTable, MediaPipeline, MediaProbe, PresetType, ProgressStatus, Result,
    TranscodeEngine, TranscodeError, TranscodeInvocation, TranscodeSink,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum FetchStep {
    Progress {
        percent_str: &'static str,
        filename: PathBuf,
    },
    Finished(PathBuf),
    Fail(&'static str),
    Wait(Duration),
}

struct MockFetchEngine {
    probe: MediaProbe,
    steps: Vec<FetchStep>,
}

#[async_trait]
impl FetchEngine for MockFetchEngine {
    async fn probe(&self, _url: &str, _playlist: bool) -> Result<MediaProbe> {
        Ok(self.probe.clone())
    }

    async fn fetch(
        &self,
        _request: &FetchRequest,
        sink: &mut dyn FetchSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for step in &self.steps {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match step {
                FetchStep::Progress {
                    percent_str,
                    filename,
                } => sink.on_progress(&FetchUpdate {
                    status: FetchStatus::Downloading,
                    percent_str: percent_str.to_string(),
                    speed_str: "2.00MiB/s".to_string(),
                    eta_str: "00:10".to_string(),
                    filename: filename.clone(),
                }),
                FetchStep::Finished(path) => sink.on_item_finished(path),
                FetchStep::Fail(reason) => {
                    return Err(FetchError::EngineExited {
                        code: Some(1),
                        reason: reason.to_string(),
                    }
                    .into());
                }
                FetchStep::Wait(duration) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(*duration) => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock-fetch"
    }
}

struct FailingProbeEngine;

#[async_trait]
impl FetchEngine for FailingProbeEngine {
    async fn probe(&self, url: &str, _playlist: bool) -> Result<MediaProbe> {
        Err(FetchError::ProbeFailed {
            url: url.to_string(),
            reason: "video unavailable".to_string(),
        }
        .into())
    }

    async fn fetch(
        &self,
        _request: &FetchRequest,
        _sink: &mut dyn FetchSink,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        panic!("fetch must not run after a failed probe");
    }

    fn name(&self) -> &'static str {
        "failing-probe"
    }
}

struct MockTranscodeEngine {
    duration: f64,
    lines: Vec<String>,
    fail_on: Vec<PathBuf>,
    invocations: Arc<Mutex<Vec<TranscodeInvocation>>>,
}

impl MockTranscodeEngine {
    fn new(duration: f64, lines: Vec<String>) -> Self {
        Self {
            duration,
            lines,
            fail_on: Vec::new(),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl TranscodeEngine for MockTranscodeEngine {
    async fn probe_duration(&self, _path: &Path) -> Result<f64> {
        Ok(self.duration)
    }

    async fn transcode(
        &self,
        invocation: &TranscodeInvocation,
        sink: &mut dyn TranscodeSink,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.invocations.lock().unwrap().push(invocation.clone());
        if self.fail_on.contains(&invocation.input) {
            return Err(TranscodeError::EngineFailed {
                input: invocation.input.clone(),
                reason: "invalid data found when processing input".to_string(),
            }
            .into());
        }
        for line in &self.lines {
            sink.on_line(line);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock-transcode"
    }
}

fn pipeline_with(fetch: MockFetchEngine, transcode: MockTranscodeEngine) -> MediaPipeline {
    MediaPipeline::new(Arc::new(fetch), Arc::new(transcode), LanguageTable::default())
}

fn idle_fetch() -> MockFetchEngine {
    MockFetchEngine {
        probe: MediaProbe {
            title: "unused".to_string(),
            entry_count: None,
        },
        steps: Vec::new(),
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[Event]) -> Vec<ProgressStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

fn completions(events: &[Event]) -> Vec<JobKind> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Completed { job, .. } => Some(*job),
            _ => None,
        })
        .collect()
}

fn video_settings(destination: &Path) -> ConversionSettings {
    ConversionSettings {
        destination: destination.to_path_buf(),
        preset: ConversionPreset::default(),
        delete_original: false,
    }
}

// -----------------------------------------------------------------------
// Scenario: single item, no conversion requested
// -----------------------------------------------------------------------

#[tokio::test]
async fn single_download_without_conversion_emits_one_completion() {
    let fetch = MockFetchEngine {
        probe: MediaProbe {
            title: "Clip".to_string(),
            entry_count: None,
        },
        steps: vec![
            FetchStep::Progress {
                percent_str: "42.0%",
                filename: PathBuf::from("/media/Clip.f616.mp4"),
            },
            FetchStep::Progress {
                percent_str: "100.0%",
                filename: PathBuf::from("/media/Clip.f616.mp4"),
            },
            FetchStep::Finished(PathBuf::from("/media/Clip.webm")),
        ],
    };
    let transcode = MockTranscodeEngine::new(100.0, Vec::new());
    let invocations = transcode.invocations.clone();
    let pipeline = pipeline_with(fetch, transcode);
    let mut rx = pipeline.subscribe();

    let handle = pipeline
        .start_download(DownloadRequest {
            url: "https://example.com/watch?v=abc".to_string(),
            destination: PathBuf::from("/media"),
            playlist: false,
            preset: DownloadPreset::default(),
            convert_after: None,
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    let statuses = statuses(&events);
    assert!(statuses.contains(&ProgressStatus::Downloading));
    assert!(
        statuses.contains(&ProgressStatus::Merging),
        "single finished item should report merging, got {statuses:?}"
    );
    assert!(!statuses.contains(&ProgressStatus::Conversion));
    assert_eq!(
        completions(&events),
        vec![JobKind::Download],
        "exactly one completion event for the download stage"
    );
    assert!(
        invocations.lock().unwrap().is_empty(),
        "no transcode job may start without convert_after"
    );
    assert!(!pipeline.is_running(JobKind::Download).await);
}

// -----------------------------------------------------------------------
// Scenario: three-item collection with automatic conversion
// -----------------------------------------------------------------------

#[tokio::test]
async fn collection_download_hands_off_to_conversion() {
    let items = [
        PathBuf::from("/media/List/1. One.webm"),
        PathBuf::from("/media/List/2. Two.webm"),
        PathBuf::from("/media/List/3. Three.webm"),
    ];
    let fetch = MockFetchEngine {
        probe: MediaProbe {
            title: "List".to_string(),
            entry_count: Some(3),
        },
        steps: items
            .iter()
            .map(|path| FetchStep::Finished(path.clone()))
            .collect(),
    };
    let transcode = MockTranscodeEngine::new(
        100.0,
        vec!["frame= 1 time=00:00:50.00 bitrate=1k".to_string()],
    );
    let invocations = transcode.invocations.clone();
    let pipeline = pipeline_with(fetch, transcode);
    let mut rx = pipeline.subscribe();

    let dest = tempfile::TempDir::new().unwrap();
    let handle = pipeline
        .start_download(DownloadRequest {
            url: "https://example.com/playlist?list=xyz".to_string(),
            destination: PathBuf::from("/media"),
            playlist: true,
            preset: DownloadPreset::default(),
            convert_after: Some(video_settings(dest.path())),
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    let statuses = statuses(&events);

    let finished = statuses
        .iter()
        .filter(|s| **s == ProgressStatus::Finished)
        .count();
    assert_eq!(finished, 3, "each collection item reports finished once");

    let conversion_marks = statuses
        .iter()
        .filter(|s| **s == ProgressStatus::Conversion)
        .count();
    assert_eq!(conversion_marks, 1, "one handoff event");

    assert_eq!(
        completions(&events),
        vec![JobKind::Download, JobKind::Conversion],
        "download completion precedes conversion completion"
    );

    let recorded = invocations.lock().unwrap();
    assert_eq!(recorded.len(), 3, "every produced file was queued");
    let inputs: Vec<_> = recorded.iter().map(|i| i.input.clone()).collect();
    assert_eq!(inputs, items.to_vec());
    for invocation in recorded.iter() {
        assert_eq!(
            invocation.output.extension().unwrap().to_str().unwrap(),
            "mp4"
        );
        assert!(invocation.output.starts_with(dest.path()));
    }

    assert!(
        statuses.contains(&ProgressStatus::Processing),
        "time= lines should surface as processing progress"
    );
    let processing_halfway = events.iter().any(|event| {
        matches!(
            event,
            Event::Progress {
                percent: 50,
                status: ProgressStatus::Processing,
                ..
            }
        )
    });
    assert!(processing_halfway, "50s of 100s should report 50%");
}

// -----------------------------------------------------------------------
// Scenario: a corrupt input fails, the queue continues
// -----------------------------------------------------------------------

#[tokio::test]
async fn failed_conversion_continues_the_queue_and_still_completes() {
    let inputs = vec![
        PathBuf::from("/media/good1.webm"),
        PathBuf::from("/media/corrupt.webm"),
        PathBuf::from("/media/good2.webm"),
    ];
    let mut transcode = MockTranscodeEngine::new(60.0, Vec::new());
    transcode.fail_on = vec![PathBuf::from("/media/corrupt.webm")];
    let invocations = transcode.invocations.clone();
    let pipeline = pipeline_with(idle_fetch(), transcode);
    let mut rx = pipeline.subscribe();

    let dest = tempfile::TempDir::new().unwrap();
    let handle = pipeline
        .start_conversion(ConversionRequest {
            inputs: inputs.clone(),
            settings: video_settings(dest.path()),
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    let statuses = statuses(&events);

    assert_eq!(
        statuses.iter().filter(|s| **s == ProgressStatus::Error).count(),
        1,
        "exactly one error event for the corrupt file"
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == ProgressStatus::Completed)
            .count(),
        2,
        "the two good files still complete"
    );
    assert_eq!(
        invocations.lock().unwrap().len(),
        3,
        "the queue must fully drain despite the failure"
    );
    assert_eq!(
        completions(&events),
        vec![JobKind::Conversion],
        "batch completion fires even with a failed item"
    );
}

// -----------------------------------------------------------------------
// Scenario: delete-original after conversion
// -----------------------------------------------------------------------

#[tokio::test]
async fn delete_original_removes_file_and_reports_deleted() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("Track.webm");
    std::fs::write(&input, b"fake media").unwrap();

    let transcode = MockTranscodeEngine::new(60.0, Vec::new());
    let pipeline = pipeline_with(idle_fetch(), transcode);
    let mut rx = pipeline.subscribe();

    let dest = tempfile::TempDir::new().unwrap();
    let handle = pipeline
        .start_conversion(ConversionRequest {
            inputs: vec![input.clone()],
            settings: ConversionSettings {
                destination: dest.path().to_path_buf(),
                preset: ConversionPreset::default(),
                delete_original: true,
            },
        })
        .await
        .unwrap();
    handle.await.unwrap();

    assert!(!input.exists(), "original must be deleted");
    let statuses = statuses(&drain(&mut rx));
    assert!(statuses.contains(&ProgressStatus::Deleted));
    assert!(!statuses.contains(&ProgressStatus::Error));
}

#[tokio::test]
async fn delete_original_of_missing_file_reports_error_not_deleted() {
    let transcode = MockTranscodeEngine::new(60.0, Vec::new());
    let pipeline = pipeline_with(idle_fetch(), transcode);
    let mut rx = pipeline.subscribe();

    let dest = tempfile::TempDir::new().unwrap();
    let handle = pipeline
        .start_conversion(ConversionRequest {
            inputs: vec![PathBuf::from("/nonexistent/Track.webm")],
            settings: ConversionSettings {
                destination: dest.path().to_path_buf(),
                preset: ConversionPreset::default(),
                delete_original: true,
            },
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    let statuses = statuses(&events);
    assert!(
        statuses.contains(&ProgressStatus::Error),
        "missing original must surface as error, got {statuses:?}"
    );
    assert!(!statuses.contains(&ProgressStatus::Deleted));
    assert_eq!(
        completions(&events),
        vec![JobKind::Conversion],
        "the batch still completes"
    );
}

// -----------------------------------------------------------------------
// Scenario: retrieval engine failure still produces a completion
// -----------------------------------------------------------------------

#[tokio::test]
async fn single_download_engine_failure_emits_error_then_completion() {
    let fetch = MockFetchEngine {
        probe: MediaProbe {
            title: "Clip".to_string(),
            entry_count: None,
        },
        steps: vec![FetchStep::Fail("unable to download video data")],
    };
    let pipeline = pipeline_with(fetch, MockTranscodeEngine::new(0.0, Vec::new()));
    let mut rx = pipeline.subscribe();

    let handle = pipeline
        .start_download(DownloadRequest {
            url: "https://example.com/watch?v=broken".to_string(),
            destination: PathBuf::from("/media"),
            playlist: false,
            preset: DownloadPreset::default(),
            convert_after: None,
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    assert!(statuses(&events).contains(&ProgressStatus::Error));
    assert_eq!(
        completions(&events),
        vec![JobKind::Download],
        "completion fires even when the engine failed, so consumers can reset"
    );
}

// -----------------------------------------------------------------------
// Scenario: the probe itself fails
// -----------------------------------------------------------------------

#[tokio::test]
async fn failed_probe_emits_error_then_completion() {
    let pipeline = MediaPipeline::new(
        Arc::new(FailingProbeEngine),
        Arc::new(MockTranscodeEngine::new(0.0, Vec::new())),
        LanguageTable::default(),
    );
    let mut rx = pipeline.subscribe();

    let handle = pipeline
        .start_download(DownloadRequest {
            url: "https://example.com/watch?v=gone".to_string(),
            destination: PathBuf::from("/media"),
            playlist: false,
            preset: DownloadPreset::default(),
            convert_after: None,
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    assert!(statuses(&events).contains(&ProgressStatus::Error));
    assert_eq!(
        completions(&events),
        vec![JobKind::Download],
        "a failed probe still reports completion so consumers can reset"
    );
    assert!(!pipeline.is_running(JobKind::Download).await);
}

#[tokio::test]
async fn failed_probe_of_collection_still_completes() {
    let transcode = MockTranscodeEngine::new(0.0, Vec::new());
    let invocations = transcode.invocations.clone();
    let pipeline = MediaPipeline::new(
        Arc::new(FailingProbeEngine),
        Arc::new(transcode),
        LanguageTable::default(),
    );
    let mut rx = pipeline.subscribe();

    let dest = tempfile::TempDir::new().unwrap();
    let handle = pipeline
        .start_download(DownloadRequest {
            url: "https://example.com/playlist?list=gone".to_string(),
            destination: PathBuf::from("/media"),
            playlist: true,
            preset: DownloadPreset::default(),
            convert_after: Some(video_settings(dest.path())),
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    assert!(statuses(&events).contains(&ProgressStatus::Error));
    assert_eq!(
        completions(&events),
        vec![JobKind::Download],
        "an empty collection counts as complete"
    );
    assert!(
        invocations.lock().unwrap().is_empty(),
        "no files produced, so no conversion handoff"
    );
}

// -----------------------------------------------------------------------
// Scenario: the engine reports the same finished file twice
// -----------------------------------------------------------------------

#[tokio::test]
async fn repeated_finish_for_one_path_counts_and_queues_once() {
    // An already-downloaded notice followed by a merge announcement names
    // the same file twice.
    let path = PathBuf::from("/media/List/1. One.webm");
    let fetch = MockFetchEngine {
        probe: MediaProbe {
            title: "List".to_string(),
            entry_count: Some(1),
        },
        steps: vec![
            FetchStep::Finished(path.clone()),
            FetchStep::Finished(path.clone()),
        ],
    };
    let transcode = MockTranscodeEngine::new(60.0, Vec::new());
    let invocations = transcode.invocations.clone();
    let pipeline = pipeline_with(fetch, transcode);
    let mut rx = pipeline.subscribe();

    let dest = tempfile::TempDir::new().unwrap();
    let handle = pipeline
        .start_download(DownloadRequest {
            url: "https://example.com/playlist?list=xyz".to_string(),
            destination: PathBuf::from("/media"),
            playlist: true,
            preset: DownloadPreset::default(),
            convert_after: Some(video_settings(dest.path())),
        })
        .await
        .unwrap();
    handle.await.unwrap();

    let events = drain(&mut rx);
    let finished = statuses(&events)
        .iter()
        .filter(|s| **s == ProgressStatus::Finished)
        .count();
    assert_eq!(finished, 1, "a re-reported file counts once");
    assert_eq!(
        completions(&events),
        vec![JobKind::Download, JobKind::Conversion],
        "the deduplicated count still satisfies the collection total"
    );
    assert_eq!(
        invocations.lock().unwrap().len(),
        1,
        "one conversion input for the deduplicated file"
    );
}

// -----------------------------------------------------------------------
// Stage exclusivity and cancellation
// -----------------------------------------------------------------------

#[tokio::test]
async fn second_download_is_rejected_while_first_is_running() {
    let fetch = MockFetchEngine {
        probe: MediaProbe {
            title: "Slow".to_string(),
            entry_count: None,
        },
        steps: vec![FetchStep::Wait(Duration::from_secs(5))],
    };
    let pipeline = pipeline_with(fetch, MockTranscodeEngine::new(0.0, Vec::new()));

    let request = DownloadRequest {
        url: "https://example.com/watch?v=abc".to_string(),
        destination: PathBuf::from("/media"),
        playlist: false,
        preset: DownloadPreset::default(),
        convert_after: None,
    };
    let handle = pipeline.start_download(request.clone()).await.unwrap();

    let second = pipeline.start_download(request).await;
    assert!(
        matches!(second, Err(Error::AlreadyRunning(JobKind::Download))),
        "the retrieval stage admits one job at a time"
    );

    pipeline.cancel(JobKind::Download).await;
    handle.await.unwrap();
}

#[tokio::test]
async fn cancel_emits_cancelled_and_suppresses_completion_and_handoff() {
    let fetch = MockFetchEngine {
        probe: MediaProbe {
            title: "Slow".to_string(),
            entry_count: None,
        },
        steps: vec![
            FetchStep::Finished(PathBuf::from("/media/Slow.webm")),
            FetchStep::Wait(Duration::from_secs(5)),
        ],
    };
    let transcode = MockTranscodeEngine::new(0.0, Vec::new());
    let invocations = transcode.invocations.clone();
    let pipeline = pipeline_with(fetch, transcode);
    let mut rx = pipeline.subscribe();

    let dest = tempfile::TempDir::new().unwrap();
    let handle = pipeline
        .start_download(DownloadRequest {
            url: "https://example.com/watch?v=abc".to_string(),
            destination: PathBuf::from("/media"),
            playlist: false,
            preset: DownloadPreset::default(),
            convert_after: Some(video_settings(dest.path())),
        })
        .await
        .unwrap();

    // Give the task a moment to reach the wait step, then cancel.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(pipeline.cancel(JobKind::Download).await);
    handle.await.unwrap();

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Cancelled { job: JobKind::Download })));
    assert!(
        completions(&events).is_empty(),
        "no completion after cancellation"
    );
    assert!(
        invocations.lock().unwrap().is_empty(),
        "cancellation must suppress the conversion handoff"
    );
    assert!(!pipeline.is_running(JobKind::Download).await);
}

#[tokio::test]
async fn cancel_on_idle_stage_returns_false() {
    let pipeline = pipeline_with(idle_fetch(), MockTranscodeEngine::new(0.0, Vec::new()));
    assert!(!pipeline.cancel(JobKind::Download).await);
    assert!(!pipeline.cancel(JobKind::Conversion).await);
}
