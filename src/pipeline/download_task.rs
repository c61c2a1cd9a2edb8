//! Retrieval stage execution
//!
//! Probes the URL, derives engine options from the download preset, then
//! drives the retrieval engine with a sink that turns engine callbacks into
//! progress events. Finished files are collected (de-duplicated) for the
//! conversion handoff; for collections, only files arriving in the preset's
//! final container count toward completion.

use super::{DownloadRequest, MediaPipeline};
use crate::engine::{FetchRequest, FetchSink, FetchStatus, FetchUpdate};
use crate::error::Error;
use crate::language::render;
use crate::types::{clamp_percent, Event, JobKind, MediaKind, ProgressStatus};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub(super) struct DownloadSink<'a> {
    pipeline: &'a MediaPipeline,
    /// Final container extension from the preset, lowercase without a dot
    final_container: String,
    collection: bool,
    total_entries: usize,
    completed_entries: usize,
    produced: Vec<PathBuf>,
}

impl DownloadSink<'_> {
    fn finish_item(&mut self, path: &Path) {
        // The engine can report the same file more than once (e.g. an
        // already-downloaded notice followed by a merge); count it once.
        if self.produced.iter().any(|p| p == path) {
            return;
        }
        self.produced.push(path.to_path_buf());

        let in_final_container = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.final_container));

        if self.collection && in_final_container {
            self.completed_entries += 1;
            let template = self.pipeline.language.template("download", "playlistProgress");
            let message = render(
                template,
                &[
                    ("downloaded_video", &self.completed_entries.to_string()),
                    ("total_video", &self.total_entries.to_string()),
                ],
            );
            self.pipeline.emit_event(Event::Progress {
                message,
                percent: 100,
                status: ProgressStatus::Finished,
            });
        } else {
            let message = self.pipeline.language.template("download", "merging");
            self.pipeline.emit_event(Event::Progress {
                message: message.to_string(),
                percent: 100,
                status: ProgressStatus::Merging,
            });
        }
    }
}

impl FetchSink for DownloadSink<'_> {
    fn on_progress(&mut self, update: &FetchUpdate) {
        match update.status {
            FetchStatus::Downloading => {
                let label = MediaKind::from_path(&update.filename).label();
                let template = self.pipeline.language.template("download", "downloading");
                let message = render(
                    template,
                    &[
                        ("file_type", label),
                        ("percent_str", update.percent_str.trim()),
                        ("speed", &update.speed_str),
                        ("eta", &update.eta_str),
                    ],
                );
                self.pipeline.emit_event(Event::Progress {
                    message,
                    percent: parse_percent(&update.percent_str),
                    status: ProgressStatus::Downloading,
                });
            }
            FetchStatus::Finished => self.finish_item(&update.filename),
        }
    }

    fn on_item_finished(&mut self, path: &Path) {
        self.finish_item(path);
    }
}

/// Parse an engine percent string like " 42.0%" (0 on failure)
fn parse_percent(percent_str: &str) -> u8 {
    percent_str
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map(clamp_percent)
        .unwrap_or(0)
}

/// Replace path separators in a media title so it stays a single path segment
fn sanitize_title(title: &str) -> String {
    title.replace(['/', '\\'], "_")
}

/// Render the engine output template for a run
///
/// Collections get a per-title folder with indexed entries; single items land
/// directly in the destination.
fn output_template(destination: &Path, title: &str, collection: bool) -> String {
    let title = sanitize_title(title);
    if collection {
        destination
            .join(title)
            .join("%(playlist_index)s. %(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned()
    } else {
        destination
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned()
    }
}

/// Run one retrieval job to completion, returning the produced files
pub(super) async fn run_download_task(
    pipeline: &MediaPipeline,
    request: &DownloadRequest,
    cancel: &CancellationToken,
) -> Vec<PathBuf> {
    let probe = match pipeline.fetch_engine.probe(&request.url, request.playlist).await {
        Ok(probe) => probe,
        Err(e) => {
            tracing::error!(url = %request.url, error = %e, "probe failed");
            emit_error(pipeline, &e);
            // A failed probe still reports completion so the consumer can
            // reset its controls. An empty collection counts as complete.
            emit_completion(pipeline, &request.destination, request.playlist, 0, 0);
            return Vec::new();
        }
    };

    let collection = request.playlist && probe.is_collection();
    let total_entries = probe.entry_count.unwrap_or(1);
    tracing::info!(
        url = %request.url,
        title = %probe.title,
        collection,
        total_entries,
        "starting retrieval"
    );

    let fetch_request = FetchRequest {
        url: request.url.clone(),
        output_template: output_template(&request.destination, &probe.title, collection),
        format: request.preset.format.clone(),
        playlist: collection,
        merge_container: request.preset.output_format.clone(),
        download_subtitles: request.preset.download_subtitles,
        embed_subtitles: request.preset.embed_subtitles,
        all_subtitles: request.preset.all_subtitles,
    };

    let mut sink = DownloadSink {
        pipeline,
        final_container: request.preset.output_format.to_ascii_lowercase(),
        collection,
        total_entries,
        completed_entries: 0,
        produced: Vec::new(),
    };

    match pipeline
        .fetch_engine
        .fetch(&fetch_request, &mut sink, cancel)
        .await
    {
        Ok(()) => {}
        Err(Error::Cancelled) => return sink.produced,
        Err(e) => {
            tracing::error!(url = %request.url, error = %e, "retrieval failed");
            emit_error(pipeline, &e);
        }
    }
    if cancel.is_cancelled() {
        return sink.produced;
    }

    emit_completion(
        pipeline,
        &request.destination,
        collection,
        sink.completed_entries,
        total_entries,
    );

    sink.produced
}

/// Completion: collections complete only when every entry arrived in its
/// final container; single items always report completion, even after an
/// engine error, so the consumer can reset its controls.
fn emit_completion(
    pipeline: &MediaPipeline,
    destination: &Path,
    collection: bool,
    completed: usize,
    total: usize,
) {
    if collection {
        if completed == total {
            let message = pipeline.language.template("download", "playlistFinished");
            pipeline.emit_event(Event::Completed {
                job: JobKind::Download,
                message: message.to_string(),
                destination: destination.to_path_buf(),
            });
        } else {
            tracing::warn!(completed, total, "collection incomplete, completion withheld");
        }
    } else {
        let message = pipeline.language.template("download", "singleFinished");
        pipeline.emit_event(Event::Completed {
            job: JobKind::Download,
            message: message.to_string(),
            destination: destination.to_path_buf(),
        });
    }
}

fn emit_error(pipeline: &MediaPipeline, error: &Error) {
    let template = pipeline.language.template("download", "downloadError");
    pipeline.emit_event(Event::Progress {
        message: render(template, &[("error", &error.to_string())]),
        percent: 0,
        status: ProgressStatus::Error,
    });
}
