//! Transcoding stage execution
//!
//! Drains a FIFO queue of input files. Each file is probed for its duration,
//! transcoded with a sink that turns engine `time=` positions into percent
//! progress, then optionally has its source deleted. A per-file failure
//! emits one error event and the queue continues; the batch completion event
//! fires once the queue is drained, regardless of how many files failed.

use super::{ConversionRequest, ConversionSettings, MediaPipeline};
use crate::engine::{TranscodeArgs, TranscodeInvocation, TranscodeSink};
use crate::error::{Error, Result};
use crate::language::render;
use crate::presets::{ConversionPreset, PresetType};
use crate::types::{clamp_percent, Event, JobKind, ProgressStatus};
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(r"time=(?P<h>\d+):(?P<m>\d+):(?P<s>\d+(?:\.\d+)?)").expect("static pattern")
    })
}

/// Extract the `time=HH:MM:SS.ss` position from an engine stats line
pub(super) fn parse_time_token(line: &str) -> Option<f64> {
    let caps = time_re().captures(line)?;
    let hours: f64 = caps["h"].parse().ok()?;
    let minutes: f64 = caps["m"].parse().ok()?;
    let seconds: f64 = caps["s"].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Percent of `total` reached at `position`, clamped to 0..=100
///
/// A zero or unknown total reports 0 so a file with no probe-able duration
/// shows no progress rather than nonsense.
pub(super) fn percent_from_timestamp(position: f64, total: f64) -> u8 {
    if total <= 0.0 {
        return 0;
    }
    clamp_percent(position / total * 100.0)
}

/// Output path for one conversion
///
/// Audio presets append the bitrate label so the same source can be encoded
/// at several bitrates into the same destination.
pub(super) fn output_path(input: &Path, settings: &ConversionSettings) -> PathBuf {
    let preset = &settings.preset;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match preset.preset_type {
        PresetType::Audio => format!("{stem} - {}.{}", preset.audio_bitrate, preset.output_format),
        _ => format!("{stem}.{}", preset.output_format),
    };
    settings.destination.join(name)
}

fn stream_args(preset: &ConversionPreset) -> Option<TranscodeArgs> {
    match preset.preset_type {
        PresetType::Video => Some(TranscodeArgs::Video {
            width: preset.width,
            height: preset.height,
            video_codec: preset.video_codec.clone(),
            video_bitrate: preset.video_bitrate.clone(),
            fps: preset.fps,
            audio_codec: preset.audio_codec.clone(),
            audio_bitrate: preset.audio_bitrate.clone(),
            audio_channels: preset.audio_channels,
        }),
        PresetType::Audio => Some(TranscodeArgs::Audio {
            audio_codec: preset.audio_codec.clone(),
            audio_bitrate: preset.audio_bitrate.clone(),
            audio_channels: preset.audio_channels,
        }),
        PresetType::Other => None,
    }
}

/// Sink that converts engine stats lines into processing events
///
/// Percent is kept monotonic within the file: engine lines can momentarily
/// report an earlier position after a seek.
struct ProgressLineSink<'a> {
    pipeline: &'a MediaPipeline,
    file_label: String,
    total_seconds: f64,
    last_percent: u8,
}

impl TranscodeSink for ProgressLineSink<'_> {
    fn on_line(&mut self, line: &str) {
        let Some(position) = parse_time_token(line) else {
            return;
        };
        let percent = percent_from_timestamp(position, self.total_seconds).max(self.last_percent);
        self.last_percent = percent;
        let template = self.pipeline.language.template("conversion", "processing");
        let message = render(
            template,
            &[
                ("file", &self.file_label),
                ("percent_str", &format!("{percent}%")),
            ],
        );
        self.pipeline.emit_event(Event::Progress {
            message,
            percent,
            status: ProgressStatus::Processing,
        });
    }
}

/// Run one transcoding job to completion, draining the whole queue
pub(super) async fn run_convert_task(
    pipeline: &MediaPipeline,
    request: ConversionRequest,
    cancel: &CancellationToken,
) {
    let mut queue: VecDeque<PathBuf> = request.inputs.into();
    let settings = request.settings;
    tracing::info!(
        files = queue.len(),
        destination = %settings.destination.display(),
        "starting conversion batch"
    );

    while let Some(input) = queue.pop_front() {
        if cancel.is_cancelled() {
            return;
        }
        match convert_one(pipeline, &input, &settings, cancel).await {
            Ok(()) => {}
            Err(Error::Cancelled) => return,
            Err(e) => {
                tracing::error!(input = %input.display(), error = %e, "conversion failed");
                let template = pipeline.language.template("conversion", "conversionError");
                pipeline.emit_event(Event::Progress {
                    message: render(template, &[("error", &e.to_string())]),
                    percent: 0,
                    status: ProgressStatus::Error,
                });
            }
        }
    }

    if cancel.is_cancelled() {
        return;
    }
    let template = pipeline.language.template("conversion", "allConverted");
    pipeline.emit_event(Event::Completed {
        job: JobKind::Conversion,
        message: render(
            template,
            &[("destination", &settings.destination.display().to_string())],
        ),
        destination: settings.destination.clone(),
    });
}

async fn convert_one(
    pipeline: &MediaPipeline,
    input: &Path,
    settings: &ConversionSettings,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(args) = stream_args(&settings.preset) else {
        tracing::warn!(input = %input.display(), "unrecognized preset type, skipping file");
        return Ok(());
    };

    let file_label = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let total_seconds = pipeline
        .transcode_engine
        .probe_duration(input)
        .await
        .unwrap_or(0.0);

    let invocation = TranscodeInvocation {
        input: input.to_path_buf(),
        output: output_path(input, settings),
        args,
    };
    let mut sink = ProgressLineSink {
        pipeline,
        file_label: file_label.clone(),
        total_seconds,
        last_percent: 0,
    };
    pipeline
        .transcode_engine
        .transcode(&invocation, &mut sink, cancel)
        .await?;

    let template = pipeline.language.template("conversion", "completed");
    pipeline.emit_event(Event::Progress {
        message: render(template, &[("file", &file_label)]),
        percent: 100,
        status: ProgressStatus::Completed,
    });

    if settings.delete_original {
        match tokio::fs::remove_file(input).await {
            Ok(()) => {
                let template = pipeline.language.template("conversion", "deleted");
                pipeline.emit_event(Event::Progress {
                    message: render(template, &[("file", &file_label)]),
                    percent: 0,
                    status: ProgressStatus::Deleted,
                });
            }
            Err(e) => {
                tracing::warn!(input = %input.display(), error = %e, "could not delete original");
                let template = pipeline.language.template("conversion", "deleteMissing");
                pipeline.emit_event(Event::Progress {
                    message: render(template, &[("file", &file_label)]),
                    percent: 0,
                    status: ProgressStatus::Error,
                });
            }
        }
    }
    Ok(())
}
