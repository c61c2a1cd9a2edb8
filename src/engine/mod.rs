//! External engine adapters behind trait seams
//!
//! The pipeline never talks to yt-dlp or ffmpeg directly; it drives the
//! [`FetchEngine`] and [`TranscodeEngine`] traits. The CLI adapters in
//! [`ytdlp`] and [`ffmpeg`] own everything engine-specific (argument syntax,
//! output line formats, ANSI escapes), so the stages stay testable with mock
//! engines and a different engine only needs a new adapter.

pub mod ffmpeg;
pub mod ytdlp;

pub use ffmpeg::FfmpegEngine;
pub use ytdlp::YtDlpEngine;

use crate::error::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// What the retrieval engine reported in a progress callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    /// A file is partially downloaded
    Downloading,
    /// A file finished downloading
    Finished,
}

/// One progress callback from the retrieval engine
///
/// Metric strings arrive already stripped of terminal escapes; whatever
/// decoration the concrete engine adds stays inside its adapter.
#[derive(Clone, Debug)]
pub struct FetchUpdate {
    /// Callback status
    pub status: FetchStatus,
    /// Percentage as the engine formats it (e.g. " 42.0%")
    pub percent_str: String,
    /// Transfer rate as the engine formats it (e.g. "2.00MiB/s")
    pub speed_str: String,
    /// Time remaining as the engine formats it (e.g. "00:30")
    pub eta_str: String,
    /// File the callback refers to
    pub filename: PathBuf,
}

/// Metadata probe result for a URL
#[derive(Clone, Debug)]
pub struct MediaProbe {
    /// Title of the media or collection
    pub title: String,
    /// Number of entries when the URL resolves to a collection
    pub entry_count: Option<usize>,
}

impl MediaProbe {
    /// Whether the probed URL is a multi-item collection
    pub fn is_collection(&self) -> bool {
        self.entry_count.is_some()
    }
}

/// Everything the retrieval engine needs for one fetch run
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Source URL
    pub url: String,
    /// Engine output template (rendered path with engine placeholders)
    pub output_template: String,
    /// Engine format selector
    pub format: String,
    /// Treat the URL as a collection
    pub playlist: bool,
    /// Container to merge separate streams into
    pub merge_container: String,
    /// Download subtitle files
    pub download_subtitles: bool,
    /// Embed subtitles into the container
    pub embed_subtitles: bool,
    /// All subtitle languages instead of English only
    pub all_subtitles: bool,
}

/// Receiver for retrieval engine callbacks
///
/// Implemented by the retrieval stage; the engine adapter pushes updates in
/// engine order, one item at a time.
pub trait FetchSink: Send {
    /// A progress callback arrived
    fn on_progress(&mut self, update: &FetchUpdate);
    /// An item finished and is available at `path`
    fn on_item_finished(&mut self, path: &Path);
}

/// Retrieval engine seam
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Probe a URL for its title and collection size without downloading
    async fn probe(&self, url: &str, playlist: bool) -> Result<MediaProbe>;

    /// Fetch the URL, reporting progress into `sink`
    ///
    /// Returns [`crate::Error::Cancelled`] when stopped via `cancel`; the
    /// adapter is responsible for killing its child process in that case.
    async fn fetch(
        &self,
        request: &FetchRequest,
        sink: &mut dyn FetchSink,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Name of the engine implementation
    fn name(&self) -> &'static str;
}

/// Stream parameters for one transcode run
#[derive(Clone, Debug)]
pub enum TranscodeArgs {
    /// Re-encode video and audio streams
    Video {
        /// Output width in pixels
        width: u32,
        /// Output height in pixels
        height: u32,
        /// Video codec name
        video_codec: String,
        /// Video bitrate, engine syntax
        video_bitrate: String,
        /// Output frame rate
        fps: u32,
        /// Audio codec name
        audio_codec: String,
        /// Audio bitrate, engine syntax
        audio_bitrate: String,
        /// Number of audio channels
        audio_channels: u32,
    },
    /// Re-encode the audio stream only
    Audio {
        /// Audio codec name
        audio_codec: String,
        /// Audio bitrate, engine syntax
        audio_bitrate: String,
        /// Number of audio channels
        audio_channels: u32,
    },
}

/// One transcode run: input, output, and stream parameters
#[derive(Clone, Debug)]
pub struct TranscodeInvocation {
    /// Source file
    pub input: PathBuf,
    /// Destination file
    pub output: PathBuf,
    /// Stream parameters
    pub args: TranscodeArgs,
}

impl TranscodeInvocation {
    /// Render the engine argument list (ffmpeg CLI syntax)
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            OsString::from("-y"),
            OsString::from("-i"),
            self.input.clone().into_os_string(),
        ];
        match &self.args {
            TranscodeArgs::Video {
                width,
                height,
                video_codec,
                video_bitrate,
                fps,
                audio_codec,
                audio_bitrate,
                audio_channels,
            } => {
                args.push(OsString::from("-vf"));
                args.push(OsString::from(format!("scale={width}:{height}")));
                args.push(OsString::from("-c:v"));
                args.push(OsString::from(video_codec));
                args.push(OsString::from("-b:v"));
                args.push(OsString::from(video_bitrate));
                args.push(OsString::from("-r"));
                args.push(OsString::from(fps.to_string()));
                args.push(OsString::from("-c:a"));
                args.push(OsString::from(audio_codec));
                args.push(OsString::from("-b:a"));
                args.push(OsString::from(audio_bitrate));
                args.push(OsString::from("-ac"));
                args.push(OsString::from(audio_channels.to_string()));
            }
            TranscodeArgs::Audio {
                audio_codec,
                audio_bitrate,
                audio_channels,
            } => {
                args.push(OsString::from("-c:a"));
                args.push(OsString::from(audio_codec));
                args.push(OsString::from("-b:a"));
                args.push(OsString::from(audio_bitrate));
                args.push(OsString::from("-ac"));
                args.push(OsString::from(audio_channels.to_string()));
            }
        }
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// Receiver for transcoding engine diagnostic lines
pub trait TranscodeSink: Send {
    /// One line of engine diagnostic output arrived
    fn on_line(&mut self, line: &str);
}

/// Transcoding engine seam
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Total duration of a media file in seconds (0.0 when unavailable)
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Run one transcode, streaming diagnostic lines into `sink`
    ///
    /// Returns [`crate::Error::Cancelled`] when stopped via `cancel`; the
    /// adapter kills its child process in that case.
    async fn transcode(
        &self,
        invocation: &TranscodeInvocation,
        sink: &mut dyn TranscodeSink,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Name of the engine implementation
    fn name(&self) -> &'static str;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn arg_strings(invocation: &TranscodeInvocation) -> Vec<String> {
        invocation
            .to_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn video_invocation_renders_scale_and_both_codec_groups() {
        let invocation = TranscodeInvocation {
            input: PathBuf::from("/in/clip.webm"),
            output: PathBuf::from("/out/clip.mp4"),
            args: TranscodeArgs::Video {
                width: 1280,
                height: 720,
                video_codec: "libx264".into(),
                video_bitrate: "5M".into(),
                fps: 30,
                audio_codec: "aac".into(),
                audio_bitrate: "192k".into(),
                audio_channels: 2,
            },
        };
        let args = arg_strings(&invocation);
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/in/clip.webm", "-vf", "scale=1280:720", "-c:v", "libx264", "-b:v",
                "5M", "-r", "30", "-c:a", "aac", "-b:a", "192k", "-ac", "2", "/out/clip.mp4",
            ]
        );
    }

    #[test]
    fn audio_invocation_has_no_video_arguments() {
        let invocation = TranscodeInvocation {
            input: PathBuf::from("/in/track.webm"),
            output: PathBuf::from("/out/track - 320k.mp3"),
            args: TranscodeArgs::Audio {
                audio_codec: "libmp3lame".into(),
                audio_bitrate: "320k".into(),
                audio_channels: 2,
            },
        };
        let args = arg_strings(&invocation);
        assert!(!args.contains(&"-vf".to_string()));
        assert!(!args.contains(&"-c:v".to_string()));
        assert!(!args.contains(&"-r".to_string()));
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("/out/track - 320k.mp3")
        );
    }

    #[test]
    fn probe_without_entry_count_is_not_a_collection() {
        let probe = MediaProbe {
            title: "Single clip".into(),
            entry_count: None,
        };
        assert!(!probe.is_collection());

        let probe = MediaProbe {
            title: "A playlist".into(),
            entry_count: Some(12),
        };
        assert!(probe.is_collection());
    }
}
