//! CLI-based transcoding engine driving the external ffmpeg/ffprobe binaries
//!
//! ffmpeg writes its progress as stats lines on stderr, separated by carriage
//! returns rather than newlines, so the adapter splits on both and forwards
//! every segment to the [`TranscodeSink`]. Duration probing shells out to
//! ffprobe; an unparseable duration reports as 0.0 so progress math degrades
//! to 0% instead of failing the file.

use super::{TranscodeEngine, TranscodeInvocation, TranscodeSink};
use crate::config::ToolsConfig;
use crate::error::{Error, Result, TranscodeError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// CLI-based transcoding engine using the external ffmpeg and ffprobe binaries
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegEngine {
    /// Create a new engine with explicit binary paths
    pub fn new(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    /// Attempt to find ffmpeg and ffprobe in PATH
    pub fn from_path() -> Option<Self> {
        let ffmpeg = which::which("ffmpeg").ok()?;
        let ffprobe = which::which("ffprobe").ok()?;
        Some(Self::new(ffmpeg, ffprobe))
    }

    /// Resolve the binaries from [`ToolsConfig`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalTool`] when either binary is neither
    /// explicitly configured nor discoverable on PATH.
    pub fn from_config(tools: &ToolsConfig) -> Result<Self> {
        let ffmpeg = resolve(tools.ffmpeg_path.as_deref(), "ffmpeg", tools.search_path)?;
        let ffprobe = resolve(tools.ffprobe_path.as_deref(), "ffprobe", tools.search_path)?;
        Ok(Self::new(ffmpeg, ffprobe))
    }
}

fn resolve(explicit: Option<&Path>, binary: &str, search_path: bool) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if search_path {
        if let Ok(path) = which::which(binary) {
            return Ok(path);
        }
    }
    Err(Error::ExternalTool(format!("{binary} binary not found")))
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .arg("-i")
            .arg(path)
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-v")
            .arg("quiet")
            .arg("-of")
            .arg("csv=p=0")
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute ffprobe: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration = stdout.trim().parse::<f64>().unwrap_or(0.0);
        if duration == 0.0 {
            tracing::warn!(path = %path.display(), "could not determine media duration");
        }
        Ok(duration)
    }

    async fn transcode(
        &self,
        invocation: &TranscodeInvocation,
        sink: &mut dyn TranscodeSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !invocation.input.exists() {
            return Err(TranscodeError::InputMissing {
                path: invocation.input.clone(),
            }
            .into());
        }

        tracing::info!(
            input = %invocation.input.display(),
            output = %invocation.output.display(),
            engine = self.name(),
            "starting transcode"
        );

        let mut child = Command::new(&self.ffmpeg_path)
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to execute ffmpeg: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("ffmpeg stderr unavailable".to_string()))?;

        // Stats lines end with \r, everything else with \n. Read up to \r and
        // split the chunk on both so the sink sees each segment exactly once.
        let mut reader = BufReader::new(stderr);
        let mut buf: Vec<u8> = Vec::new();
        let mut tail = String::new();
        loop {
            buf.clear();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(input = %invocation.input.display(), "transcode cancelled, killing engine process");
                    child.start_kill().ok();
                    tokio::time::timeout(Duration::from_secs(5), child.wait())
                        .await
                        .ok();
                    return Err(Error::Cancelled);
                }
                read = reader.read_until(b'\r', &mut buf) => {
                    match read {
                        Ok(0) => break,
                        Ok(_) => {
                            let chunk = String::from_utf8_lossy(&buf);
                            for segment in chunk.split(['\r', '\n']) {
                                let segment = segment.trim();
                                if !segment.is_empty() {
                                    sink.on_line(segment);
                                    tail = segment.to_string();
                                }
                            }
                        }
                        Err(e) => {
                            child.start_kill().ok();
                            return Err(Error::Io(e));
                        }
                    }
                }
            }
        }

        let status = child.wait().await.map_err(Error::Io)?;
        if !status.success() {
            return Err(TranscodeError::EngineFailed {
                input: invocation.input.clone(),
                reason: if tail.is_empty() {
                    format!("ffmpeg exited with status {:?}", status.code())
                } else {
                    tail
                },
            }
            .into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cli-ffmpeg"
    }
}
