//! CLI-based retrieval engine driving the external yt-dlp binary
//!
//! The adapter spawns `yt-dlp --newline` and translates its stdout into
//! [`FetchSink`] callbacks. Everything yt-dlp-specific lives here: the
//! progress line format, destination/merger announcements, and the ANSI
//! color escapes yt-dlp mixes into metric strings.

use super::{FetchEngine, FetchRequest, FetchSink, FetchStatus, FetchUpdate, MediaProbe};
use crate::config::ToolsConfig;
use crate::error::{Error, FetchError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("static pattern"))
}

fn progress_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(
            r"^\[download\]\s+(?P<percent>\d+(?:\.\d+)?)%(?:\s+of\s+~?\s*\S+)?(?:\s+at\s+(?P<speed>\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
        )
        .expect("static pattern")
    })
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"^\[download\] Destination: (?P<path>.+)$").expect("static pattern"))
}

fn merger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(r#"^\[Merger\] Merging formats into "(?P<path>.+)"$"#).expect("static pattern")
    })
}

fn already_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(r"^\[download\] (?P<path>.+) has already been downloaded").expect("static pattern")
    })
}

fn strip_ansi(line: &str) -> String {
    ansi_re().replace_all(line, "").into_owned()
}

/// CLI-based retrieval engine using the external yt-dlp binary
pub struct YtDlpEngine {
    binary_path: PathBuf,
}

impl YtDlpEngine {
    /// Create a new engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Resolve the binary from [`ToolsConfig`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalTool`] when no explicit path is configured
    /// and PATH discovery fails or is disabled.
    pub fn from_config(tools: &ToolsConfig) -> Result<Self> {
        if let Some(path) = &tools.ytdlp_path {
            return Ok(Self::new(path.clone()));
        }
        if tools.search_path {
            if let Some(engine) = Self::from_path() {
                return Ok(engine);
            }
        }
        Err(Error::ExternalTool("yt-dlp binary not found".to_string()))
    }

    fn handle_line(raw: &str, current: &mut Option<PathBuf>, sink: &mut dyn FetchSink) {
        let stripped = strip_ansi(raw);
        let line = stripped.trim_end();

        if let Some(caps) = destination_re().captures(line) {
            *current = Some(PathBuf::from(&caps["path"]));
            return;
        }
        if let Some(caps) = merger_re().captures(line) {
            // The merge itself is near-instant; the merged file is the
            // finished item in its final container.
            let path = PathBuf::from(&caps["path"]);
            sink.on_item_finished(&path);
            *current = Some(path);
            return;
        }
        if let Some(caps) = already_re().captures(line) {
            let path = PathBuf::from(&caps["path"]);
            sink.on_item_finished(&path);
            *current = Some(path);
            return;
        }
        if let Some(caps) = progress_re().captures(line) {
            let Some(filename) = current.clone() else {
                return;
            };
            let percent = &caps["percent"];
            let update = FetchUpdate {
                status: FetchStatus::Downloading,
                percent_str: format!("{percent}%"),
                speed_str: caps
                    .name("speed")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                eta_str: caps
                    .name("eta")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                filename: filename.clone(),
            };
            sink.on_progress(&update);
            // "[download] 100% of 12.34MiB in 00:05" marks the stream done;
            // plain "100.0%" progress lines do not.
            if percent == "100" && line.contains(" in ") {
                sink.on_item_finished(&filename);
            }
        }
    }
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    async fn probe(&self, url: &str, playlist: bool) -> Result<MediaProbe> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("--dump-single-json").arg("--no-warnings");
        if playlist {
            cmd.arg("--flat-playlist");
        } else {
            cmd.arg("--no-playlist");
        }
        cmd.arg(url);

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::ProbeFailed {
                url: url.to_string(),
                reason: last_line(&stderr),
            }
            .into());
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::InvalidMetadata(format!("probe output not JSON: {e}")))?;

        let title = value
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or("download")
            .to_string();
        let entry_count = if playlist {
            value
                .get("entries")
                .and_then(|e| e.as_array())
                .map(|entries| entries.len())
                .or_else(|| {
                    value
                        .get("playlist_count")
                        .and_then(|c| c.as_u64())
                        .map(|c| c as usize)
                })
        } else {
            None
        };

        Ok(MediaProbe { title, entry_count })
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        sink: &mut dyn FetchSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("--newline")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&request.output_template)
            .arg("-f")
            .arg(&request.format);
        if request.playlist {
            cmd.arg("--yes-playlist");
        } else {
            cmd.arg("--no-playlist");
        }
        if !request.merge_container.is_empty() {
            cmd.arg("--merge-output-format").arg(&request.merge_container);
        }
        if request.download_subtitles {
            cmd.arg("--write-subs");
            cmd.arg("--sub-langs")
                .arg(if request.all_subtitles { "all" } else { "en" });
            if request.embed_subtitles {
                cmd.arg("--embed-subs");
            }
        }
        cmd.arg(&request.url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        tracing::info!(url = %request.url, engine = self.name(), "starting fetch");

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to execute yt-dlp: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                use tokio::io::AsyncReadExt;
                stderr.read_to_string(&mut buf).await.ok();
            }
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut current: Option<PathBuf> = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(url = %request.url, "fetch cancelled, killing engine process");
                    child.start_kill().ok();
                    tokio::time::timeout(Duration::from_secs(5), child.wait())
                        .await
                        .ok();
                    return Err(Error::Cancelled);
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => Self::handle_line(&line, &mut current, sink),
                        Ok(None) => break,
                        Err(e) => {
                            child.start_kill().ok();
                            return Err(Error::Io(e));
                        }
                    }
                }
            }
        }

        let status = child.wait().await.map_err(Error::Io)?;
        let stderr_text = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(FetchError::EngineExited {
                code: status.code(),
                reason: last_line(&stderr_text),
            }
            .into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("engine produced no diagnostic output")
        .trim()
        .to_string()
}
