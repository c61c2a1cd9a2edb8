//! Configuration types for media-dl
//!
//! [`Settings`] is the persisted application record (a single `settings.json`
//! file, camelCase keys for compatibility with existing installs);
//! [`ToolsConfig`] holds external binary paths; [`AppDirs`] resolves and
//! creates the platform directories everything else lives in.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted application settings
///
/// Every field has a default, so a missing or partially written
/// `settings.json` still loads. Unknown selections (preset or theme indices
/// out of range) are the consumer's concern; this record only stores them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Display language name (default: "English")
    #[serde(default = "default_language")]
    pub language: String,

    /// Active theme display name (default: "Light")
    #[serde(default = "default_theme_name")]
    pub theme_name: String,

    /// Index of the active theme in the theme registry
    #[serde(default)]
    pub selected_theme: usize,

    /// UI font size in points (default: 14)
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Index of the active font size option
    #[serde(default = "default_selected_font_size")]
    pub selected_font_size: usize,

    /// Where retrieved media lands
    #[serde(default = "default_download_folder")]
    pub default_download_folder: PathBuf,

    /// Name of the active download preset ("" = none selected)
    #[serde(default)]
    pub download_preset: String,

    /// Index of the active download preset
    #[serde(default = "default_selected_download_preset")]
    pub selected_download_preset: usize,

    /// Where converted media lands
    #[serde(default = "default_conversion_folder")]
    pub default_conversion_folder: PathBuf,

    /// Name of the active conversion preset ("" = none selected)
    #[serde(default)]
    pub conversion_preset: String,

    /// Index of the active conversion preset
    #[serde(default)]
    pub selected_conversion_preset: usize,

    /// Delete the source file after a successful conversion
    #[serde(default)]
    pub delete_original_file: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: default_language(),
            theme_name: default_theme_name(),
            selected_theme: 0,
            font_size: default_font_size(),
            selected_font_size: default_selected_font_size(),
            default_download_folder: default_download_folder(),
            download_preset: String::new(),
            selected_download_preset: default_selected_download_preset(),
            default_conversion_folder: default_conversion_folder(),
            conversion_preset: String::new(),
            selected_conversion_preset: 0,
            delete_original_file: false,
        }
    }
}

impl Settings {
    /// Load settings from `path`, writing defaults first if the file is missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the defaults cannot be written.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "settings file missing, writing defaults");
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }
        let text = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&text)?;
        Ok(settings)
    }

    /// Persist the whole record to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Overwrite `path` with defaults and return them
    pub fn reset(path: &Path) -> Result<Self> {
        let settings = Self::default();
        settings.save(path)?;
        Ok(settings)
    }
}

fn default_language() -> String {
    "English".to_string()
}

fn default_theme_name() -> String {
    "Light".to_string()
}

fn default_font_size() -> u32 {
    14
}

fn default_selected_font_size() -> usize {
    1
}

fn default_selected_download_preset() -> usize {
    1
}

fn default_download_folder() -> PathBuf {
    media_root().join("Media Downloads")
}

fn default_conversion_folder() -> PathBuf {
    media_root().join("Media Conversions")
}

fn media_root() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// External tool paths (yt-dlp, ffmpeg, ffprobe)
///
/// Explicit paths take precedence; when unset and `search_path` is true, the
/// binaries are discovered on PATH via the `which` crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Resolved application directories
///
/// Created (not just resolved) on construction, so later loads can assume
/// they exist.
#[derive(Clone, Debug)]
pub struct AppDirs {
    /// Platform config directory for this application
    pub config_dir: PathBuf,
    /// Default retrieval destination
    pub download_dir: PathBuf,
    /// Default conversion destination
    pub convert_dir: PathBuf,
}

impl AppDirs {
    /// Resolve and create the directory set for `app_name`
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn resolve(app_name: &str) -> Result<Self> {
        let config_root = dirs::config_dir().ok_or_else(|| Error::Config {
            message: "platform config directory could not be determined".to_string(),
            key: None,
        })?;
        let dirs = Self {
            config_dir: config_root.join(app_name),
            download_dir: default_download_folder(),
            convert_dir: default_conversion_folder(),
        };
        for dir in [&dirs.config_dir, &dirs.download_dir, &dirs.convert_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }
        Ok(dirs)
    }

    /// Path of the settings file inside the config directory
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}
