//! Download and conversion preset bundles
//!
//! Presets are stored as JSON objects keyed by display name. The on-disk
//! order is the display order, so [`PresetSet`] keeps names in insertion
//! order (backed by serde_json's order-preserving map).

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Options the retrieval stage derives from a download preset
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPreset {
    /// Engine format selector
    #[serde(default = "default_format")]
    pub format: String,

    /// Final container extension, without a leading dot
    ///
    /// Also decides which finished files count toward collection completion:
    /// only items arriving in this container increment the completed count.
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Download subtitle files alongside the media
    #[serde(default)]
    pub download_subtitles: bool,

    /// Embed subtitles into the container instead of writing separate files
    #[serde(default)]
    pub embed_subtitles: bool,

    /// Fetch every available subtitle language instead of English only
    #[serde(default)]
    pub all_subtitles: bool,
}

impl Default for DownloadPreset {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_format: default_output_format(),
            download_subtitles: false,
            embed_subtitles: false,
            all_subtitles: false,
        }
    }
}

fn default_format() -> String {
    "bestvideo[height<=1080]+bestaudio/best".to_string()
}

fn default_output_format() -> String {
    "webm".to_string()
}

/// Kind of media a conversion preset produces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetType {
    /// Re-encode video and audio streams
    #[default]
    Video,
    /// Extract/re-encode the audio stream only
    Audio,
    /// Unrecognized type; files with this preset are skipped
    #[serde(other)]
    Other,
}

/// Parameters the transcoding stage derives from a conversion preset
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionPreset {
    /// Whether this preset produces video or audio output
    #[serde(default)]
    pub preset_type: PresetType,

    /// Output container extension, without a leading dot (default: "mp4")
    #[serde(default = "default_conversion_output_format")]
    pub output_format: String,

    /// Output width in pixels (video presets)
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels (video presets)
    #[serde(default = "default_height")]
    pub height: u32,

    /// Video codec name passed to the engine (video presets)
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Audio codec name passed to the engine
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Video bitrate, engine syntax (e.g. "5M")
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Audio bitrate, engine syntax (e.g. "192k")
    ///
    /// For audio presets this also becomes part of the output filename, so
    /// the same source can be converted at several bitrates side by side.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output frame rate (video presets)
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Number of audio channels
    #[serde(default = "default_audio_channels")]
    pub audio_channels: u32,
}

impl Default for ConversionPreset {
    fn default() -> Self {
        Self {
            preset_type: PresetType::Video,
            output_format: default_conversion_output_format(),
            width: default_width(),
            height: default_height(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            video_bitrate: default_video_bitrate(),
            audio_bitrate: default_audio_bitrate(),
            fps: default_fps(),
            audio_channels: default_audio_channels(),
        }
    }
}

fn default_conversion_output_format() -> String {
    "mp4".to_string()
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_video_bitrate() -> String {
    "5M".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_fps() -> u32 {
    30
}

fn default_audio_channels() -> u32 {
    2
}

/// Name-keyed, insertion-ordered preset collection
///
/// Loaded from a JSON object whose keys are display names and whose values
/// are individual presets.
#[derive(Clone, Debug, Default)]
pub struct PresetSet<P> {
    names: Vec<String>,
    presets: HashMap<String, P>,
}

impl<P: DeserializeOwned> PresetSet<P> {
    /// Load a preset file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a JSON object, or
    /// any entry fails to deserialize.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a preset collection from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut names = Vec::with_capacity(map.len());
        let mut presets = HashMap::with_capacity(map.len());
        for (name, value) in map {
            let preset: P = serde_json::from_value(value)?;
            names.push(name.clone());
            presets.insert(name, preset);
        }
        Ok(Self { names, presets })
    }
}

impl<P> PresetSet<P> {
    /// Preset names in file order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Look up a preset by display name
    pub fn get(&self, name: &str) -> Option<&P> {
        self.presets.get(name)
    }

    /// Look up a preset by display position
    pub fn get_index(&self, index: usize) -> Option<(&str, &P)> {
        let name = self.names.get(index)?;
        self.presets.get(name).map(|preset| (name.as_str(), preset))
    }

    /// Number of presets
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
