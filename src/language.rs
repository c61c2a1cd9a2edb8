//! UI string tables and template rendering
//!
//! Progress messages are built from templates with named `{placeholder}`
//! tokens so translations can reorder them freely. A registry file
//! (`languages.json`) maps display names to per-language table files; the
//! table is a two-level map of tab name to key to template. Every key the
//! stages use has a built-in English fallback, so a sparse translation still
//! produces readable messages.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Registry of available languages
#[derive(Clone, Debug)]
pub struct LanguageStore {
    dir: PathBuf,
    registry: Vec<(String, String)>,
}

impl LanguageStore {
    /// Load the language registry from `dir/languages.json`
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file cannot be read or parsed. This
    /// is fatal at startup: without the registry no language can be resolved.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("languages.json");
        let text = std::fs::read_to_string(&path).map_err(|e| Error::Config {
            message: format!("failed to read language registry '{}': {}", path.display(), e),
            key: None,
        })?;
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
        let mut registry = Vec::with_capacity(map.len());
        for (name, value) in map {
            let filename = value.as_str().ok_or_else(|| Error::Config {
                message: format!("language registry entry '{name}' is not a filename"),
                key: Some(name.clone()),
            })?;
            registry.push((name, filename.to_string()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            registry,
        })
    }

    /// Display names in registry order
    pub fn available(&self) -> Vec<&str> {
        self.registry.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Load the string table for a language by display name
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedLanguage`] when the name is not in the
    /// registry, or a read/parse error for a broken table file. Both are
    /// fatal at startup.
    pub fn load_table(&self, name: &str) -> Result<LanguageTable> {
        let filename = self
            .registry
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
            .ok_or_else(|| Error::UnsupportedLanguage(name.to_string()))?;
        let path = self.dir.join(filename);
        let text = std::fs::read_to_string(&path).map_err(|e| Error::Config {
            message: format!("failed to read language table '{}': {}", path.display(), e),
            key: Some(name.to_string()),
        })?;
        let tabs: HashMap<String, HashMap<String, String>> = serde_json::from_str(&text)?;
        Ok(LanguageTable { tabs })
    }
}

/// A loaded language table (tab -> key -> template)
#[derive(Clone, Debug, Default)]
pub struct LanguageTable {
    tabs: HashMap<String, HashMap<String, String>>,
}

impl LanguageTable {
    /// Look up a template, without fallback
    pub fn get(&self, tab: &str, key: &str) -> Option<&str> {
        self.tabs.get(tab)?.get(key).map(String::as_str)
    }

    /// Look up a template, falling back to the built-in English string
    ///
    /// Missing tab/key combinations that have no built-in fallback render as
    /// an empty string; stages only use keys that do have one.
    pub fn template(&self, tab: &str, key: &str) -> &str {
        self.get(tab, key).unwrap_or_else(|| fallback(tab, key))
    }
}

/// Built-in English templates for every key the stages emit
fn fallback(tab: &str, key: &str) -> &'static str {
    match (tab, key) {
        ("download", "downloading") => "Downloading {file_type}: {percent_str} at {speed}, ETA {eta}",
        ("download", "playlistProgress") => "Downloaded {downloaded_video} of {total_video} videos",
        ("download", "merging") => "Merging formats...",
        ("download", "playlistFinished") => "Playlist download finished",
        ("download", "singleFinished") => "Download finished",
        ("download", "startingConversion") => "Starting conversion...",
        ("download", "downloadError") => "Download error: {error}",
        ("conversion", "processing") => "Converting {file}: {percent_str}",
        ("conversion", "completed") => "Conversion completed: {file}",
        ("conversion", "deleted") => "Deleted original file: {file}",
        ("conversion", "deleteMissing") => "Could not delete missing file: {file}",
        ("conversion", "conversionError") => "Conversion error: {error}",
        ("conversion", "allConverted") => "All files converted to {destination}",
        _ => "",
    }
}

/// Substitute named `{placeholder}` tokens in a template
///
/// Unknown placeholders are left in place; extra arguments are ignored.
pub fn render(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in args {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}
