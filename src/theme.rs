//! Theme registry and stylesheet loading
//!
//! `themes.json` maps display names to stylesheet filenames in the same
//! directory. Unknown names fall back to the light stylesheet rather than
//! failing, so a stale `themeName` in the settings file never blocks startup.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

const DEFAULT_STYLESHEET: &str = "light.qss";

/// Registry of available themes
#[derive(Clone, Debug)]
pub struct ThemeStore {
    dir: PathBuf,
    registry: Vec<(String, String)>,
}

impl ThemeStore {
    /// Load the theme registry from `dir/themes.json`
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file cannot be read or parsed.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("themes.json");
        let text = std::fs::read_to_string(&path).map_err(|e| Error::Config {
            message: format!("failed to read theme registry '{}': {}", path.display(), e),
            key: None,
        })?;
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
        let mut registry = Vec::with_capacity(map.len());
        for (name, value) in map {
            let filename = value.as_str().ok_or_else(|| Error::Config {
                message: format!("theme registry entry '{name}' is not a filename"),
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

    /// Load the stylesheet text for a theme by display name
    ///
    /// Unknown names load the default light stylesheet.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved stylesheet file cannot be read.
    pub fn stylesheet(&self, name: &str) -> Result<String> {
        let filename = self
            .registry
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.as_str())
            .unwrap_or(DEFAULT_STYLESHEET);
        let path = self.dir.join(filename);
        let text = std::fs::read_to_string(&path)?;
        Ok(text)
    }
}
