//! User configuration, read once when a display instance starts

use std::io;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Settings from `config.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Default font size in pixels (0 uses the host's default)
    pub font_size: u32,

    /// CSS file applied to the window chrome
    pub chrome_css: Option<PathBuf>,

    /// Window width when no geometry was saved (0 = built-in default)
    pub default_width: i32,

    /// Window height when no geometry was saved (0 = built-in default)
    pub default_height: i32,

    /// Window x position when no geometry was saved
    pub default_x: i32,

    /// Window y position when no geometry was saved
    pub default_y: i32,
}

impl Config {
    /// `<config-dir>/vitrine`, honoring `XDG_CONFIG_HOME`
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vitrine"))
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Parse a config file, failing on any error.
    pub fn load_from_file(path: &Path) -> io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid config {}: {}", path.display(), e),
            )
        })
    }

    /// Config from `path` (or the default location). A missing file gives
    /// the defaults; a broken one is reported and also gives the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("{}; using default configuration", e);
                Self::default()
            }
        }
    }

    /// Contents of the chrome CSS file, empty if unset or unreadable.
    pub fn chrome_css_contents(&self) -> String {
        let Some(path) = &self.chrome_css else {
            return String::new();
        };
        std::fs::read_to_string(path).unwrap_or_else(|e| {
            tracing::debug!("Failed to read chrome CSS {:?}: {}", path, e);
            String::new()
        })
    }

    /// JSON Schema describing the config file
    pub fn schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Config)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_or_default(Some(&temp.path().join("config.json")));
        assert_eq!(config, Config::default());
        assert_eq!(config.font_size, 0);
    }

    #[test]
    fn test_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"font_size": 18, "default_width": 1200}"#).unwrap();

        let config = Config::load_or_default(Some(&path));
        assert_eq!(config.font_size, 18);
        assert_eq!(config.default_width, 1200);
        assert_eq!(config.default_height, 0);
        assert_eq!(config.chrome_css, None);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"font_size": "large"}"#).unwrap();

        assert!(Config::load_from_file(&path).is_err());
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
    }

    #[test]
    fn test_chrome_css_contents() {
        let temp = TempDir::new().unwrap();
        let css = temp.path().join("chrome.css");
        std::fs::write(&css, "body { color: red; }").unwrap();

        let config = Config {
            chrome_css: Some(css),
            ..Default::default()
        };
        assert_eq!(config.chrome_css_contents(), "body { color: red; }");

        let missing = Config {
            chrome_css: Some(temp.path().join("nope.css")),
            ..Default::default()
        };
        assert_eq!(missing.chrome_css_contents(), "");
        assert_eq!(Config::default().chrome_css_contents(), "");
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = Config::schema();
        let properties = &schema["properties"];
        assert!(properties.get("font_size").is_some());
        assert!(properties.get("chrome_css").is_some());
        assert!(properties.get("default_x").is_some());
    }
}
