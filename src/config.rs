//! Engine configuration
//!
//! JSON file first, then `LISTING_GRAPHICS_*` environment overrides.
//! Unparseable environment values keep the file/default value.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Per-resource fetch + decode bound. A hero photo that exceeds it fails the render.
    pub resource_timeout_ms: u64,
    /// Same-origin proxy prefix; the remote URL is appended percent-encoded.
    pub proxy_endpoint: Option<String>,
    pub max_resource_bytes: usize,
    pub max_decoded_pixels: u64,
    pub font_files: Vec<PathBuf>,
    pub font_family: String,
    pub load_system_fonts: bool,
    pub templates_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resource_timeout_ms: 8_000,
            proxy_endpoint: None,
            max_resource_bytes: 25 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            font_files: Vec::new(),
            font_family: "Helvetica, Arial, sans-serif".to_string(),
            load_system_fonts: true,
            templates_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env(mut self) -> Self {
        if let Ok(endpoint) = env::var("LISTING_GRAPHICS_PROXY_ENDPOINT") {
            self.proxy_endpoint = Some(endpoint).filter(|value| !value.is_empty());
        }
        self.resource_timeout_ms = parse_u64("LISTING_GRAPHICS_RESOURCE_TIMEOUT_MS", self.resource_timeout_ms);
        if let Ok(family) = env::var("LISTING_GRAPHICS_FONT_FAMILY") {
            if !family.trim().is_empty() {
                self.font_family = family;
            }
        }
        if let Ok(dir) = env::var("LISTING_GRAPHICS_TEMPLATES_DIR") {
            self.templates_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_millis(self.resource_timeout_ms.max(1))
    }
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"resourceTimeoutMs": 2500, "proxyEndpoint": "/api/proxy-image?url="}"#).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.resource_timeout(), Duration::from_millis(2500));
        assert_eq!(config.proxy_endpoint.as_deref(), Some("/api/proxy-image?url="));
        assert_eq!(config.max_decoded_pixels, 40_000_000);
        assert!(config.load_system_fonts);
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineConfig::from_file(&dir.path().join("nope.json")),
            Err(ConfigError::Read { .. })
        ));
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(EngineConfig::from_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = EngineConfig {
            resource_timeout_ms: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.resource_timeout(), Duration::from_millis(1));
    }
}
