// Output configuration and persistence
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Configuration for the cpal output backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output device name, or None for the system default
    pub device: Option<String>,
    /// Ring buffer length in milliseconds of audio at the stream rate
    pub ring_buffer_ms: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            ring_buffer_ms: 250,
        }
    }
}

impl OutputConfig {
    /// Load a config from a JSON file, or return defaults if the file doesn't exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("no output config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read output config {:?}", path))?;

        let config: OutputConfig =
            serde_json::from_str(&content).context("failed to parse output config")?;

        Ok(config)
    }

    /// Save the config as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), anyhow::Error> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("failed to write output config {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OutputConfig::default();
        assert_eq!(config.device, None);
        assert_eq!(config.ring_buffer_ms, 250);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: OutputConfig = serde_json::from_str(r#"{"device":"Speakers"}"#).unwrap();
        assert_eq!(config.device.as_deref(), Some("Speakers"));
        assert_eq!(config.ring_buffer_ms, 250);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::env::temp_dir().join("soundcue-test-missing-config.json");
        let _ = std::fs::remove_file(&path);

        let config = OutputConfig::load(&path).unwrap();
        assert_eq!(config.ring_buffer_ms, OutputConfig::default().ring_buffer_ms);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join("soundcue-test-config.json");

        let config = OutputConfig {
            device: Some("Headphones".to_string()),
            ring_buffer_ms: 100,
        };
        config.save(&path).unwrap();

        let loaded = OutputConfig::load(&path).unwrap();
        assert_eq!(loaded.device.as_deref(), Some("Headphones"));
        assert_eq!(loaded.ring_buffer_ms, 100);

        let _ = std::fs::remove_file(&path);
    }
}
