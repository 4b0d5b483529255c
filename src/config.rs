//! Configuration types for Wiretap

use serde::{Deserialize, Serialize};

use crate::{CaptureError, Result};

/// Capture tuning knobs
///
/// The defaults are safe for production instrumentation; both limits bound
/// what the capture engine keeps, never what the instrumented client
/// delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// How many leading bytes the text-likelihood probe inspects
    #[serde(default = "default_probe_window")]
    pub utf8_probe_window: usize,
    /// Upper bound on materialized body text, in bytes
    #[serde(default = "default_max_captured")]
    pub max_captured_bytes: usize,
}

fn default_probe_window() -> usize {
    64
}

fn default_max_captured() -> usize {
    256 * 1024
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            utf8_probe_window: default_probe_window(),
            max_captured_bytes: default_max_captured(),
        }
    }
}

impl CaptureConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.utf8_probe_window == 0 {
            return Err(CaptureError::Config(
                "utf8_probe_window must be > 0".to_string(),
            ));
        }

        if self.max_captured_bytes < self.utf8_probe_window {
            return Err(CaptureError::Config(format!(
                "max_captured_bytes ({}) must be >= utf8_probe_window ({})",
                self.max_captured_bytes, self.utf8_probe_window
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();

        assert_eq!(config.utf8_probe_window, 64);
        assert_eq!(config.max_captured_bytes, 256 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse() {
        let config_toml = r"
            utf8_probe_window = 128
            max_captured_bytes = 4096
        ";

        let config: CaptureConfig = toml::from_str(config_toml).unwrap();
        assert_eq!(config.utf8_probe_window, 128);
        assert_eq!(config.max_captured_bytes, 4096);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r"
            utf8_probe_window = 32
        ";
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = CaptureConfig::from_file(file.path()).unwrap();
        assert_eq!(config.utf8_probe_window, 32);
        assert_eq!(config.max_captured_bytes, 256 * 1024);
    }

    #[test]
    fn test_invalid_zero_window() {
        let config = CaptureConfig {
            utf8_probe_window: 0,
            ..CaptureConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_cap_below_window() {
        let config = CaptureConfig {
            utf8_probe_window: 64,
            max_captured_bytes: 16,
        };

        assert!(config.validate().is_err());
    }
}
