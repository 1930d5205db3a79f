// src/config.rs
//! Configuration: tracked file location and dispatch latency

use crate::error::{ParserError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Latency used when the configuration has none (milliseconds)
pub const DEFAULT_LATENCY_MS: i64 = 1000;

pub const DEFAULT_NMEA_DIR: &str = "/media/internal/location";
pub const DEFAULT_NMEA_FILE: &str = "gps.nmea";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockInfo {
    #[serde(rename = "LATENCY", default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsConfig {
    #[serde(default = "default_nmea_dir")]
    pub nmea_dir: PathBuf,
    #[serde(default = "default_nmea_file")]
    pub nmea_file: String,
    #[serde(rename = "GPS_MOCK_INFO", default, skip_serializing_if = "Option::is_none")]
    pub mock_info: Option<MockInfo>,
}

fn default_nmea_dir() -> PathBuf {
    PathBuf::from(DEFAULT_NMEA_DIR)
}

fn default_nmea_file() -> String {
    DEFAULT_NMEA_FILE.to_string()
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            nmea_dir: default_nmea_dir(),
            nmea_file: default_nmea_file(),
            mock_info: None,
        }
    }
}

impl GpsConfig {
    /// Load configuration from a JSON file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ParserError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ParserError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ParserError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|e| ParserError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Full path of the tracked NMEA file
    pub fn nmea_path(&self) -> PathBuf {
        self.nmea_dir.join(&self.nmea_file)
    }

    /// Update the configured latency
    pub fn update_latency(&mut self, latency_ms: i64) {
        self.mock_info = Some(MockInfo {
            latency: Some(latency_ms),
        });
    }
}

/// Key-value source consulted for `LATENCY` at every session start
pub trait ConfigSource: Send + Sync {
    /// `Ok(None)` when the key is absent, `Err` when the source itself is missing
    fn load_latency(&self) -> Result<Option<i64>>;
}

impl ConfigSource for GpsConfig {
    fn load_latency(&self) -> Result<Option<i64>> {
        Ok(self.mock_info.as_ref().and_then(|info| info.latency))
    }
}

/// Re-reads a JSON config file each time the latency is requested
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for ConfigFile {
    fn load_latency(&self) -> Result<Option<i64>> {
        if !self.path.exists() {
            return Err(ParserError::Config(format!(
                "config file not available: {}",
                self.path.display()
            )));
        }
        GpsConfig::load_from(&self.path)?.load_latency()
    }
}

/// Dispatch interval for a session: half the configured latency
pub fn resolve_interval(source: &dyn ConfigSource) -> Duration {
    let latency = match source.load_latency() {
        Ok(Some(latency)) if latency > 0 => latency,
        Ok(_) => {
            debug!("config latency not available, default latency: {}", DEFAULT_LATENCY_MS);
            DEFAULT_LATENCY_MS
        }
        Err(e) => {
            warn!("{}; using default latency {}", e, DEFAULT_LATENCY_MS);
            DEFAULT_LATENCY_MS
        }
    };

    Duration::from_millis((latency / 2) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GpsConfig::default();
        assert_eq!(config.nmea_path(), PathBuf::from("/media/internal/location/gps.nmea"));
        assert_eq!(config.load_latency().unwrap(), None);
    }

    #[test]
    fn test_parse_latency_section() {
        let json = r#"{"nmea_dir":"/tmp","GPS_MOCK_INFO":{"LATENCY":300}}"#;
        let config: GpsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.nmea_file, DEFAULT_NMEA_FILE);
        assert_eq!(config.load_latency().unwrap(), Some(300));
        assert_eq!(resolve_interval(&config), Duration::from_millis(150));
    }

    #[test]
    fn test_zero_latency_falls_back() {
        let mut config = GpsConfig::default();
        config.update_latency(0);
        assert_eq!(resolve_interval(&config), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_config_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let source = ConfigFile::new(dir.path().join("missing.json"));
        assert!(source.load_latency().is_err());
        assert_eq!(resolve_interval(&source), Duration::from_millis(500));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = GpsConfig::default();
        config.update_latency(80);
        config.save_to(&path).unwrap();

        assert_eq!(GpsConfig::load_from(&path).unwrap(), config);
        assert_eq!(resolve_interval(&ConfigFile::new(&path)), Duration::from_millis(40));
    }
}
