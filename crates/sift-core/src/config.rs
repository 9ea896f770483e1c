//! Configuration management for Sift.
//!
//! This module provides configuration loading, saving, and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.

use crate::computer::DEFAULT_PARALLEL_THRESHOLD;
use crate::error::{Result, SiftError};
use crate::types::Column;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for Sift.
///
/// ## Example Configuration File (sift.toml)
///
/// ```toml
/// [general]
/// log_level = "info"
///
/// [grouping]
/// show_summary = true
/// multi_value_separator = ";"
///
/// [[grouping.columns]]
/// field = "artist"
/// name = "Artist"
///
/// [performance]
/// parallel_threshold = 2000
/// coalesce_updates = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Grouping columns and summary
    pub grouping: GroupingConfig,

    /// Performance tuning
    pub performance: PerformanceConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
        }
    }
}

/// Grouping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Active grouping columns, in order
    pub columns: Vec<Column>,

    /// Show the "All (...)" summary row
    pub show_summary: bool,

    /// Delimiter splitting one tag into several values (empty = never split)
    pub multi_value_separator: String,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        GroupingConfig {
            columns: vec![Column::new("artist", "Artist")],
            show_summary: true,
            multi_value_separator: ";".to_string(),
        }
    }
}

/// Performance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Item count above which key extraction runs in parallel
    pub parallel_threshold: usize,

    /// Merge queued incremental requests instead of queueing each one
    pub coalesce_updates: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            coalesce_updates: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        for column in &config.grouping.columns {
            column.validate()?;
        }

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SiftError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "sift")
            .ok_or_else(|| SiftError::config("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("sift.toml"))
    }

    /// Parse a comma-separated column list (`artist,date=Year`).
    ///
    /// Blank entries are skipped; an empty list is valid and groups
    /// everything as "Unclassified".
    pub fn parse_columns(spec: &str) -> Result<Vec<Column>> {
        spec.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Column::parse)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.grouping.show_summary);
        assert_eq!(config.grouping.columns, vec![Column::new("artist", "Artist")]);
        assert_eq!(config.performance.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("test.toml");

        let mut config = Config::default();
        config.grouping.columns = vec![
            Column::new("genre", "Genre"),
            Column::new("date", "Year"),
        ];
        config.grouping.show_summary = false;
        config.performance.coalesce_updates = false;

        config.save_to(&config_path).unwrap();
        let loaded = Config::load_from(&config_path).unwrap();

        assert_eq!(loaded.grouping.columns, config.grouping.columns);
        assert!(!loaded.grouping.show_summary);
        assert!(!loaded.performance.coalesce_updates);
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert!(config.grouping.show_summary);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "[performance]\nparallel_threshold = 10\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.performance.parallel_threshold, 10);
        assert!(config.performance.coalesce_updates);
        assert_eq!(config.grouping.multi_value_separator, ";");
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        fs::write(&config_path, "[grouping\n").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(matches!(err, SiftError::ConfigError { .. }));
    }

    #[test]
    fn test_parse_columns() {
        let columns = Config::parse_columns("artist, date=Year,,").unwrap();
        assert_eq!(
            columns,
            vec![Column::new("artist", "Artist"), Column::new("date", "Year")]
        );
        assert!(Config::parse_columns("").unwrap().is_empty());
        assert!(Config::parse_columns("artist, =Year").is_err());
    }

    #[test]
    fn test_empty_column_field_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sift.toml");
        fs::write(
            &config_path,
            "[[grouping.columns]]\nfield = \"\"\nname = \"Nothing\"\n",
        )
        .unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(matches!(err, SiftError::ConfigError { .. }));
    }
}
