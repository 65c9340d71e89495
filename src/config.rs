use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extractor::DEFAULT_MARKER;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Identifier prefix the extractor anchors on
    #[serde(default = "default_marker")]
    pub marker: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where the TUI writes the summary report
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("route-verifier.db")
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_report_path() -> PathBuf {
    PathBuf::from("route-report.txt")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            marker: default_marker(),
            log_dir: default_log_dir(),
            log_level: default_log_level(),
            report_path: default_report_path(),
        }
    }
}

impl Config {
    /// No path or a missing file gives the defaults; a file that exists must parse
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml("marker = \"AMZ\"\nlog_level = \"debug\"").unwrap();

        assert_eq!(config.marker, "AMZ");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.database_path, PathBuf::from("route-verifier.db"));
        assert_eq!(config.report_path, PathBuf::from("route-report.txt"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load(Some(Path::new("/nonexistent/route-verifier.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_bad_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "marker = [").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }
}
