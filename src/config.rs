//! Configuration file support
//!
//! Loads config from ~/.punchcard/config.toml. Resolution order is handled
//! in main: CLI args > env vars > config file > defaults.

use chrono::NaiveTime;
use serde::Deserialize;
use std::path::PathBuf;

use crate::domain;

/// Configuration for punchcard.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// SQLite database URL
    pub database_url: Option<String>,

    /// API key for the reasoning backend
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL
    pub api_base: Option<String>,

    /// Model name for the reasoning backend
    pub model: Option<String>,

    /// Punch-in cutoff, HH:MM (default 09:30)
    pub late_threshold: Option<String>,

    /// Max operation invocations per turn
    pub max_steps: Option<usize>,

    /// Remembered turns per session
    pub history_limit: Option<usize>,
}

impl Config {
    /// Load config from ~/.punchcard/config.toml
    pub fn load() -> Self {
        let path = config_path();

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Get a value with fallback to environment variable
    pub fn get_or_env(&self, field: Option<&String>, env_var: &str) -> Option<String> {
        field.cloned().or_else(|| std::env::var(env_var).ok())
    }

    /// The punch-in cutoff, falling back to 09:30 on absence or a value
    /// that does not parse as HH:MM.
    pub fn late_threshold(&self) -> NaiveTime {
        self.late_threshold
            .as_deref()
            .and_then(domain::parse_punch_time)
            .unwrap_or_else(domain::default_late_threshold)
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".punchcard")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.late_threshold(), domain::default_late_threshold());
    }

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.to_string_lossy().contains(".punchcard"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn late_threshold_parses_from_file_value() {
        let config: Config = toml::from_str("late_threshold = \"10:00\"").unwrap();
        assert_eq!(
            config.late_threshold(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
    }

    #[test]
    fn bad_threshold_falls_back_to_default() {
        let config: Config = toml::from_str("late_threshold = \"25:99\"").unwrap();
        assert_eq!(config.late_threshold(), domain::default_late_threshold());
    }
}
