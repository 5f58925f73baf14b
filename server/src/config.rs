//! Run configuration loaded from the benchmark's JSON config file.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One benchmark run's settings.
///
/// Only `num_threads` is mandatory; everything else has a default so a
/// minimal config file stays minimal.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Number of shards, and therefore worker threads. Fixed for the run.
    pub num_threads: usize,
    /// Name of the partitioning/update algorithm under measurement,
    /// recorded verbatim in the exported label.
    #[serde(default = "default_algorithm_name")]
    pub algorithm_name: String,
    /// Milliseconds between quest rotations on each shard.
    #[serde(default = "default_quest_between_ms")]
    pub quest_between_ms: u64,
    /// Tracker window size; zero or negative selects the raw recorder.
    #[serde(default)]
    pub metrics_window: i64,
    #[serde(default = "default_map_width")]
    pub map_width: f32,
    #[serde(default = "default_map_height")]
    pub map_height: f32,
    /// Fraction of map cells generated as impassable terrain.
    #[serde(default = "default_blocked_ratio")]
    pub blocked_ratio: f32,
    /// Connected-player cap enforced at the transport.
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    /// Seed for world generation and per-shard quest rotation.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_algorithm_name() -> String {
    "static".to_string()
}

fn default_quest_between_ms() -> u64 {
    2000
}

fn default_map_width() -> f32 {
    shared::DEFAULT_WORLD_WIDTH
}

fn default_map_height() -> f32 {
    shared::DEFAULT_WORLD_HEIGHT
}

fn default_blocked_ratio() -> f32 {
    0.05
}

fn default_max_players() -> usize {
    1024
}

fn default_seed() -> u64 {
    42
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::Invalid(
                "num_threads must be at least 1".to_string(),
            ));
        }
        if self.map_width <= 0.0 || self.map_height <= 0.0 {
            return Err(ConfigError::Invalid(
                "map dimensions must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.blocked_ratio) {
            return Err(ConfigError::Invalid(
                "blocked_ratio must be in [0, 1)".to_string(),
            ));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid(
                "max_players must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Quest column of the exported label. Rotation intervals of a
    /// thousand seconds or more count as quests being switched off.
    pub fn quest_setting(&self) -> &'static str {
        if self.quest_between_ms / 1000 >= 1000 {
            "noquest"
        } else {
            "quest"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ServerConfig {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(r#"{"num_threads": 4}"#);

        assert_eq!(config.num_threads, 4);
        assert_eq!(config.algorithm_name, "static");
        assert_eq!(config.quest_between_ms, 2000);
        assert_eq!(config.metrics_window, 0);
        assert_eq!(config.map_width, shared::DEFAULT_WORLD_WIDTH);
        assert_eq!(config.map_height, shared::DEFAULT_WORLD_HEIGHT);
        assert_eq!(config.max_players, 1024);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config_overrides() {
        let config = parse(
            r#"{
                "num_threads": 8,
                "algorithm_name": "spread",
                "quest_between_ms": 500,
                "metrics_window": 16,
                "map_width": 1600.0,
                "map_height": 1200.0,
                "blocked_ratio": 0.2,
                "max_players": 4096,
                "seed": 7
            }"#,
        );

        assert_eq!(config.num_threads, 8);
        assert_eq!(config.algorithm_name, "spread");
        assert_eq!(config.metrics_window, 16);
        assert_eq!(config.max_players, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = parse(r#"{"num_threads": 0}"#);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_blocked_ratio_rejected() {
        let config = parse(r#"{"num_threads": 2, "blocked_ratio": 1.0}"#);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_num_threads_is_a_parse_error() {
        let result: Result<ServerConfig, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_quest_setting_threshold() {
        let quest = parse(r#"{"num_threads": 1, "quest_between_ms": 2000}"#);
        assert_eq!(quest.quest_setting(), "quest");

        let noquest = parse(r#"{"num_threads": 1, "quest_between_ms": 1000000}"#);
        assert_eq!(noquest.quest_setting(), "noquest");

        let boundary = parse(r#"{"num_threads": 1, "quest_between_ms": 999999}"#);
        assert_eq!(boundary.quest_setting(), "quest");
    }

    #[test]
    fn test_load_reports_missing_file() {
        let result = ServerConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
