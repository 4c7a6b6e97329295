use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::topic::SYSTEM_TIME_TOPIC;

// Default driver loop rate: 50 Hz
const DEFAULT_TICK_PERIOD_MS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Generate every topic from live state and record a log.
    #[default]
    Live,
    /// Replay flagged topics from a recorded log; nothing is written.
    Simulation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub mode: ExecutionMode,
    /// Directory for generated `log_<unix seconds>.csv` files.
    pub log_dir: PathBuf,
    /// Exact live log path, overriding `log_dir`.
    pub log_path: Option<PathBuf>,
    /// Log to replay in simulation mode.
    pub replay_log: Option<PathBuf>,
    /// Abort initialization when any hardware reports failure.
    pub strict_hardware_init: bool,
    pub tick_period_ms: u64,
    /// Peer receiving a copy of every live tick record.
    pub mirror_address: Option<SocketAddr>,
    pub system_time_topic: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Live,
            log_dir: PathBuf::from("."),
            log_path: None,
            replay_log: None,
            strict_hardware_init: true,
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            mirror_address: None,
            system_time_topic: SYSTEM_TIME_TOPIC.to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn live() -> Self {
        Self::default()
    }

    pub fn simulation(replay_log: impl Into<PathBuf>) -> Self {
        Self {
            mode: ExecutionMode::Simulation,
            replay_log: Some(replay_log.into()),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_error = |reason: String| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))
    }

    pub fn is_simulation(&self) -> bool {
        self.mode == ExecutionMode::Simulation
    }

    /// Path of the live log for a run started at `started_at` (Unix seconds).
    pub fn live_log_path(&self, started_at: f64) -> PathBuf {
        match &self.log_path {
            Some(path) => path.clone(),
            None => {
                let secs = started_at as u64;
                let mut path = self.log_dir.join(format!("log_{secs}.csv"));
                let mut run = 1;
                // several runs may start within the same second
                while path.exists() {
                    path = self.log_dir.join(format!("log_{secs}_{run}.csv"));
                    run += 1;
                }
                path
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.mode, ExecutionMode::Live);
        assert!(config.strict_hardware_init);
        assert_eq!(config.system_time_topic, "SystemTime");
        assert_eq!(config.tick_period_ms, 20);
        assert!(!config.is_simulation());
    }

    #[test]
    fn test_live_log_path() {
        let mut config = SchedulerConfig::live();
        config.log_dir = PathBuf::from("logs");
        assert_eq!(
            config.live_log_path(1687274057.65),
            PathBuf::from("logs/log_1687274057.csv")
        );

        config.log_path = Some(PathBuf::from("run.csv"));
        assert_eq!(config.live_log_path(1.0), PathBuf::from("run.csv"));
    }

    #[test]
    fn test_live_log_path_skips_existing_logs() {
        let dir = tempdir().unwrap();
        let mut config = SchedulerConfig::live();
        config.log_dir = dir.path().to_path_buf();

        fs::write(dir.path().join("log_500.csv"), "").unwrap();
        assert_eq!(config.live_log_path(500.2), dir.path().join("log_500_1.csv"));

        fs::write(dir.path().join("log_500_1.csv"), "").unwrap();
        assert_eq!(config.live_log_path(500.9), dir.path().join("log_500_2.csv"));
        assert_eq!(config.live_log_path(501.0), dir.path().join("log_501.csv"));
    }

    #[test]
    fn test_partial_json_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rosebus.json");
        let partial = serde_json::json!({
            "mode": "simulation",
            "replay_log": "log_1.csv",
            "mirror_address": "127.0.0.1:12345",
        });
        fs::write(&path, partial.to_string()).unwrap();

        let config = SchedulerConfig::from_json_file(&path).unwrap();
        assert!(config.is_simulation());
        assert_eq!(config.replay_log, Some(PathBuf::from("log_1.csv")));
        assert_eq!(config.mirror_address, Some("127.0.0.1:12345".parse().unwrap()));
        assert!(config.strict_hardware_init);
    }

    #[test]
    fn test_malformed_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let err = SchedulerConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigFile { .. }));
        assert!(SchedulerConfig::from_json_file(dir.path().join("absent.json")).is_err());
    }
}
