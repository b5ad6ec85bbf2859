use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for the heimdall daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input source configuration
    pub input: InputConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Aggregation configuration
    pub aggregation: AggregationConfig,
    /// Alerting configuration
    pub alerts: AlertConfig,
    /// Output configuration
    pub output: OutputConfig,
}

/// Input source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path to the access log to tail
    pub access_log: PathBuf,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Seconds between report regenerations
    pub interval_seconds: u64,
    /// Number of classified events to buffer before a batch insert
    pub flush_batch_size: usize,
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Master switch for alert dispatch
    pub enabled: bool,
    /// Minimum severity (1-10) to dispatch
    pub min_severity: u8,
    /// Report counters that trigger an alert when exceeded
    pub thresholds: AlertThresholds,
    /// Slack webhook configuration
    pub slack: Option<SlackConfig>,
    /// Generic webhook configurations
    pub webhooks: Vec<WebhookConfig>,
}

/// Report-counter thresholds for abuse alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Maximum login POSTs on record before alerting
    pub max_login_attempts: i64,
    /// Maximum 4xx responses on record before alerting
    pub max_client_errors: i64,
}

/// Slack webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub channel: String,
    pub username: Option<String>,
}

/// Generic webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Name used in logs when dispatch fails
    pub name: String,
    pub url: String,
    /// HTTP method, "POST" if unset
    pub method: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl", or "console"
    pub format: String,
    /// Output file path (if format is not "console")
    pub file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: InputConfig {
                access_log: PathBuf::from("/var/log/nginx/access.log"),
            },
            database: DatabaseConfig {
                path: PathBuf::from("heimdall.db"),
            },
            aggregation: AggregationConfig {
                interval_seconds: 300,
                flush_batch_size: 100,
            },
            alerts: AlertConfig {
                enabled: false,
                min_severity: 7,
                thresholds: AlertThresholds {
                    max_login_attempts: 20,
                    max_client_errors: 50,
                },
                slack: None,
                webhooks: Vec::new(),
            },
            output: OutputConfig {
                format: "jsonl".to_string(),
                file_path: Some(PathBuf::from("alerts.jsonl")),
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed.input.access_log, config.input.access_log);
        assert_eq!(parsed.aggregation.interval_seconds, 300);
        assert_eq!(parsed.alerts.thresholds.max_login_attempts, 20);
        assert!(parsed.alerts.slack.is_none());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.alerts.enabled = true;
        config.alerts.slack = Some(SlackConfig {
            webhook_url: "https://hooks.slack.com/services/T000/B000/XXX".to_string(),
            channel: "#security".to_string(),
            username: None,
        });
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.alerts.enabled);
        assert_eq!(loaded.alerts.slack.unwrap().channel, "#security");
    }
}
