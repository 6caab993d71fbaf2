//! Configuration loading for the crash supervisor.
//!
//! Loads a TOML file with per-section defaults. All sections use
//! `#[serde(default)]` so a minimal or empty config file is valid. Unknown
//! keys are rejected so a misspelled or foreign setting cannot silently
//! disable alerting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::notify::DEFAULT_DEADLINE;
use crate::throttle::DEFAULT_RECORD_FILE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Alert throttling and delivery timing.
    #[serde(default)]
    pub report: ReportConfig,

    /// Optional file logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Notification channels that receive crash alerts.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Alert throttling and delivery timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// File holding the timestamp of the last delivered alert.
    #[serde(default = "default_record_file")]
    pub record_file: PathBuf,

    /// Minimum seconds between alerts. Values below 60 are raised to 60.
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: u64,

    /// Seconds allowed for all channels to finish sending.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            record_file: default_record_file(),
            throttle_secs: default_throttle_secs(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl ReportConfig {
    /// Configured throttle interval (before clamping).
    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }

    /// Configured fan-out deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// File logging settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Directory for daily-rotated JSON logs. Console-only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// One outbound alert sink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// DingTalk custom-robot webhook.
    #[serde(rename = "dingtalk")]
    DingTalk {
        /// Webhook URL including the access token.
        webhook: String,
    },
}

impl Config {
    /// Validate that configuration values are within sane bounds.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=60).contains(&self.report.deadline_secs),
            "report.deadline_secs must be in [1, 60]"
        );
        anyhow::ensure!(
            !self.report.record_file.as_os_str().is_empty(),
            "report.record_file must not be empty"
        );
        for (i, channel) in self.channels.iter().enumerate() {
            match channel {
                ChannelConfig::DingTalk { webhook } => {
                    let url = url::Url::parse(webhook)
                        .with_context(|| format!("channels[{i}].webhook is not a valid URL"))?;
                    anyhow::ensure!(
                        url.scheme() == "http" || url.scheme() == "https",
                        "channels[{i}].webhook must be an http(s) URL"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

// Default value functions for serde.

fn default_record_file() -> PathBuf {
    PathBuf::from(DEFAULT_RECORD_FILE)
}

fn default_throttle_secs() -> u64 {
    60
}

fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE.as_secs()
}
