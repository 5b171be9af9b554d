//! Configuration file support for RUDP CLI tools

use rudp::protocol::pending::{DEFAULT_MAX_RETRIES, DEFAULT_RETRANSMIT_INTERVAL};
use rudp::protocol::{DEFAULT_BUNDLE_SIZE, DEFAULT_LOSS_PROBABILITY, DEFAULT_WINDOW_CAPACITY};
use rudp::sender::DEFAULT_BUNDLE_INTERVAL;
use rudp::{ReceiverOptions, SenderOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 9999;

/// Sender configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Receiver address
    #[serde(default = "default_server")]
    pub server: SocketAddr,
    /// Messages per bundle
    #[serde(default = "default_bundle_size")]
    pub bundle_size: usize,
    /// Retransmission interval in milliseconds
    #[serde(default = "default_retransmit_interval_ms")]
    pub retransmit_interval_ms: u64,
    /// Retransmissions before a message is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between bundles in milliseconds
    #[serde(default = "default_bundle_interval_ms")]
    pub bundle_interval_ms: u64,
    /// How long to wait for outstanding acks before exiting, in seconds
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

fn default_server() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT))
}

fn default_bundle_size() -> usize {
    DEFAULT_BUNDLE_SIZE
}

fn default_retransmit_interval_ms() -> u64 {
    DEFAULT_RETRANSMIT_INTERVAL.as_millis() as u64
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_bundle_interval_ms() -> u64 {
    DEFAULT_BUNDLE_INTERVAL.as_millis() as u64
}

fn default_ack_timeout_secs() -> u64 {
    8
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            server: default_server(),
            bundle_size: default_bundle_size(),
            retransmit_interval_ms: default_retransmit_interval_ms(),
            max_retries: default_max_retries(),
            bundle_interval_ms: default_bundle_interval_ms(),
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

/// Receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Probability that a bundled message is discarded on arrival
    #[serde(default = "default_loss_probability")]
    pub loss_probability: f64,
    /// Loss simulator seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Reorder window capacity per sender
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Statistics interval in seconds, 0 disables periodic reports
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

fn default_loss_probability() -> f64 {
    DEFAULT_LOSS_PROBABILITY
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

fn default_stats_interval() -> u64 {
    10
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            listen: default_listen(),
            loss_probability: default_loss_probability(),
            seed: None,
            window_capacity: default_window_capacity(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

/// Combined configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sender configuration
    pub sender: Option<SenderConfig>,
    /// Receiver configuration
    pub receiver: Option<ReceiverConfig>,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Create example sender configuration
    pub fn example_sender() -> Self {
        Config {
            sender: Some(SenderConfig::default()),
            receiver: None,
        }
    }

    /// Create example receiver configuration
    pub fn example_receiver() -> Self {
        Config {
            sender: None,
            receiver: Some(ReceiverConfig {
                seed: Some(42),
                ..ReceiverConfig::default()
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(sender) = &self.sender {
            sender.validate()?;
        }
        if let Some(receiver) = &self.receiver {
            receiver.validate()?;
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_options()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("[sender] {}", e)))
    }

    /// Runtime options described by this configuration
    pub fn to_options(&self) -> SenderOptions {
        SenderOptions {
            bundle_size: self.bundle_size,
            retransmit_interval: Duration::from_millis(self.retransmit_interval_ms),
            max_retries: self.max_retries,
            bundle_interval: Duration::from_millis(self.bundle_interval_ms),
            ..SenderOptions::default()
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_options()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("[receiver] {}", e)))
    }

    /// Get statistics interval as Duration, `None` if disabled
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }

    /// Runtime options described by this configuration
    pub fn to_options(&self) -> ReceiverOptions {
        ReceiverOptions {
            loss_probability: self.loss_probability,
            seed: self.seed,
            window_capacity: self.window_capacity,
            stats_interval: self.stats_interval(),
            ..ReceiverOptions::default()
        }
    }
}
