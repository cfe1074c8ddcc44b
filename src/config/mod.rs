//! Configuration Management
//!
//! Loading, validation, and atomic swapping of the pipeline
//! configuration. The tick loop reads one immutable snapshot per tick;
//! mutation from outside goes through [`ConfigHandle::swap`], which
//! validates first. An invalid snapshot is rejected whole and the
//! previous one stays active, so the core never observes a partially
//! valid configuration.
//!
//! Section structs live with the components that consume them; this
//! module composes them into the file-level [`Config`].

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::aim::AimConfig;
use crate::command::QueueConfig;
use crate::detect::DetectionConfig;
use crate::recoil::RecoilConfig;
use crate::target::selector::SelectionConfig;
use crate::tracker::PacingConfig;
use crate::trigger::TriggerConfig;

/// Configuration fault. Rejected at the load or swap boundary; the
/// pipeline keeps running on the previous snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed validation
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field
        field: String,
        /// What was wrong with it
        reason: String,
    },
}

impl ConfigError {
    /// Build an [`ConfigError::Invalid`] for a dotted field path.
    pub fn invalid(field: &str, reason: &str) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for rolling log files; `None` logs to stdout only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
        }
    }
}

/// File-level configuration: every pipeline section plus logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Detector section
    pub detection: DetectionConfig,
    /// Selector section
    pub selection: SelectionConfig,
    /// Motion-planning section
    pub aim: AimConfig,
    /// Trigger section
    pub trigger: TriggerConfig,
    /// Recoil-compensation section
    pub recoil: RecoilConfig,
    /// Command-queue section
    pub queue: QueueConfig,
    /// Tick-loop section
    pub pacing: PacingConfig,
    /// Logging section
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.selection.validate()?;
        self.aim.validate()?;
        self.trigger.validate()?;
        self.recoil.validate()?;
        self.queue.validate()?;
        self.pacing.validate()?;
        Ok(())
    }
}

/// Lock-protected handle to the active configuration snapshot.
///
/// Readers take a cheap `Arc` clone; writers swap the whole snapshot
/// after validation. A tick never observes a half-applied change.
pub struct ConfigHandle {
    current: RwLock<Arc<Config>>,
}

impl ConfigHandle {
    /// Wrap an initial configuration, validating it first.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<Config> {
        self.current.read().clone()
    }

    /// Replace the active snapshot. An invalid replacement is rejected
    /// and the current snapshot stays active.
    pub fn swap(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        *self.current.write() = Arc::new(config);
        info!("configuration snapshot swapped");
        Ok(())
    }
}
