// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Core configuration with validation.
//
// Supports both programmatic and file-based (TOML) configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on delivery worker threads.
pub const MAX_DELIVERY_WORKERS: usize = 64;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the exchange/observation core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Number of threads executing delivery tasks (default: 2).
    pub delivery_workers: usize,
    /// Bounded capacity of the delivery task queue (default: 1024).
    pub delivery_queue_capacity: usize,
    /// Answer expected confirmable responses with an empty ACK (default: true).
    pub ack_confirmable_responses: bool,
    /// Default reliability of update notifications for resources that do not
    /// override it per endpoint (default: false, i.e. NON).
    pub confirmable_notifications_default: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            delivery_workers: 2,
            delivery_queue_capacity: 1024,
            ack_confirmable_responses: true,
            confirmable_notifications_default: false,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration. Returns Ok(()) if valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery_workers == 0 {
            return Err(ConfigError::Invalid(
                "delivery_workers must be > 0".into(),
            ));
        }
        if self.delivery_workers > MAX_DELIVERY_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "delivery_workers must be <= {}",
                MAX_DELIVERY_WORKERS
            )));
        }
        if self.delivery_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "delivery_queue_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}
