//! Session configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Kanban Sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a notification stays visible, in milliseconds
    pub notification_ttl_ms: u64,
    /// Buffer size of the cache event channel
    pub event_capacity: usize,
    /// Push success notifications for confirmed creates/edits/deletes
    pub success_notifications: bool,
    /// Default `tracing` filter directive
    pub log_filter: String,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With notification display duration
    #[inline]
    #[must_use]
    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With cache event buffer size
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Enable or disable success notifications
    #[inline]
    #[must_use]
    pub fn with_success_notifications(mut self, enabled: bool) -> Self {
        self.success_notifications = enabled;
        self
    }

    /// Notification display duration
    #[inline]
    #[must_use]
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` for a zero TTL or a zero event buffer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "notification_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Syntax errors or out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Unreadable file, syntax errors or out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            notification_ttl_ms: 4_000,
            event_capacity: 256,
            success_notifications: true,
            log_filter: "info".to_string(),
        }
    }
}
