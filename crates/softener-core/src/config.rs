//! Configuration types for the softener integration
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main integration configuration (one per configured device)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftenerConfig {
    /// Cloud account credentials
    pub credentials: Credentials,

    /// Device to coordinate; `None` selects the first device of the account
    #[serde(default)]
    pub device_id: Option<String>,

    /// Remote client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Refresh coordinator settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl SoftenerConfig {
    /// Create a configuration with defaults for everything but the credentials
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            device_id: None,
            client: ClientConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.credentials.validate()?;
        self.client.validate()?;
        self.coordinator.validate()?;

        if let Some(device_id) = &self.device_id {
            if device_id.trim().is_empty() {
                return Err(crate::Error::config("Device id cannot be empty"));
            }
        }

        Ok(())
    }
}

/// Cloud account credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Validate the credentials
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.username.is_empty() {
            return Err(crate::Error::config("Username cannot be empty"));
        }
        if self.password.is_empty() {
            return Err(crate::Error::config("Password cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientConfig {
    /// In-process simulated cloud account with a single device
    Simulated {
        /// Serial number of the simulated device
        #[serde(default = "default_sim_serial")]
        serial_number: String,
        /// Seconds between simulated push messages
        #[serde(default = "default_push_interval_secs")]
        push_interval_secs: u64,
    },

    /// Custom client
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ClientConfig {
    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ClientConfig::Simulated {
                serial_number,
                push_interval_secs,
            } => {
                if serial_number.is_empty() {
                    return Err(crate::Error::config(
                        "Simulated client serial number cannot be empty",
                    ));
                }
                if *push_interval_secs == 0 {
                    return Err(crate::Error::config(
                        "Simulated client push interval must be > 0",
                    ));
                }
                Ok(())
            }
            ClientConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom client factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom client config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the client type name used for registry lookups
    pub fn type_name(&self) -> &str {
        match self {
            ClientConfig::Simulated { .. } => "simulated",
            ClientConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::Simulated {
            serial_number: default_sim_serial(),
            push_interval_secs: default_push_interval_secs(),
        }
    }
}

fn default_sim_serial() -> String {
    "BS00000001".to_string()
}

fn default_push_interval_secs() -> u64 {
    30
}

/// Refresh coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Period of the scheduled refresh (in seconds)
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Upper bound for one whole scheduled refresh (in seconds)
    ///
    /// Individual network calls are bounded by the client; this only stops
    /// a stuck refresh from blocking the schedule.
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,

    /// How long unload waits for the push-channel task to finish (in seconds)
    #[serde(default = "default_teardown_timeout_secs")]
    pub teardown_timeout_secs: u64,

    /// Capacity of the update notification channel
    ///
    /// Slow listeners that fall further behind than this skip the oldest
    /// notifications; the snapshot itself is always current.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl CoordinatorConfig {
    /// Validate the coordinator configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.update_interval_secs == 0 {
            return Err(crate::Error::config("Update interval must be > 0"));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(crate::Error::config("Refresh timeout must be > 0"));
        }
        if self.teardown_timeout_secs == 0 {
            return Err(crate::Error::config("Teardown timeout must be > 0"));
        }
        if self.notification_capacity == 0 {
            return Err(crate::Error::config("Notification capacity must be > 0"));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_secs)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            teardown_timeout_secs: default_teardown_timeout_secs(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

fn default_update_interval_secs() -> u64 {
    360
}

fn default_refresh_timeout_secs() -> u64 {
    60
}

fn default_teardown_timeout_secs() -> u64 {
    10
}

fn default_notification_capacity() -> usize {
    64
}
