//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Configuration for one account's sync session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local account id; scopes are keyed by it.
    pub account_id: u64,
    /// Server URL, e.g. `https://mail.example.com`.
    pub server_url: String,
    /// User name sent with every command.
    pub user: String,
    /// Device id (unique per installation).
    pub device_id: String,
    /// Device type reported to the server.
    pub device_type: String,
    /// Protocol version header.
    pub protocol_version: String,
    /// Maximum number of changes per sync response.
    pub window_size: u32,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Extra time allowed on top of the heartbeat for a ping.
    pub ping_timeout_margin_secs: u64,
    /// Mail bodies are truncated beyond this many bytes.
    pub mail_body_truncation: u32,
    /// Heartbeat negotiation bounds.
    pub heartbeat: HeartbeatConfig,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(account_id: u64, server_url: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            account_id,
            server_url: server_url.into(),
            user: user.into(),
            device_id: Uuid::new_v4().simple().to_string(),
            device_type: "easync".to_string(),
            protocol_version: "14.1".to_string(),
            window_size: 100,
            request_timeout_secs: 60,
            ping_timeout_margin_secs: 30,
            mail_body_truncation: 32 * 1024,
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Sets the device id.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Sets the device type.
    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    /// Sets the protocol version.
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Sets the sync window size.
    pub fn with_window_size(mut self, size: u32) -> Self {
        self.window_size = size;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the heartbeat configuration.
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout for a ping with the given heartbeat.
    pub fn ping_timeout(&self, heartbeat_secs: u32) -> Duration {
        Duration::from_secs(u64::from(heartbeat_secs) + self.ping_timeout_margin_secs)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` for an unparsable URL, an empty user or
    /// device id, a zero window, or inconsistent heartbeat bounds.
    pub fn validate(&self) -> SyncResult<()> {
        Url::parse(&self.server_url)
            .map_err(|e| SyncError::Config(format!("invalid server URL: {e}")))?;
        if self.user.is_empty() {
            return Err(SyncError::Config("user is empty".into()));
        }
        if self.device_id.is_empty() {
            return Err(SyncError::Config("device id is empty".into()));
        }
        if self.window_size == 0 {
            return Err(SyncError::Config("window size must be positive".into()));
        }
        self.heartbeat.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(0, "", "")
    }
}

/// Heartbeat bounds for long-poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Smallest heartbeat the client will ask for, in seconds.
    pub min_secs: u32,
    /// Largest heartbeat the client will ask for, in seconds.
    pub max_secs: u32,
    /// Heartbeat of the first ping.
    pub initial_secs: u32,
    /// Growth step after a ping expires without changes.
    pub increment_secs: u32,
}

impl HeartbeatConfig {
    fn validate(&self) -> SyncResult<()> {
        if self.min_secs == 0 || self.min_secs > self.max_secs {
            return Err(SyncError::Config(format!(
                "heartbeat bounds {}..{} are invalid",
                self.min_secs, self.max_secs
            )));
        }
        if !(self.min_secs..=self.max_secs).contains(&self.initial_secs) {
            return Err(SyncError::Config(format!(
                "initial heartbeat {} is outside {}..{}",
                self.initial_secs, self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min_secs: 60,
            max_secs: 1680,
            initial_secs: 480,
            increment_secs: 180,
        }
    }
}
