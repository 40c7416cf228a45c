//! Server configuration.

use std::time::Duration;

use liftoff_core::{AccessPolicy, Threshold};
use liftoff_settings::LaunchSettings;

use crate::errors::ServerError;

/// Configuration for the launch server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds (close after this long without a pong).
    pub heartbeat_timeout_secs: u64,
    /// Max inbound command frame size in bytes.
    pub max_message_size: usize,
    /// Per-peer outbound queue depth.
    pub send_queue_capacity: usize,
    /// Distinct participants needed to launch.
    pub threshold: Threshold,
    /// Longest accepted participant ID, in bytes.
    pub max_participant_id_len: usize,
    /// Gating of `reset` / `reveal_now`.
    pub access: AccessPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 4096,
            send_queue_capacity: 64,
            threshold: Threshold::default(),
            max_participant_id_len: liftoff_core::ids::DEFAULT_MAX_PARTICIPANT_ID_LEN,
            access: AccessPolicy::Open,
        }
    }
}

impl ServerConfig {
    /// Build from validated settings.
    pub fn from_settings(settings: &LaunchSettings) -> Result<Self, ServerError> {
        let threshold = Threshold::new(settings.session.threshold).ok_or_else(|| {
            ServerError::InvalidConfig("session threshold must be at least 1".into())
        })?;
        Ok(Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.server.heartbeat_timeout_secs,
            max_message_size: settings.server.max_message_size,
            send_queue_capacity: settings.server.send_queue_capacity.max(1),
            threshold,
            max_participant_id_len: settings.session.max_participant_id_len,
            access: AccessPolicy::from_token(settings.access.admin_token.as_deref()),
        })
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Heartbeat tick interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Heartbeat timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs.max(1))
    }
}
