//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may name only the fields it wants to change.

mod logging;
mod server;
mod session;

pub use logging::*;
pub use server::*;
pub use session::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 3001 },
///   "session": { "threshold": 10 },
///   "access": { "adminToken": "change-me" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchSettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Launch session settings.
    pub session: SessionSettings,
    /// Privileged command gating.
    pub access: AccessSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl LaunchSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.session.threshold == 0 {
            return Err(SettingsError::InvalidValue(
                "session.threshold must be at least 1".into(),
            ));
        }
        if self.session.max_participant_id_len == 0 {
            return Err(SettingsError::InvalidValue(
                "session.maxParticipantIdLen must be at least 1".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutSecs ({}) is shorter than the interval ({})",
                self.server.heartbeat_timeout_secs, self.server.heartbeat_interval_secs
            )));
        }
        Ok(())
    }
}
