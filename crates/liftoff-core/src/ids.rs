//! Identifier types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CommandError;

/// Default upper bound on a participant identifier, in bytes.
pub const DEFAULT_MAX_PARTICIPANT_ID_LEN: usize = 128;

/// Server-assigned identifier for one WebSocket connection.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh, time-ordered connection ID.
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Wrap an existing string without validation.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque identifier a peer chooses for itself when it clicks.
///
/// Always non-blank. Surrounding whitespace is trimmed so `"a"` and `" a "`
/// count as the same participant.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Validate against the default length limit.
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        Self::parse_with_limit(raw, DEFAULT_MAX_PARTICIPANT_ID_LEN)
    }

    /// Validate against an explicit length limit (in bytes, after trimming).
    pub fn parse_with_limit(raw: &str, max_len: usize) -> Result<Self, CommandError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CommandError::InvalidParticipant(
                "participant id must not be empty".into(),
            ));
        }
        if trimmed.len() > max_len {
            return Err(CommandError::InvalidParticipant(format!(
                "participant id exceeds {max_len} bytes"
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = CommandError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
