//! Peer → coordinator commands.
//!
//! Frames are JSON objects discriminated by `type`:
//!
//! ```json
//! {"type":"launch_click","userId":"user_k3j9x"}
//! {"type":"reset"}
//! {"type":"reveal_now","token":"…"}
//! ```

use serde_json::Value;

use crate::errors::CommandError;
use crate::ids::{DEFAULT_MAX_PARTICIPANT_ID_LEN, ParticipantId};

/// A validated peer command.
///
/// Parsed by hand from a `serde_json::Value` so each failure maps onto the
/// matching [`CommandError`] variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Register a launch click for `user_id`.
    LaunchClick {
        /// Participant making the click.
        user_id: ParticipantId,
    },
    /// Clear the session.
    Reset {
        /// Admin token, if the peer supplied one.
        token: Option<String>,
    },
    /// Mark the reveal as complete.
    RevealNow {
        /// Admin token, if the peer supplied one.
        token: Option<String>,
    },
}

impl Command {
    /// Parse a frame using the default participant ID limit.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        Self::parse_with_limit(text, DEFAULT_MAX_PARTICIPANT_ID_LEN)
    }

    /// Parse a frame, rejecting participant IDs longer than `max_id_len`.
    pub fn parse_with_limit(text: &str, max_id_len: usize) -> Result<Self, CommandError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CommandError::InvalidJson(e.to_string()))?;
        let Some(obj) = value.as_object() else {
            return Err(CommandError::InvalidJson("expected a JSON object".into()));
        };
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::InvalidJson("missing `type` field".into()))?;

        match kind {
            "launch_click" => {
                let raw = obj
                    .get("userId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CommandError::InvalidParticipant("missing `userId` field".into())
                    })?;
                Ok(Self::LaunchClick {
                    user_id: ParticipantId::parse_with_limit(raw, max_id_len)?,
                })
            }
            "reset" => Ok(Self::Reset {
                token: token_field(&value),
            }),
            "reveal_now" => Ok(Self::RevealNow {
                token: token_field(&value),
            }),
            other => Err(CommandError::UnknownType(other.to_owned())),
        }
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LaunchClick { .. } => "launch_click",
            Self::Reset { .. } => "reset",
            Self::RevealNow { .. } => "reveal_now",
        }
    }

    /// Whether the command can be gated behind an admin token.
    pub fn is_privileged(&self) -> bool {
        !matches!(self, Self::LaunchClick { .. })
    }

    /// Token carried by a privileged command.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::LaunchClick { .. } => None,
            Self::Reset { token } | Self::RevealNow { token } => token.as_deref(),
        }
    }
}

fn token_field(value: &Value) -> Option<String> {
    value
        .get("token")
        .and_then(Value::as_str)
        .map(str::to_owned)
}
