//! Errors raised while turning a peer frame into a [`Command`](crate::Command).

use thiserror::Error;

/// Why a peer frame was rejected. None of these mutate the session.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Payload was not valid JSON or did not match the command shape.
    #[error("invalid command payload: {0}")]
    InvalidJson(String),
    /// The `type` field named no known command.
    #[error("unknown command type: {0}")]
    UnknownType(String),
    /// `userId` was missing, blank or too long.
    #[error("invalid participant: {0}")]
    InvalidParticipant(String),
    /// A privileged command arrived without a valid admin token.
    #[error("command `{0}` requires the admin token")]
    Unauthorized(&'static str),
    /// The frame exceeded the configured size limit.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Received frame size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl CommandError {
    /// Short classification string for logging/metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::UnknownType(_) => "unknown_type",
            Self::InvalidParticipant(_) => "invalid_participant",
            Self::Unauthorized(_) => "unauthorized",
            Self::FrameTooLarge { .. } => "frame_too_large",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            CommandError::UnknownType("launch".into()).to_string(),
            "unknown command type: launch"
        );
        assert_eq!(
            CommandError::Unauthorized("reset").to_string(),
            "command `reset` requires the admin token"
        );
    }

    #[test]
    fn reason_strings() {
        assert_eq!(CommandError::InvalidJson(String::new()).reason(), "invalid_json");
        assert_eq!(CommandError::UnknownType(String::new()).reason(), "unknown_type");
        assert_eq!(
            CommandError::InvalidParticipant(String::new()).reason(),
            "invalid_participant"
        );
        assert_eq!(CommandError::Unauthorized("reset").reason(), "unauthorized");
        assert_eq!(
            CommandError::FrameTooLarge { size: 10, limit: 5 }.reason(),
            "frame_too_large"
        );
    }
}
