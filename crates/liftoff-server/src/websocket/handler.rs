//! Inbound frame handling: size check, parse, then access policy.

use liftoff_core::{AccessPolicy, Command, CommandError, ConnectionId};
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::metrics::COMMANDS_REJECTED_TOTAL;

/// Payload of an inbound data frame.
#[derive(Clone, Copy, Debug)]
pub enum Frame<'a> {
    /// Text frame, already valid UTF-8.
    Text(&'a str),
    /// Binary frame that should hold UTF-8 JSON.
    Binary(&'a [u8]),
}

impl Frame<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }
}

/// Limits and policy applied to every inbound frame.
#[derive(Clone, Debug)]
pub struct CommandGate {
    /// Who may reset or reveal.
    pub policy: AccessPolicy,
    /// Longest accepted participant ID, in bytes.
    pub max_participant_id_len: usize,
    /// Largest accepted frame, in bytes.
    pub max_message_size: usize,
}

impl CommandGate {
    /// Turn a raw frame into an authorized command.
    pub fn check(&self, frame: Frame<'_>) -> Result<Command, CommandError> {
        if frame.len() > self.max_message_size {
            return Err(CommandError::FrameTooLarge {
                size: frame.len(),
                limit: self.max_message_size,
            });
        }
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(data) => std::str::from_utf8(data).map_err(|_| {
                CommandError::InvalidJson("binary frame is not valid UTF-8".into())
            })?,
        };
        let command = Command::parse_with_limit(text, self.max_participant_id_len)?;
        self.policy.authorize(&command)?;
        Ok(command)
    }
}

/// Handle an incoming frame from `conn_id`.
///
/// Rejections are logged at `warn` and counted by reason; the caller keeps
/// the connection open and sends nothing back.
#[instrument(skip_all, fields(conn_id = %conn_id, command))]
pub fn handle_message(
    conn_id: &ConnectionId,
    frame: Frame<'_>,
    gate: &CommandGate,
) -> Result<Command, CommandError> {
    match gate.check(frame) {
        Ok(command) => {
            let _ = tracing::Span::current().record("command", command.name());
            debug!(command = command.name(), "dispatching command");
            Ok(command)
        }
        Err(err) => {
            warn!(reason = err.reason(), error = %err, "rejected command");
            counter!(COMMANDS_REJECTED_TOTAL, "reason" => err.reason()).increment(1);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use liftoff_logging::capture_logs;
    use tracing::Level;

    fn gate(policy: AccessPolicy) -> CommandGate {
        CommandGate {
            policy,
            max_participant_id_len: 16,
            max_message_size: 128,
        }
    }

    fn conn() -> ConnectionId {
        ConnectionId::from_raw("conn_test")
    }

    #[test]
    fn accepts_click() {
        let cmd = handle_message(
            &conn(),
            Frame::Text(r#"{"type":"launch_click","userId":"user_abc"}"#),
            &gate(AccessPolicy::Open),
        )
        .unwrap();
        assert_eq!(cmd.name(), "launch_click");
    }

    #[test]
    fn open_policy_accepts_reset_without_token() {
        let cmd = handle_message(&conn(), Frame::Text(r#"{"type":"reset"}"#), &gate(AccessPolicy::Open));
        assert_matches!(cmd, Ok(Command::Reset { .. }));
    }

    #[test]
    fn token_policy_rejects_reset_without_token() {
        let (logs, _guard) = capture_logs();
        let err = handle_message(
            &conn(),
            Frame::Text(r#"{"type":"reset"}"#),
            &gate(AccessPolicy::Token("s3cret".into())),
        )
        .unwrap_err();
        assert_eq!(err, CommandError::Unauthorized("reset"));
        assert!(logs.has_event(Level::WARN, "rejected command"));
    }

    #[test]
    fn token_policy_accepts_matching_token() {
        let cmd = handle_message(
            &conn(),
            Frame::Text(r#"{"type":"reveal_now","token":"s3cret"}"#),
            &gate(AccessPolicy::Token("s3cret".into())),
        );
        assert_matches!(cmd, Ok(Command::RevealNow { .. }));
    }

    #[test]
    fn oversize_frame_rejected_before_parse() {
        let big = format!(r#"{{"type":"launch_click","userId":"{}"}}"#, "x".repeat(200));
        let err = handle_message(&conn(), Frame::Text(&big), &gate(AccessPolicy::Open)).unwrap_err();
        assert_matches!(err, CommandError::FrameTooLarge { limit: 128, .. });
    }

    #[test]
    fn long_participant_rejected() {
        let err = handle_message(
            &conn(),
            Frame::Text(r#"{"type":"launch_click","userId":"abcdefghijklmnopqrstuvwxyz"}"#),
            &gate(AccessPolicy::Open),
        )
        .unwrap_err();
        assert_matches!(err, CommandError::InvalidParticipant(_));
    }

    #[test]
    fn malformed_frames_logged_with_reason() {
        let (logs, _guard) = capture_logs();
        let g = gate(AccessPolicy::Open);
        assert!(handle_message(&conn(), Frame::Text("not json"), &g).is_err());
        assert!(handle_message(&conn(), Frame::Text(r#"{"type":"launch"}"#), &g).is_err());

        assert_eq!(
            logs.field_values(Level::WARN, "reason"),
            ["invalid_json", "unknown_type"]
        );
    }

    #[test]
    fn binary_utf8_frame_accepted() {
        let cmd = handle_message(
            &conn(),
            Frame::Binary(br#"{"type":"launch_click","userId":"bin"}"#),
            &gate(AccessPolicy::Open),
        );
        assert_matches!(cmd, Ok(Command::LaunchClick { user_id }) if user_id.as_str() == "bin");
    }

    #[test]
    fn binary_frame_with_invalid_utf8_rejected() {
        let (logs, _guard) = capture_logs();
        let g = gate(AccessPolicy::Open);
        for byte in [0xff_u8, 0xfe] {
            let mut frame = br#"{"type":"launch_click","userId":""#.to_vec();
            frame.push(byte);
            frame.extend_from_slice(br#""}"#);
            let err = handle_message(&conn(), Frame::Binary(&frame), &g).unwrap_err();
            assert_matches!(err, CommandError::InvalidJson(msg) if msg.contains("UTF-8"));
        }
        assert_eq!(
            logs.field_values(Level::WARN, "reason"),
            ["invalid_json", "invalid_json"]
        );
    }

    #[test]
    fn oversize_binary_frame_rejected_before_decoding() {
        let big = vec![0xff_u8; 200];
        let err = handle_message(&conn(), Frame::Binary(&big), &gate(AccessPolicy::Open))
            .unwrap_err();
        assert_matches!(err, CommandError::FrameTooLarge { size: 200, limit: 128 });
    }
}
