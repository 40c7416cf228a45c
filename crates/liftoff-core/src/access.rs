//! Gating of privileged commands (`reset`, `reveal_now`).

use crate::command::Command;
use crate::errors::CommandError;

/// Who may issue privileged commands.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Any peer may reset or reveal.
    #[default]
    Open,
    /// Privileged commands must carry this token.
    Token(String),
}

impl AccessPolicy {
    /// Build a policy from an optional configured token. Blank means open.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some(t) if !t.is_empty() => Self::Token(t.to_owned()),
            _ => Self::Open,
        }
    }

    /// Whether privileged commands are unrestricted.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check a command against the policy. Clicks always pass.
    pub fn authorize(&self, command: &Command) -> Result<(), CommandError> {
        let Self::Token(expected) = self else {
            return Ok(());
        };
        if !command.is_privileged() {
            return Ok(());
        }
        match command.token() {
            Some(given) if constant_time_eq(given.as_bytes(), expected.as_bytes()) => Ok(()),
            _ => Err(CommandError::Unauthorized(command.name())),
        }
    }
}

impl std::fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => f.write_str("Open"),
            Self::Token(_) => f.write_str("Token(<redacted>)"),
        }
    }
}

/// Constant-time comparison for token validation.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
