//! Launch session and access settings.

use serde::{Deserialize, Serialize};

/// Launch session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Distinct participants needed to launch.
    pub threshold: u32,
    /// Longest accepted participant ID, in bytes.
    pub max_participant_id_len: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            threshold: 3,
            max_participant_id_len: 128,
        }
    }
}

/// Privileged command gating.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessSettings {
    /// When set, `reset` and `reveal_now` must carry this token.
    pub admin_token: Option<String>,
}
