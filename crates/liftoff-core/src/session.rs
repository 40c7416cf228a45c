//! The launch session state machine.
//!
//! `Session` is the only mutable state in the system. It is owned by exactly
//! one coordinator; everything else sees [`Snapshot`]s.
//!
//! ```text
//! WAITING ──(clicks >= threshold)──> LAUNCHED ──(reset)──> WAITING
//!                                      │
//!                                      └─ reveal_complete sub-flag
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::ids::ParticipantId;

/// Number of distinct participants needed to launch. Always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(NonZeroU32);

impl Threshold {
    /// Build a threshold, returning `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// The threshold as a plain integer.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn reached_by(self, count: usize) -> bool {
        u64::try_from(count).unwrap_or(u64::MAX) >= u64::from(self.get())
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(NonZeroU32::MIN.saturating_add(2))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Collecting clicks.
    Waiting,
    /// Threshold reached; clicks are ignored until reset.
    Launched,
}

/// What a single operation did to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed (duplicate click, click after launch, early reveal).
    Unchanged,
    /// A new participant was recorded but the threshold is not yet met.
    Joined {
        /// Click count after the join.
        click_count: usize,
    },
    /// A new participant was recorded and the session launched.
    Launched {
        /// Click count at the moment of launch.
        click_count: usize,
    },
    /// The session was cleared.
    Reset,
    /// The reveal-complete flag was set.
    RevealCompleted,
}

impl Outcome {
    /// Whether the session state differs from before the operation.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// The complete session state as sent to peers. Never a delta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Distinct participants since the last reset.
    pub click_count: usize,
    /// Whether the threshold has been reached.
    pub is_launched: bool,
    /// Participant IDs in sorted order.
    pub participants: Vec<String>,
    /// Whether a display has acknowledged the reveal.
    pub reveal_complete: bool,
}

impl Snapshot {
    /// Serialize to the JSON text frame sent over the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The single shared launch session.
#[derive(Clone, Debug)]
pub struct Session {
    threshold: Threshold,
    participants: BTreeSet<ParticipantId>,
    launched: bool,
    reveal_complete: bool,
}

impl Session {
    /// Create an empty session.
    pub fn new(threshold: Threshold) -> Self {
        Self {
            threshold,
            participants: BTreeSet::new(),
            launched: false,
            reveal_complete: false,
        }
    }

    /// Configured threshold.
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Always `participants().len()`; there is no separate counter.
    pub fn click_count(&self) -> usize {
        self.participants.len()
    }

    /// Whether the session has launched.
    pub fn is_launched(&self) -> bool {
        self.launched
    }

    /// Whether the reveal has been acknowledged.
    pub fn reveal_complete(&self) -> bool {
        self.reveal_complete
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        if self.launched {
            Phase::Launched
        } else {
            Phase::Waiting
        }
    }

    /// Iterate participants in sorted order.
    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.iter()
    }

    /// Whether this participant has already clicked since the last reset.
    pub fn has_participant(&self, id: &ParticipantId) -> bool {
        self.participants.contains(id)
    }

    /// Record a launch click.
    ///
    /// Repeats from the same participant and any click after launch are
    /// no-ops.
    pub fn register_click(&mut self, id: ParticipantId) -> Outcome {
        if self.launched || !self.participants.insert(id) {
            return Outcome::Unchanged;
        }
        let click_count = self.click_count();
        if self.threshold.reached_by(click_count) {
            self.launched = true;
            Outcome::Launched { click_count }
        } else {
            Outcome::Joined { click_count }
        }
    }

    /// Clear all progress.
    pub fn reset(&mut self) -> Outcome {
        self.participants.clear();
        self.launched = false;
        self.reveal_complete = false;
        Outcome::Reset
    }

    /// Mark the reveal as finished. Ignored unless launched.
    pub fn mark_reveal_complete(&mut self) -> Outcome {
        if !self.launched || self.reveal_complete {
            return Outcome::Unchanged;
        }
        self.reveal_complete = true;
        Outcome::RevealCompleted
    }

    /// Route a parsed command to the matching operation.
    pub fn apply(&mut self, command: Command) -> Outcome {
        match command {
            Command::LaunchClick { user_id } => self.register_click(user_id),
            Command::Reset { .. } => self.reset(),
            Command::RevealNow { .. } => self.mark_reveal_complete(),
        }
    }

    /// Full current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            click_count: self.click_count(),
            is_launched: self.launched,
            participants: self.participants.iter().map(|p| p.as_str().to_owned()).collect(),
            reveal_complete: self.reveal_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::parse(s).unwrap()
    }

    fn session(threshold: u32) -> Session {
        Session::new(Threshold::new(threshold).unwrap())
    }

    fn assert_invariants(s: &Session) {
        let snap = s.snapshot();
        assert_eq!(snap.click_count, snap.participants.len());
        assert_eq!(
            snap.is_launched,
            snap.click_count >= s.threshold().get() as usize
        );
        if snap.reveal_complete {
            assert!(snap.is_launched);
        }
    }

    #[test]
    fn threshold_rejects_zero() {
        assert!(Threshold::new(0).is_none());
        assert_eq!(Threshold::new(10).unwrap().get(), 10);
    }

    #[test]
    fn default_threshold_is_three() {
        assert_eq!(Threshold::default().get(), 3);
    }

    #[test]
    fn new_session_is_empty() {
        let s = session(3);
        assert_eq!(s.click_count(), 0);
        assert_eq!(s.phase(), Phase::Waiting);
        assert!(!s.reveal_complete());
        assert_invariants(&s);
    }

    #[test]
    fn duplicate_click_is_idempotent() {
        let mut s = session(3);
        assert_matches!(s.register_click(pid("a")), Outcome::Joined { click_count: 1 });
        for _ in 0..5 {
            assert_eq!(s.register_click(pid("a")), Outcome::Unchanged);
        }
        assert_eq!(s.click_count(), 1);
    }

    #[test]
    fn duplicate_does_not_count_toward_launch() {
        let mut s = session(3);
        let _ = s.register_click(pid("a"));
        let _ = s.register_click(pid("b"));
        assert_eq!(s.register_click(pid("a")), Outcome::Unchanged);
        assert!(!s.is_launched());
        assert_eq!(
            s.register_click(pid("c")),
            Outcome::Launched { click_count: 3 }
        );

        let snap = s.snapshot();
        assert_eq!(snap.click_count, 3);
        assert_eq!(snap.participants, vec!["a", "b", "c"]);
        assert!(snap.is_launched);
    }

    #[test]
    fn clicks_after_launch_are_ignored() {
        let mut s = session(2);
        let _ = s.register_click(pid("a"));
        let _ = s.register_click(pid("b"));
        assert!(s.is_launched());

        assert_eq!(s.register_click(pid("c")), Outcome::Unchanged);
        assert_eq!(s.register_click(pid("a")), Outcome::Unchanged);
        assert_eq!(s.click_count(), 2);
        assert!(!s.has_participant(&pid("c")));
        assert!(s.is_launched());
    }

    #[test]
    fn threshold_of_one_launches_on_first_click() {
        let mut s = session(1);
        assert_eq!(
            s.register_click(pid("solo")),
            Outcome::Launched { click_count: 1 }
        );
        assert_eq!(s.phase(), Phase::Launched);
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = session(2);
        let _ = s.register_click(pid("a"));
        let _ = s.register_click(pid("b"));
        let _ = s.mark_reveal_complete();
        assert!(s.reveal_complete());

        assert_eq!(s.reset(), Outcome::Reset);
        let snap = s.snapshot();
        assert_eq!(snap.click_count, 0);
        assert!(snap.participants.is_empty());
        assert!(!snap.is_launched);
        assert!(!snap.reveal_complete);
    }

    #[test]
    fn participation_does_not_survive_reset() {
        let mut s = session(3);
        let _ = s.register_click(pid("a"));
        let _ = s.register_click(pid("b"));
        assert_eq!(s.click_count(), 2);
        assert!(!s.is_launched());

        let _ = s.reset();
        assert_eq!(s.click_count(), 0);
        assert!(!s.is_launched());

        assert_matches!(s.register_click(pid("a")), Outcome::Joined { click_count: 1 });
    }

    #[test]
    fn reset_on_empty_session_still_reports_reset() {
        let mut s = session(3);
        assert!(s.reset().changed());
    }

    #[test]
    fn reveal_ignored_while_waiting() {
        let mut s = session(3);
        let _ = s.register_click(pid("a"));
        assert_eq!(s.mark_reveal_complete(), Outcome::Unchanged);
        assert!(!s.reveal_complete());
    }

    #[test]
    fn reveal_after_launch_then_reset() {
        let mut s = session(1);
        let _ = s.register_click(pid("a"));
        assert_eq!(s.mark_reveal_complete(), Outcome::RevealCompleted);
        assert_eq!(s.mark_reveal_complete(), Outcome::Unchanged);
        let _ = s.reset();
        assert!(!s.snapshot().reveal_complete);
    }

    #[test]
    fn apply_routes_commands() {
        let mut s = session(1);
        let out = s.apply(Command::LaunchClick { user_id: pid("a") });
        assert_matches!(out, Outcome::Launched { .. });
        assert_eq!(
            s.apply(Command::RevealNow { token: None }),
            Outcome::RevealCompleted
        );
        assert_eq!(s.apply(Command::Reset { token: None }), Outcome::Reset);
        assert_eq!(s.click_count(), 0);
    }

    #[test]
    fn snapshot_wire_shape() {
        let mut s = session(3);
        let _ = s.register_click(pid("b"));
        let _ = s.register_click(pid("a"));
        let json: serde_json::Value =
            serde_json::from_str(&s.snapshot().to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "clickCount": 2,
                "isLaunched": false,
                "participants": ["a", "b"],
                "revealComplete": false,
            })
        );
    }

    #[test]
    fn outcome_changed() {
        assert!(!Outcome::Unchanged.changed());
        assert!(Outcome::Joined { click_count: 1 }.changed());
        assert!(Outcome::Reset.changed());
        assert!(Outcome::RevealCompleted.changed());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Click(u8),
        Reset,
        Reveal,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0u8..8).prop_map(Op::Click),
            1 => Just(Op::Reset),
            1 => Just(Op::Reveal),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_sequence(
            threshold in 1u32..6,
            ops in proptest::collection::vec(op_strategy(), 0..64),
        ) {
            let mut s = session(threshold);
            for op in ops {
                let was_launched = s.is_launched();
                let count_before = s.click_count();
                match op {
                    Op::Click(n) => {
                        let _ = s.register_click(pid(&format!("p{n}")));
                        if was_launched {
                            prop_assert!(s.is_launched());
                            prop_assert_eq!(s.click_count(), count_before);
                        }
                    }
                    Op::Reset => {
                        let _ = s.reset();
                        prop_assert_eq!(s.click_count(), 0);
                        prop_assert!(!s.is_launched());
                        prop_assert!(!s.reveal_complete());
                    }
                    Op::Reveal => {
                        let _ = s.mark_reveal_complete();
                        if !was_launched {
                            prop_assert!(!s.reveal_complete());
                        }
                    }
                }
                assert_invariants(&s);
            }
        }

        #[test]
        fn repeated_clicks_match_single_click(n in 1usize..20) {
            let mut once = session(100);
            let _ = once.register_click(pid("u"));
            let mut many = session(100);
            for _ in 0..n {
                let _ = many.register_click(pid("u"));
            }
            prop_assert_eq!(once.snapshot(), many.snapshot());
        }
    }
}
