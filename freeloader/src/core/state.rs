//! Stage run state and pause policy enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The run state of a stage.
///
/// Transitions are `Running -> Paused -> Finished` or `Running -> Finished`.
/// `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Stage accepts and processes items.
    #[default]
    Running,
    /// Stage asked its producers to slow down and drops submitted items.
    Paused,
    /// Stage was terminated. No further items or attachments.
    Finished,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

impl RunState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns true if items submitted in this state are processed.
    #[must_use]
    pub fn accepts_items(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self, policy: PausePolicy) -> bool {
        match (self, next) {
            (Self::Running, Self::Paused | Self::Finished) | (Self::Paused, Self::Finished) => true,
            (Self::Paused, Self::Running) => policy.allows_resume(),
            _ => false,
        }
    }
}

/// Whether a paused stage may return to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PausePolicy {
    /// `resume()` moves a paused stage back to `Running`.
    #[default]
    Resumable,
    /// Pausing is a one-way step; only termination leaves `Paused`.
    OneWay,
}

impl PausePolicy {
    /// Returns true if resuming from `Paused` is allowed.
    #[must_use]
    pub fn allows_resume(&self) -> bool {
        matches!(self, Self::Resumable)
    }
}

impl fmt::Display for PausePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resumable => write!(f, "resumable"),
            Self::OneWay => write!(f, "one_way"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Running.to_string(), "running");
        assert_eq!(RunState::Paused.to_string(), "paused");
        assert_eq!(RunState::Finished.to_string(), "finished");
    }

    #[test]
    fn test_run_state_default_is_running() {
        assert_eq!(RunState::default(), RunState::Running);
        assert!(RunState::default().accepts_items());
    }

    #[test]
    fn test_only_finished_is_terminal() {
        assert!(RunState::Finished.is_terminal());
        assert!(!RunState::Paused.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn test_transitions_resumable() {
        let policy = PausePolicy::Resumable;
        assert!(RunState::Running.can_transition_to(RunState::Paused, policy));
        assert!(RunState::Running.can_transition_to(RunState::Finished, policy));
        assert!(RunState::Paused.can_transition_to(RunState::Finished, policy));
        assert!(RunState::Paused.can_transition_to(RunState::Running, policy));
        assert!(!RunState::Finished.can_transition_to(RunState::Running, policy));
        assert!(!RunState::Finished.can_transition_to(RunState::Paused, policy));
    }

    #[test]
    fn test_transitions_one_way() {
        let policy = PausePolicy::OneWay;
        assert!(!RunState::Paused.can_transition_to(RunState::Running, policy));
        assert!(RunState::Paused.can_transition_to(RunState::Finished, policy));
    }

    #[test]
    fn test_run_state_serialize() {
        let json = serde_json::to_string(&RunState::Finished).unwrap();
        assert_eq!(json, r#""finished""#);

        let policy: PausePolicy = serde_json::from_str(r#""one_way""#).unwrap();
        assert_eq!(policy, PausePolicy::OneWay);
    }
}
