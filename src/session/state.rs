use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one session instance; callbacks carry it to detect staleness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "live-{}", self.0)
    }
}

/// Lifecycle of a live session
///
/// `Idle -> Starting -> Open -> Closing -> Closed`, with `Starting -> Idle`
/// when devices or configuration are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Starting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    /// A session in this state blocks a new `start`
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Open)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Closed, Starting)
                | (Starting, Idle)
                | (Starting, Open)
                | (Starting, Closing)
                | (Open, Closing)
                | (Idle, Closing)
                | (Closed, Closing)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_starting_and_open_are_active() {
        assert!(SessionState::Starting.is_active());
        assert!(SessionState::Open.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Closing.is_active());
        assert!(!SessionState::Closed.is_active());
    }

    #[test]
    fn test_transitions() {
        assert!(SessionState::Idle.can_transition_to(SessionState::Starting));
        assert!(SessionState::Starting.can_transition_to(SessionState::Idle));
        assert!(SessionState::Open.can_transition_to(SessionState::Closing));
        assert!(!SessionState::Open.can_transition_to(SessionState::Starting));
        assert!(!SessionState::Starting.can_transition_to(SessionState::Starting));
        assert!(!SessionState::Closed.can_transition_to(SessionState::Open));
    }
}
