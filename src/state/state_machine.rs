use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a scored game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Game not started yet; plays cannot be recorded.
    Scheduled,
    /// Game running; plays can be recorded.
    InProgress,
    /// Game over; terminal.
    Final,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Tip-off: start the first period.
    StartGame,
    /// Move to the next period (quarter or overtime).
    AdvancePeriod,
    /// Final buzzer.
    EndGame,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?} (period {period})")]
pub struct InvalidTransition {
    /// Status when the invalid event was received.
    pub from: SessionStatus,
    /// Period when the invalid event was received.
    pub period: u8,
    /// The event that cannot be applied.
    pub event: SessionEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current status.
    pub status: SessionStatus,
    /// Current period, 0 before tip-off.
    pub period: u8,
    /// Number of applied transitions.
    pub version: usize,
}

/// State machine gating which scorer actions are allowed.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    status: SessionStatus,
    period: u8,
    version: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            status: SessionStatus::Scheduled,
            period: 0,
            version: 0,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine for a scheduled game.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a machine from a persisted status and period.
    pub fn restore(status: SessionStatus, period: u8) -> Self {
        let period = match status {
            SessionStatus::Scheduled => 0,
            _ => period.max(1),
        };
        Self {
            status,
            period,
            version: 0,
        }
    }

    /// Inspect the current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Current period.
    pub fn period(&self) -> u8 {
        self.period
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            period: self.period,
            version: self.version,
        }
    }

    /// Apply `event`, returning the resulting snapshot.
    pub fn apply(&mut self, event: SessionEvent) -> Result<Snapshot, InvalidTransition> {
        let (status, period) = self.compute_transition(event)?;
        self.status = status;
        self.period = period;
        self.version += 1;
        Ok(self.snapshot())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<(SessionStatus, u8), InvalidTransition> {
        let invalid = || InvalidTransition {
            from: self.status,
            period: self.period,
            event,
        };

        let next = match (self.status, event) {
            (SessionStatus::Scheduled, SessionEvent::StartGame) => (SessionStatus::InProgress, 1),
            (SessionStatus::InProgress, SessionEvent::AdvancePeriod) => (
                SessionStatus::InProgress,
                self.period.checked_add(1).ok_or_else(invalid)?,
            ),
            (SessionStatus::InProgress, SessionEvent::EndGame) => (SessionStatus::Final, self.period),
            _ => return Err(invalid()),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_scheduled() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.status(), SessionStatus::Scheduled);
        assert_eq!(sm.period(), 0);
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = SessionStateMachine::new();

        let started = sm.apply(SessionEvent::StartGame).unwrap();
        assert_eq!(started.status, SessionStatus::InProgress);
        assert_eq!(started.period, 1);

        for expected in 2..=4 {
            assert_eq!(sm.apply(SessionEvent::AdvancePeriod).unwrap().period, expected);
        }

        let finished = sm.apply(SessionEvent::EndGame).unwrap();
        assert_eq!(finished.status, SessionStatus::Final);
        assert_eq!(finished.period, 4);
        assert_eq!(finished.version, 5);
    }

    #[test]
    fn advance_period_requires_running_game() {
        let mut sm = SessionStateMachine::new();
        let err = sm.apply(SessionEvent::AdvancePeriod).unwrap_err();
        assert_eq!(err.from, SessionStatus::Scheduled);
        assert_eq!(err.event, SessionEvent::AdvancePeriod);
    }

    #[test]
    fn final_is_terminal() {
        let mut sm = SessionStateMachine::restore(SessionStatus::Final, 4);
        for event in [
            SessionEvent::StartGame,
            SessionEvent::AdvancePeriod,
            SessionEvent::EndGame,
        ] {
            assert!(sm.apply(event).is_err());
        }
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn game_cannot_end_before_it_starts() {
        let mut sm = SessionStateMachine::new();
        assert!(sm.apply(SessionEvent::EndGame).is_err());
        assert_eq!(sm.status(), SessionStatus::Scheduled);
    }
}
