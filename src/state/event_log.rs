use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::stats::StatType;

/// Delivery state of a recorded event with respect to the Ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// Recorded locally, not yet acknowledged.
    Pending,
    /// Acknowledged by the Ledger; terminal.
    Synced,
    /// Last delivery attempt was rejected by the Ledger.
    Failed,
}

/// Error returned when a sync state or ledger id change would break the event lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncTransitionError {
    /// The requested state change is not part of the lifecycle.
    #[error("sync state cannot move from {from:?} to {to:?}")]
    Invalid {
        /// Current state.
        from: SyncState,
        /// Requested state.
        to: SyncState,
    },
    /// The ledger id was already assigned.
    #[error("ledger id already assigned ({existing})")]
    LedgerIdAssigned {
        /// Ledger id recorded earlier.
        existing: String,
    },
}

/// One discrete recorded play.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatEvent {
    /// Client-generated identifier, also used as the idempotency key.
    pub local_id: Uuid,
    ledger_id: Option<String>,
    /// Game the play belongs to.
    pub game_id: Uuid,
    /// Player credited with the play.
    pub player_id: Uuid,
    /// Team of the player.
    pub team_id: Uuid,
    /// Kind of play.
    pub stat_type: StatType,
    /// Canonical value of the play (points for made baskets, 1 otherwise).
    pub value: u32,
    /// Period during which the play happened.
    pub period: u8,
    /// Local wall-clock time of the recording.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
    sync_state: SyncState,
}

impl StatEvent {
    /// Build a freshly recorded, unacknowledged event.
    pub fn new(
        game_id: Uuid,
        player_id: Uuid,
        team_id: Uuid,
        stat_type: StatType,
        period: u8,
    ) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            ledger_id: None,
            game_id,
            player_id,
            team_id,
            stat_type,
            value: stat_type.canonical_value(),
            period,
            created_at: SystemTime::now(),
            sync_state: SyncState::Pending,
        }
    }

    /// Rebuild an event the Ledger already committed.
    #[allow(clippy::too_many_arguments)]
    pub fn committed(
        local_id: Uuid,
        ledger_id: String,
        game_id: Uuid,
        player_id: Uuid,
        team_id: Uuid,
        stat_type: StatType,
        period: u8,
        created_at: SystemTime,
    ) -> Self {
        Self {
            local_id,
            ledger_id: Some(ledger_id),
            game_id,
            player_id,
            team_id,
            stat_type,
            value: stat_type.canonical_value(),
            period,
            created_at,
            sync_state: SyncState::Synced,
        }
    }

    /// Server-assigned identifier, once acknowledged.
    pub fn ledger_id(&self) -> Option<&str> {
        self.ledger_id.as_deref()
    }

    /// Current delivery state.
    pub fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    /// Move to `next`, enforcing PENDING→SYNCED and PENDING↔FAILED only.
    pub fn transition(&mut self, next: SyncState) -> Result<(), SyncTransitionError> {
        let allowed = matches!(
            (self.sync_state, next),
            (SyncState::Pending, SyncState::Synced)
                | (SyncState::Pending, SyncState::Failed)
                | (SyncState::Failed, SyncState::Pending)
        );
        if !allowed {
            return Err(SyncTransitionError::Invalid {
                from: self.sync_state,
                to: next,
            });
        }
        self.sync_state = next;
        Ok(())
    }

    /// Record the Ledger acknowledgment: assigns the ledger id once and marks the event synced.
    pub fn acknowledge(&mut self, ledger_id: String) -> Result<(), SyncTransitionError> {
        if let Some(existing) = &self.ledger_id {
            return Err(SyncTransitionError::LedgerIdAssigned {
                existing: existing.clone(),
            });
        }
        self.transition(SyncState::Synced)?;
        self.ledger_id = Some(ledger_id);
        Ok(())
    }
}

/// Append-only log of recorded events keyed by local id.
///
/// Entries are stored oldest first; the head (most recent event) is the last
/// entry and is the only one that can be removed.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: IndexMap<Uuid, StatEvent>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `event` the new head.
    pub fn push_head(&mut self, event: StatEvent) {
        self.events.insert(event.local_id, event);
    }

    /// Remove and return the head, if any.
    pub fn pop_head(&mut self) -> Option<StatEvent> {
        self.events.pop().map(|(_, event)| event)
    }

    /// Most recent event.
    pub fn head(&self) -> Option<&StatEvent> {
        self.events.last().map(|(_, event)| event)
    }

    /// Look up an event by local id.
    pub fn get(&self, local_id: &Uuid) -> Option<&StatEvent> {
        self.events.get(local_id)
    }

    /// Mutable lookup by local id.
    pub fn get_mut(&mut self, local_id: &Uuid) -> Option<&mut StatEvent> {
        self.events.get_mut(local_id)
    }

    /// Whether an event with this local id is in the log.
    pub fn contains(&self, local_id: &Uuid) -> bool {
        self.events.contains_key(local_id)
    }

    /// Events in recording order (oldest first), the order replay uses.
    pub fn chronological(&self) -> impl DoubleEndedIterator<Item = &StatEvent> {
        self.events.values()
    }

    /// Events most recent first, the order the scorer sees.
    pub fn recent_first(&self) -> impl Iterator<Item = &StatEvent> {
        self.events.values().rev()
    }

    /// Number of events in the log.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(stat: StatType) -> StatEvent {
        StatEvent::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), stat, 1)
    }

    #[test]
    fn new_events_are_pending_with_canonical_value() {
        let event = event(StatType::Pts3);
        assert_eq!(event.sync_state(), SyncState::Pending);
        assert_eq!(event.value, 3);
        assert!(event.ledger_id().is_none());
    }

    #[test]
    fn synced_is_terminal() {
        let mut event = event(StatType::Ast);
        event.acknowledge("L-1".into()).unwrap();

        assert_eq!(event.sync_state(), SyncState::Synced);
        assert_eq!(event.ledger_id(), Some("L-1"));
        assert!(event.transition(SyncState::Pending).is_err());
        assert!(event.transition(SyncState::Failed).is_err());
    }

    #[test]
    fn ledger_id_is_write_once() {
        let mut event = event(StatType::Ast);
        event.acknowledge("L-1".into()).unwrap();
        let err = event.acknowledge("L-2".into()).unwrap_err();
        assert_eq!(
            err,
            SyncTransitionError::LedgerIdAssigned {
                existing: "L-1".into()
            }
        );
        assert_eq!(event.ledger_id(), Some("L-1"));
    }

    #[test]
    fn failed_must_return_to_pending_before_sync() {
        let mut event = event(StatType::Stl);
        event.transition(SyncState::Failed).unwrap();
        assert!(event.transition(SyncState::Synced).is_err());
        event.transition(SyncState::Pending).unwrap();
        event.acknowledge("L-9".into()).unwrap();
    }

    #[test]
    fn log_pops_most_recent_first() {
        let mut log = EventLog::new();
        let first = event(StatType::Pts2);
        let second = event(StatType::Foul);
        log.push_head(first.clone());
        log.push_head(second.clone());

        assert_eq!(log.head().map(|e| e.local_id), Some(second.local_id));
        let order: Vec<_> = log.recent_first().map(|e| e.local_id).collect();
        assert_eq!(order, vec![second.local_id, first.local_id]);

        assert_eq!(log.pop_head().map(|e| e.local_id), Some(second.local_id));
        assert_eq!(log.pop_head().map(|e| e.local_id), Some(first.local_id));
        assert!(log.pop_head().is_none());
    }
}
