//! Wire models exchanged with the Stat Ledger and the game provider.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use uuid::Uuid;

use crate::state::{
    event_log::StatEvent,
    state_machine::SessionStatus,
    stats::{PlayerGameStats, StatType},
};

/// Body of `POST /stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatPushRequest {
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub team_id: Uuid,
    pub stat_type: StatType,
    pub value: u32,
    pub period: u8,
    /// Idempotency key; the Ledger dedupes on it.
    pub local_id: Uuid,
}

impl From<&StatEvent> for StatPushRequest {
    fn from(event: &StatEvent) -> Self {
        Self {
            game_id: event.game_id,
            player_id: event.player_id,
            team_id: event.team_id,
            stat_type: event.stat_type,
            value: event.value,
            period: event.period,
            local_id: event.local_id,
        }
    }
}

/// Answer to `POST /stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAck {
    pub ledger_id: String,
}

/// Body of `POST /stats/undo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatUndoRequest {
    pub ledger_id: String,
    pub game_id: Uuid,
}

/// Body of `PUT /games/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum StatusUpdate {
    /// Lifecycle change together with the scores at that moment.
    Lifecycle {
        status: SessionStatus,
        home_score: u32,
        away_score: u32,
    },
    /// Period change.
    Period { current_period: u8 },
}

/// One row of `GET /games/{id}/totals`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTotalsEntity {
    pub player_id: Uuid,
    pub stats: PlayerGameStats,
}

/// Player listed on a roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub jersey: Option<u8>,
}

/// Team roster as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamEntity {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerEntity>,
}

/// Stat already committed at the Ledger, replayed on session resume.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommittedStatEntity {
    pub local_id: Uuid,
    pub ledger_id: String,
    pub player_id: Uuid,
    pub team_id: Uuid,
    pub stat_type: StatType,
    pub value: u32,
    pub period: u8,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
}

/// Answer of `GET /games/{id}`: rosters plus the committed stat log, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshotEntity {
    pub id: Uuid,
    pub status: SessionStatus,
    #[serde(default)]
    pub current_period: u8,
    pub home: TeamEntity,
    pub away: TeamEntity,
    #[serde(default)]
    pub committed_stats: Vec<CommittedStatEntity>,
}
