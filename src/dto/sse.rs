use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::session::{LedgerUndo, StatEventView},
    state::{state_machine::SessionStatus, stats::PlayerGameStats},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the Ledger is currently reachable.
    pub online: bool,
    /// Loaded game, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast after a play was recorded or undone.
pub struct ScoreChangedEvent {
    pub event: StatEventView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_undo: Option<LedgerUndo>,
    pub home_score: u32,
    pub away_score: u32,
    /// Counters of the player credited with the play, after the change.
    pub player_stats: PlayerGameStats,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast after a lifecycle transition.
pub struct LifecycleEvent {
    pub status: SessionStatus,
    pub current_period: u8,
    pub version: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast whenever the queue or the connectivity flag changes.
pub struct SyncStatusEvent {
    pub online: bool,
    pub pending_count: usize,
    pub stalled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast when reconciliation raises or clears the conflict indicator.
pub struct ConflictEvent {
    pub conflict: bool,
    /// Players whose totals diverge.
    pub players: Vec<Uuid>,
}
