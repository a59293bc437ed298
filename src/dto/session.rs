use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_canonical_value},
    state::{
        event_log::{StatEvent, SyncState},
        game::{RecordRequest, Roster, ScoringSession, UndoAction},
        reconcile::ReconciliationReport,
        state_machine::SessionStatus,
        stats::{BoxScore, PlayerGameStats, StatType, TeamSide},
        sync_queue::{FailureKind, SyncQueue},
    },
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_canonical_value"))]
/// Payload used to record one play.
pub struct RecordEventRequest {
    /// Game the play belongs to; must be the loaded game.
    pub game_id: Uuid,
    /// Player credited with the play.
    pub player_id: Uuid,
    /// Team of the player.
    pub team_id: Uuid,
    /// Kind of play.
    pub stat_type: StatType,
    /// Optional value; must match the canonical value of `stat_type` when present.
    #[serde(default)]
    pub value: Option<u32>,
    /// Period of the play; defaults to the current period.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub period: Option<u8>,
}

impl From<RecordEventRequest> for RecordRequest {
    fn from(value: RecordEventRequest) -> Self {
        Self {
            game_id: value.game_id,
            player_id: value.player_id,
            team_id: value.team_id,
            stat_type: value.stat_type,
            value: value.value,
            period: value.period,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// Payload naming a game, used to load a session or reset its journal.
pub struct GameSelector {
    /// Identifier of the game at the provider.
    pub game_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
/// Connectivity observation reported by the platform shell.
pub struct ConnectivityReport {
    /// Whether the platform believes the network is reachable.
    pub online: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Player line of the box score.
pub struct PlayerLine {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jersey: Option<u8>,
    pub stats: PlayerGameStats,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// One team with its score and player lines.
pub struct TeamBoard {
    pub id: Uuid,
    pub name: String,
    pub side: TeamSide,
    pub score: u32,
    pub players: Vec<PlayerLine>,
}

impl TeamBoard {
    fn build(roster: &Roster, side: TeamSide, box_score: &BoxScore) -> Self {
        Self {
            id: roster.id,
            name: roster.name.clone(),
            side,
            score: box_score.score(side),
            players: roster
                .players
                .iter()
                .map(|player| PlayerLine {
                    id: player.id,
                    name: player.name.clone(),
                    jersey: player.jersey,
                    stats: box_score.player(&player.id),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Recorded play as shown to the scorer.
pub struct StatEventView {
    pub local_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<String>,
    pub player_id: Uuid,
    pub team_id: Uuid,
    pub stat_type: StatType,
    pub value: u32,
    pub period: u8,
    /// RFC 3339 timestamp of the recording.
    pub created_at: String,
    pub sync_state: SyncState,
    /// Attempts made after the first one, while queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureKind>,
}

impl StatEventView {
    /// Build the view of `event`, enriched with its queue bookkeeping when queued.
    pub fn build(event: &StatEvent, queue: Option<&SyncQueue>) -> Self {
        let entry = queue.and_then(|queue| queue.iter().find(|entry| entry.local_id == event.local_id));
        Self {
            local_id: event.local_id,
            ledger_id: event.ledger_id().map(str::to_string),
            player_id: event.player_id,
            team_id: event.team_id,
            stat_type: event.stat_type,
            value: event.value,
            period: event.period,
            created_at: format_system_time(event.created_at),
            sync_state: event.sync_state(),
            retry_count: entry.map(|entry| entry.retry_count),
            last_failure: entry.and_then(|entry| entry.last_failure),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Read-only derived state of the loaded session.
pub struct SessionView {
    pub game_id: Uuid,
    pub status: SessionStatus,
    pub current_period: u8,
    /// Number of lifecycle transitions applied since the session was loaded.
    pub version: usize,
    pub home: TeamBoard,
    pub away: TeamBoard,
    /// Most recent first.
    pub events: Vec<StatEventView>,
    /// Events waiting for a Ledger acknowledgment.
    pub pending_count: usize,
    /// Whether the queue head was rejected and waits for an explicit retry.
    pub stalled: bool,
    /// Lifecycle/period updates not yet delivered.
    pub pending_status_updates: usize,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ReconciliationReport>,
    pub reconciliation_due: bool,
}

impl SessionView {
    /// Derive the view from a session and the current connectivity flag.
    pub fn build(session: &ScoringSession, online: bool) -> Self {
        let snapshot = session.snapshot();
        let box_score = session.box_score();
        let queue = session.queue();
        let stalled = queue
            .front()
            .and_then(|entry| session.log().get(&entry.local_id))
            .is_some_and(|event| event.sync_state() == SyncState::Failed);

        Self {
            game_id: session.game_id(),
            status: snapshot.status,
            current_period: snapshot.period,
            version: snapshot.version,
            home: TeamBoard::build(session.home(), TeamSide::Home, box_score),
            away: TeamBoard::build(session.away(), TeamSide::Away, box_score),
            events: session
                .log()
                .recent_first()
                .map(|event| StatEventView::build(event, Some(queue)))
                .collect(),
            pending_count: queue.len(),
            stalled,
            pending_status_updates: session.pending_status_count(),
            online,
            conflict: session.conflict().cloned(),
            reconciliation_due: session.reconciliation_due(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Answer of a recorded play.
pub struct RecordEventResponse {
    pub event: StatEventView,
    pub session: SessionView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// What happened at the Ledger side of an undo.
pub enum LedgerUndo {
    /// Never sent; removed from the queue.
    Dequeued,
    /// Acknowledged earlier; an undo request was issued.
    Forwarded,
    /// Push in flight; reversed as soon as it is acknowledged.
    Retracted,
}

impl From<&UndoAction> for LedgerUndo {
    fn from(value: &UndoAction) -> Self {
        match value {
            UndoAction::Dequeued => LedgerUndo::Dequeued,
            UndoAction::ForwardToLedger(_) => LedgerUndo::Forwarded,
            UndoAction::Retracted => LedgerUndo::Retracted,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Answer of an undo.
pub struct UndoResponse {
    pub undone: StatEventView,
    pub ledger_undo: LedgerUndo,
    pub session: SessionView,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Answer of a journal reset.
pub struct JournalResetResponse {
    pub game_id: Uuid,
    /// Whether a journal file existed and was removed.
    pub discarded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Why a drain pass stopped.
pub enum DrainStop {
    /// Queue is empty.
    Drained,
    /// The Ledger could not be reached.
    Offline,
    /// The head was rejected by the Ledger.
    Rejected,
    /// The head was rejected earlier and this drain does not retry it.
    Stalled,
    /// Another drain was already running.
    AlreadyRunning,
    /// No session is loaded.
    NoSession,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Outcome of a drain.
pub struct SyncReport {
    /// Events acknowledged during the drain.
    pub delivered: usize,
    pub stop: DrainStop,
    /// Events still queued afterwards.
    pub pending: usize,
}
