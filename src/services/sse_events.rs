use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        session::{LedgerUndo, StatEventView},
        sse::{ConflictEvent, LifecycleEvent, ScoreChangedEvent, ServerEvent, SyncStatusEvent},
    },
    state::{
        SharedState,
        event_log::{StatEvent, SyncState},
        game::ScoringSession,
        stats::TeamSide,
    },
};

const EVENT_STAT_RECORDED: &str = "stat.recorded";
const EVENT_STAT_UNDONE: &str = "stat.undone";
const EVENT_STAT_SYNCED: &str = "stat.synced";
const EVENT_LIFECYCLE: &str = "session.lifecycle";
const EVENT_SESSION_LOADED: &str = "session.loaded";
const EVENT_SYNC_STATUS: &str = "sync.status";
const EVENT_CONFLICT: &str = "reconciliation.conflict";

fn score_changed(
    session: &ScoringSession,
    event: &StatEvent,
    ledger_undo: Option<LedgerUndo>,
) -> ScoreChangedEvent {
    let box_score = session.box_score();
    ScoreChangedEvent {
        event: StatEventView::build(event, Some(session.queue())),
        ledger_undo,
        home_score: box_score.score(TeamSide::Home),
        away_score: box_score.score(TeamSide::Away),
        player_stats: box_score.player(&event.player_id),
    }
}

/// Broadcast a freshly recorded play with the resulting scores.
pub fn broadcast_stat_recorded(state: &SharedState, session: &ScoringSession, event: &StatEvent) {
    send_event(state, EVENT_STAT_RECORDED, &score_changed(session, event, None));
}

/// Broadcast an undone play with the resulting scores.
pub fn broadcast_stat_undone(
    state: &SharedState,
    session: &ScoringSession,
    event: &StatEvent,
    ledger_undo: LedgerUndo,
) {
    send_event(
        state,
        EVENT_STAT_UNDONE,
        &score_changed(session, event, Some(ledger_undo)),
    );
}

/// Broadcast that the Ledger acknowledged a play.
pub fn broadcast_stat_synced(state: &SharedState, event: &StatEvent) {
    send_event(state, EVENT_STAT_SYNCED, &StatEventView::build(event, None));
}

/// Broadcast the lifecycle after a transition.
pub fn broadcast_lifecycle(state: &SharedState, session: &ScoringSession) {
    let snapshot = session.snapshot();
    let payload = LifecycleEvent {
        status: snapshot.status,
        current_period: snapshot.period,
        version: snapshot.version,
    };
    send_event(state, EVENT_LIFECYCLE, &payload);
}

/// Broadcast that a session was loaded or resumed.
pub fn broadcast_session_loaded(state: &SharedState, session: &ScoringSession) {
    let snapshot = session.snapshot();
    let payload = LifecycleEvent {
        status: snapshot.status,
        current_period: snapshot.period,
        version: snapshot.version,
    };
    send_event(state, EVENT_SESSION_LOADED, &payload);
}

/// Broadcast the pending count, stall flag and connectivity.
pub fn broadcast_sync_status(state: &SharedState, session: Option<&ScoringSession>) {
    let (pending_count, stalled) = session
        .map(|session| {
            let stalled = session
                .queue()
                .front()
                .and_then(|entry| session.log().get(&entry.local_id))
                .is_some_and(|event| event.sync_state() == SyncState::Failed);
            (session.queue().len(), stalled)
        })
        .unwrap_or((0, false));

    let payload = SyncStatusEvent {
        online: state.is_online(),
        pending_count,
        stalled,
    };
    send_event(state, EVENT_SYNC_STATUS, &payload);
}

/// Broadcast the conflict indicator after a reconciliation pass or a dismissal.
pub fn broadcast_conflict(state: &SharedState, session: &ScoringSession) {
    let payload = ConflictEvent {
        conflict: session.conflict().is_some(),
        players: session
            .conflict()
            .map(|report| report.mismatches.iter().map(|m| m.player_id).collect())
            .unwrap_or_default(),
    };
    send_event(state, EVENT_CONFLICT, &payload);
}

fn send_event<T>(state: &SharedState, event: &str, payload: &T)
where
    T: Serialize,
{
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(message) => state.sse().broadcast(message),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
