use tracing::info;

use crate::{
    dto::session::{LedgerUndo, RecordEventRequest, RecordEventResponse, SessionView, StatEventView, UndoResponse},
    error::ServiceError,
    services::{sse_events, sync_service},
    state::{SharedState, game::UndoAction},
};

/// Record a play on the loaded session and wake the sync worker.
///
/// The box score is updated before any network activity; the Ledger push happens
/// in the background.
pub async fn record_event(
    state: &SharedState,
    request: RecordEventRequest,
) -> Result<RecordEventResponse, ServiceError> {
    let response = {
        let mut slot = state.session().await;
        let session = slot.active_mut()?;
        let event = session.record_event(request.into())?;
        info!(
            game_id = %session.game_id(),
            local_id = %event.local_id,
            player_id = %event.player_id,
            stat_type = ?event.stat_type,
            period = event.period,
            "stat recorded"
        );

        state.persist(session).await;
        sse_events::broadcast_stat_recorded(state, session, &event);
        sse_events::broadcast_sync_status(state, Some(session));
        RecordEventResponse {
            event: StatEventView::build(&event, Some(session.queue())),
            session: SessionView::build(session, state.is_online()),
        }
    };

    state.wake_sync();
    Ok(response)
}

/// Reverse the most recent play.
///
/// Acknowledged plays are reversed at the Ledger in the background; queued plays
/// simply never leave.
pub async fn undo_last(state: &SharedState) -> Result<UndoResponse, ServiceError> {
    let (response, action) = {
        let mut slot = state.session().await;
        let session = slot.active_mut()?;
        let outcome = session.undo_last()?;
        let ledger_undo = LedgerUndo::from(&outcome.action);
        info!(
            game_id = %session.game_id(),
            local_id = %outcome.event.local_id,
            stat_type = ?outcome.event.stat_type,
            ?ledger_undo,
            "stat undone"
        );

        state.persist(session).await;
        sse_events::broadcast_stat_undone(state, session, &outcome.event, ledger_undo);
        sse_events::broadcast_sync_status(state, Some(session));
        let response = UndoResponse {
            undone: StatEventView::build(&outcome.event, None),
            ledger_undo,
            session: SessionView::build(session, state.is_online()),
        };
        (response, outcome.action)
    };

    if let UndoAction::ForwardToLedger(request) = action {
        sync_service::spawn_forward_undo(state, request);
    }
    Ok(response)
}
