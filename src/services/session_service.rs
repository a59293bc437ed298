use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::journal::JournalError,
    dto::session::SessionView,
    error::ServiceError,
    services::{sse_events, sync_service},
    state::{
        SessionSlot, SharedState,
        game::{ScoringSession, SessionError},
        state_machine::SessionEvent,
    },
};

/// Load `game_id` from the provider and resume any journaled work for it.
///
/// Replaces the loaded session. A journal that cannot be trusted parks the slot in
/// the corrupted state until [`reset_journal`] is called.
pub async fn load_session(state: &SharedState, game_id: Uuid) -> Result<SessionView, ServiceError> {
    let snapshot = state
        .provider()
        .load_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;

    let journal = match state.journal() {
        Some(store) => match store.load(game_id).await {
            Ok(journal) => journal,
            Err(err @ JournalError::Corrupted { .. }) => {
                return Err(park_corrupted(state, game_id, err.to_string()).await);
            }
            Err(err) => return Err(err.into()),
        },
        None => None,
    };
    let resumed_pending = journal
        .as_ref()
        .map(|journal| journal.pending_events.len())
        .unwrap_or(0);

    let (session, owed_undos) = match ScoringSession::resume(snapshot, journal) {
        Ok(resumed) => resumed,
        Err(SessionError::CorruptedJournal(reason)) => {
            return Err(park_corrupted(state, game_id, reason).await);
        }
        Err(err) => return Err(err.into()),
    };

    let view = {
        // Keep drains off the slot while the session is swapped.
        let _gate = state.hold_drain_gate().await;
        let mut slot = state.session().await;
        *slot = SessionSlot::Active(session);
        let session = slot.active()?;
        state.persist(session).await;
        sse_events::broadcast_session_loaded(state, session);
        sse_events::broadcast_sync_status(state, Some(session));
        SessionView::build(session, state.is_online())
    };

    info!(
        %game_id,
        status = ?view.status,
        period = view.current_period,
        events = view.events.len(),
        resumed_pending,
        owed_undos = owed_undos.len(),
        "session loaded"
    );

    for undo in owed_undos {
        sync_service::spawn_forward_undo(state, undo);
    }
    state.wake_sync();
    sync_service::spawn_flush_status(state);

    Ok(view)
}

async fn park_corrupted(state: &SharedState, game_id: Uuid, reason: String) -> ServiceError {
    warn!(%game_id, %reason, "refusing session journal; reset required");
    *state.session().await = SessionSlot::Corrupted {
        game_id,
        reason: reason.clone(),
    };
    ServiceError::CorruptedJournal(reason)
}

/// Discard the journal of `game_id`, leaving the corrupted state if it was parked there.
///
/// Refused while that game is the loaded session. Returns whether a journal existed.
pub async fn reset_journal(state: &SharedState, game_id: Uuid) -> Result<bool, ServiceError> {
    let mut slot = state.session().await;
    if let SessionSlot::Active(session) = &*slot {
        if session.game_id() == game_id {
            return Err(ServiceError::InvalidSessionState(format!(
                "game {game_id} is loaded; its journal cannot be reset"
            )));
        }
    }

    let discarded = match state.journal() {
        Some(store) => store.discard(game_id).await?,
        None => false,
    };
    if matches!(&*slot, SessionSlot::Corrupted { game_id: parked, .. } if *parked == game_id) {
        *slot = SessionSlot::Empty;
    }

    warn!(%game_id, discarded, "session journal reset");
    Ok(discarded)
}

/// Move a SCHEDULED game to IN_PROGRESS in period 1.
pub async fn start_game(state: &SharedState) -> Result<SessionView, ServiceError> {
    transition(state, SessionEvent::StartGame).await
}

/// Move to the next period.
pub async fn advance_period(state: &SharedState) -> Result<SessionView, ServiceError> {
    transition(state, SessionEvent::AdvancePeriod).await
}

/// Close the game. Queued plays keep draining afterwards.
pub async fn end_game(state: &SharedState) -> Result<SessionView, ServiceError> {
    transition(state, SessionEvent::EndGame).await
}

async fn transition(state: &SharedState, event: SessionEvent) -> Result<SessionView, ServiceError> {
    let view = {
        let mut slot = state.session().await;
        let session = slot.active_mut()?;
        let snapshot = session.apply_transition(event)?;
        info!(
            game_id = %session.game_id(),
            ?event,
            status = ?snapshot.status,
            period = snapshot.period,
            "session transition"
        );
        state.persist(session).await;
        sse_events::broadcast_lifecycle(state, session);
        SessionView::build(session, state.is_online())
    };

    sync_service::spawn_flush_status(state);
    Ok(view)
}

/// Current derived state of the loaded session.
pub async fn session_view(state: &SharedState) -> Result<SessionView, ServiceError> {
    let slot = state.session().await;
    let session = slot.active()?;
    Ok(SessionView::build(session, state.is_online()))
}
