use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dto::session::SessionView,
    error::ServiceError,
    services::{connectivity_service, sse_events},
    state::{
        SharedState,
        reconcile::{self, ReconciliationReport},
    },
};

/// Compare the acknowledged local totals with the Ledger's, waiting for any running drain.
///
/// A mismatch is stored on the session as a conflict and reported as
/// [`ServiceError::ReconciliationConflict`].
pub async fn reconcile(state: &SharedState) -> Result<ReconciliationReport, ServiceError> {
    let _gate = state.hold_drain_gate().await;
    reconcile_locked(state).await
}

/// Reconciliation body; the caller must hold the drain gate.
pub(crate) async fn reconcile_locked(
    state: &SharedState,
) -> Result<ReconciliationReport, ServiceError> {
    let (game_id, local) = {
        let slot = state.session().await;
        let session = slot.active()?;
        (session.game_id(), session.synced_totals())
    };

    let remote = match state.ledger().player_totals(game_id).await {
        Ok(rows) => {
            connectivity_service::observe(state, true).await;
            rows
        }
        Err(err) => {
            connectivity_service::observe(state, !err.is_transient()).await;
            warn!(%game_id, error = %err, "could not fetch ledger totals");
            return Err(err.into());
        }
    };

    let report = ReconciliationReport {
        checked_at: SystemTime::now(),
        mismatches: reconcile::compare(&local, &remote),
    };

    {
        let mut slot = state.session().await;
        if let Ok(session) = slot.active_mut() {
            if session.game_id() == game_id {
                session.settle_reconciliation(report.clone());
                state.persist(session).await;
                sse_events::broadcast_conflict(state, session);
            }
        }
    }

    if report.mismatches.is_empty() {
        info!(%game_id, players = local.len(), "reconciliation clean");
        Ok(report)
    } else {
        for mismatch in &report.mismatches {
            warn!(
                %game_id,
                player_id = %mismatch.player_id,
                local = ?mismatch.local,
                ledger = ?mismatch.ledger,
                "ledger totals disagree"
            );
        }
        Err(ServiceError::ReconciliationConflict {
            players: report.mismatches.len(),
        })
    }
}

/// Clear the conflict indicator after the scorer reviewed it.
pub async fn dismiss_conflict(state: &SharedState) -> Result<SessionView, ServiceError> {
    let mut slot = state.session().await;
    let session = slot.active_mut()?;
    if session.dismiss_conflict() {
        info!(game_id = %session.game_id(), "reconciliation conflict dismissed");
        state.persist(session).await;
        sse_events::broadcast_conflict(state, session);
    }
    Ok(SessionView::build(session, state.is_online()))
}
