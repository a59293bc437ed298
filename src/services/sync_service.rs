use std::time::SystemTime;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    dao::models::StatUndoRequest,
    dto::session::{DrainStop, SyncReport},
    services::{connectivity_service, reconcile_service, sse_events},
    state::{
        SharedState,
        game::{NextPush, PushOutcome},
    },
};

/// What caused a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    /// A play was just recorded.
    Recorded,
    /// Timer tick of the sync worker.
    Periodic,
    /// The Ledger became reachable again.
    Reconnect,
    /// The scorer asked for it.
    Requested,
}

impl DrainTrigger {
    /// Whether a rejected head is pushed again. Only reconnects and explicit requests do.
    pub fn retries_failed(self) -> bool {
        matches!(self, DrainTrigger::Reconnect | DrainTrigger::Requested)
    }
}

/// Push queued events to the Ledger in FIFO order until the queue empties or a push fails.
///
/// At most one drain runs at a time; a concurrent call returns immediately with
/// [`DrainStop::AlreadyRunning`]. A drain that emptied the queue runs a due
/// reconciliation before releasing the gate, and starts over if plays were recorded
/// meanwhile.
pub async fn drain(state: &SharedState, trigger: DrainTrigger) -> SyncReport {
    let mut delivered = 0;

    loop {
        let Some(gate) = state.try_begin_drain() else {
            return report(state, delivered, DrainStop::AlreadyRunning).await;
        };

        let (count, stop) = drain_pass(state, trigger).await;
        delivered += count;
        if stop == DrainStop::Drained {
            run_due_reconciliation(state).await;
        }
        drop(gate);

        if stop == DrainStop::Drained && pending_count(state).await > 0 {
            continue;
        }
        return report(state, delivered, stop).await;
    }
}

async fn drain_pass(state: &SharedState, trigger: DrainTrigger) -> (usize, DrainStop) {
    let retry_failed = trigger.retries_failed();
    let mut delivered = 0;

    loop {
        let request = {
            let mut slot = state.session().await;
            let Ok(session) = slot.active_mut() else {
                return (delivered, DrainStop::NoSession);
            };
            match session.begin_next_push(retry_failed, SystemTime::now()) {
                NextPush::Ready(request) => request,
                NextPush::Drained => return (delivered, DrainStop::Drained),
                NextPush::Stalled(local_id) => {
                    debug!(%local_id, ?trigger, "queue head rejected earlier; waiting for retry");
                    return (delivered, DrainStop::Stalled);
                }
            }
        };

        let local_id = request.local_id;
        let result = state.ledger().push_stat(request).await;
        let reachable = match &result {
            Ok(_) => true,
            Err(err) => !err.is_transient(),
        };
        connectivity_service::observe(state, reachable).await;

        let outcome = {
            let mut slot = state.session().await;
            let Ok(session) = slot.active_mut() else {
                return (delivered, DrainStop::NoSession);
            };
            let outcome = session.complete_push(local_id, result.as_ref().cloned());
            state.persist(session).await;
            if let PushOutcome::Acknowledged(event) = &outcome {
                sse_events::broadcast_stat_synced(state, event);
            }
            sse_events::broadcast_sync_status(state, Some(session));
            outcome
        };

        match outcome {
            PushOutcome::Acknowledged(event) => {
                delivered += 1;
                debug!(
                    %local_id,
                    ledger_id = event.ledger_id().unwrap_or_default(),
                    "stat acknowledged"
                );
            }
            PushOutcome::Retracted(undo) => {
                info!(%local_id, ledger_id = %undo.ledger_id, "acknowledged after undo; reversing");
                // Awaited so a reconciliation at the end of this pass sees the reversal.
                forward_undo(state, undo).await;
            }
            PushOutcome::Deferred => {
                if let Err(err) = &result {
                    warn!(%local_id, error = %err, "push failed; keeping event queued");
                }
                return (delivered, DrainStop::Offline);
            }
            PushOutcome::Rejected => {
                if let Err(err) = &result {
                    error!(%local_id, error = %err, "ledger rejected stat; queue stalled");
                }
                return (delivered, DrainStop::Rejected);
            }
            PushOutcome::Stale => {}
        }
    }
}

async fn run_due_reconciliation(state: &SharedState) {
    let due = {
        let slot = state.session().await;
        slot.active().is_ok_and(|session| session.reconciliation_due())
    };
    if !due {
        return;
    }
    // Conflicts are surfaced through the session and SSE; the error only matters to callers.
    if let Err(err) = reconcile_service::reconcile_locked(state).await {
        warn!(error = %err, "scheduled reconciliation did not come out clean");
    }
}

async fn pending_count(state: &SharedState) -> usize {
    let slot = state.session().await;
    slot.active().map(|session| session.queue().len()).unwrap_or(0)
}

async fn report(state: &SharedState, delivered: usize, stop: DrainStop) -> SyncReport {
    SyncReport {
        delivered,
        stop,
        pending: pending_count(state).await,
    }
}

/// Ask the Ledger to reverse an acknowledged event.
///
/// A failed undo leaves the Ledger ahead of the local view, so it schedules a
/// reconciliation instead of retrying.
pub async fn forward_undo(state: &SharedState, request: StatUndoRequest) {
    match state.ledger().undo_stat(request.clone()).await {
        Ok(()) => {
            connectivity_service::observe(state, true).await;
            info!(ledger_id = %request.ledger_id, "ledger undo acknowledged");
        }
        Err(err) => {
            connectivity_service::observe(state, !err.is_transient()).await;
            warn!(
                ledger_id = %request.ledger_id,
                error = %err,
                "ledger undo failed; reconciliation scheduled"
            );
            let mut slot = state.session().await;
            if let Ok(session) = slot.active_mut() {
                if session.game_id() == request.game_id {
                    session.schedule_reconciliation();
                    state.persist(session).await;
                }
            }
        }
    }
}

/// Run [`forward_undo`] in the background.
pub fn spawn_forward_undo(state: &SharedState, request: StatUndoRequest) {
    let state = state.clone();
    tokio::spawn(async move { forward_undo(&state, request).await });
}

/// Deliver staged lifecycle and period updates in the order they were staged.
///
/// Stops at the first transient failure. A rejected update is dropped. Returns how
/// many updates were delivered.
pub async fn flush_status(state: &SharedState) -> usize {
    let _gate = state.status_gate().await;
    let (game_id, pending) = {
        let slot = state.session().await;
        match slot.active() {
            Ok(session) => (session.game_id(), session.pending_status_updates()),
            Err(_) => return 0,
        }
    };

    let mut delivered = 0;
    for staged in pending {
        match state.ledger().update_status(game_id, staged.update.clone()).await {
            Ok(()) => {
                connectivity_service::observe(state, true).await;
                delivered += 1;
            }
            Err(err) if err.is_transient() => {
                connectivity_service::observe(state, false).await;
                warn!(%game_id, error = %err, "status update deferred");
                break;
            }
            Err(err) => {
                connectivity_service::observe(state, true).await;
                error!(%game_id, update = ?staged.update, error = %err, "status update rejected; dropping it");
            }
        }

        let mut slot = state.session().await;
        if let Ok(session) = slot.active_mut() {
            if session.game_id() == game_id && session.settle_status_update(&staged) {
                state.persist(session).await;
            }
        }
    }
    delivered
}

/// Run [`flush_status`] in the background.
pub fn spawn_flush_status(state: &SharedState) {
    let state = state.clone();
    tokio::spawn(async move {
        flush_status(&state).await;
    });
}

/// Drain on every wake-up and on every tick while online, then flush status updates.
pub async fn run_worker(state: SharedState) {
    let mut ticker = time::interval(state.config().sync.drain_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let trigger = tokio::select! {
            _ = state.sync_wakeup().notified() => DrainTrigger::Recorded,
            _ = ticker.tick() => DrainTrigger::Periodic,
        };
        if trigger == DrainTrigger::Periodic && !state.is_online() {
            continue;
        }

        let report = drain(&state, trigger).await;
        debug!(
            ?trigger,
            delivered = report.delivered,
            pending = report.pending,
            stop = ?report.stop,
            "drain finished"
        );
        flush_status(&state).await;
    }
}
