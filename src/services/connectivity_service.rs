use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    services::{
        sse_events,
        sync_service::{self, DrainTrigger},
    },
    state::{SharedState, connectivity::ConnectivityChange},
};

/// Record a reachability observation made by any Ledger call.
///
/// Coming back after an outage of at least `reconcile_after_offline` schedules a
/// reconciliation on the loaded session. Does not start a drain.
pub async fn observe(state: &SharedState, online: bool) -> Option<ConnectivityChange> {
    let change = state.report_connectivity(online)?;

    let mut slot = state.session().await;
    let session = slot.active_mut().ok();
    if let (ConnectivityChange::CameOnline { offline_for }, Some(session)) = (change, session) {
        if offline_for >= state.config().sync.reconcile_after_offline {
            info!(
                game_id = %session.game_id(),
                offline_ms = offline_for.as_millis() as u64,
                "long outage; reconciliation scheduled"
            );
            session.schedule_reconciliation();
        }
    }
    sse_events::broadcast_sync_status(state, slot.active().ok());

    Some(change)
}

/// Record a reachability observation and start draining when the Ledger came back.
pub async fn set_online(state: &SharedState, online: bool) -> Option<ConnectivityChange> {
    let change = observe(state, online).await;
    if matches!(change, Some(ConnectivityChange::CameOnline { .. })) {
        spawn_reconnect_drain(state);
    }
    change
}

fn spawn_reconnect_drain(state: &SharedState) {
    let state = state.clone();
    tokio::spawn(async move {
        let report = sync_service::drain(&state, DrainTrigger::Reconnect).await;
        debug!(delivered = report.delivered, stop = ?report.stop, "reconnect drain finished");
        sync_service::flush_status(&state).await;
    });
}

/// Probe the Ledger forever, keeping the connectivity flag current.
///
/// Probes every `probe_interval` while online. While offline the delay doubles up to
/// `max_probe_backoff`, with jitter so several scorers do not probe in lockstep.
pub async fn run_monitor(state: SharedState) {
    let sync = state.config().sync.clone();
    let mut backoff = sync.probe_interval;

    loop {
        let online = match state.ledger().health_check().await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "ledger probe failed");
                false
            }
        };
        set_online(&state, online).await;

        let delay = if online {
            backoff = sync.probe_interval;
            sync.probe_interval
        } else {
            let delay = jittered(backoff);
            backoff = (backoff * 2).min(sync.max_probe_backoff);
            delay
        };
        sleep(delay).await;
    }
}

/// Spread `base` by up to a quarter in either direction.
fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let spread = (base_ms / 4) as i64;
    if spread == 0 {
        return base;
    }
    let offset = rand::rng().random_range(-spread..=spread);
    Duration::from_millis(base_ms.saturating_add_signed(offset))
}
