mod common;

use std::{sync::Arc, time::Duration};

use common::{Harness, Side, wait_until};
use courtside_scorer::{
    dao::{
        ledger::{
            StatLedger,
            memory::{LedgerMode, MemoryLedger},
        },
        models::{
            LedgerAck, PlayerTotalsEntity, StatPushRequest, StatUndoRequest, StatusUpdate,
        },
        remote::RemoteResult,
    },
    dto::session::{DrainStop, LedgerUndo},
    services::{
        connectivity_service, reconcile_service, scoring_service, session_service,
        sync_service::{self, DrainTrigger},
    },
    state::{event_log::SyncState, state_machine::SessionStatus, stats::StatType},
};
use futures::future::BoxFuture;
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

/// Ledger whose pushes wait for a permit, so a test can act while one is in flight.
struct PausedLedger {
    inner: MemoryLedger,
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

impl PausedLedger {
    fn wrap(inner: MemoryLedger) -> (Arc<dyn StatLedger>, Arc<Notify>, Arc<Semaphore>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Semaphore::new(0));
        let ledger = Self {
            inner,
            entered: entered.clone(),
            release: release.clone(),
        };
        (Arc::new(ledger), entered, release)
    }
}

impl StatLedger for PausedLedger {
    fn push_stat(&self, request: StatPushRequest) -> BoxFuture<'static, RemoteResult<LedgerAck>> {
        let inner = self.inner.clone();
        let entered = self.entered.clone();
        let release = self.release.clone();
        Box::pin(async move {
            entered.notify_one();
            if let Ok(permit) = release.acquire().await {
                permit.forget();
            }
            inner.push_stat(request).await
        })
    }

    fn undo_stat(&self, request: StatUndoRequest) -> BoxFuture<'static, RemoteResult<()>> {
        self.inner.undo_stat(request)
    }

    fn update_status(
        &self,
        game_id: Uuid,
        update: StatusUpdate,
    ) -> BoxFuture<'static, RemoteResult<()>> {
        self.inner.update_status(game_id, update)
    }

    fn player_totals(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, RemoteResult<Vec<PlayerTotalsEntity>>> {
        self.inner.player_totals(game_id)
    }

    fn health_check(&self) -> BoxFuture<'static, RemoteResult<()>> {
        self.inner.health_check()
    }
}

/// Harness whose pushes are paused, plus the handles to observe and release them.
async fn paused_harness(
    reconcile_after_offline: Duration,
) -> (Harness, Arc<Notify>, Arc<Semaphore>) {
    let mut handles = None;
    let harness = Harness::with_backend(
        |config| config.sync.reconcile_after_offline = reconcile_after_offline,
        |ledger| {
            let (ledger, entered, release) = PausedLedger::wrap(ledger);
            handles = Some((entered, release));
            ledger
        },
    )
    .started()
    .await;
    let (entered, release) = handles.expect("ledger wrapped");
    (harness, entered, release)
}

#[tokio::test]
async fn offline_play_syncs_once_the_ledger_is_back() {
    let harness = Harness::live().await;
    harness.ledger.set_mode(LedgerMode::Offline);

    let recorded =
        scoring_service::record_event(&harness.state, harness.play(Side::Away, 1, StatType::Pts2))
            .await
            .unwrap();
    assert_eq!(recorded.event.sync_state, SyncState::Pending);
    assert_eq!(recorded.session.pending_count, 1);
    assert_eq!(recorded.session.away.score, 2);

    let report = sync_service::drain(&harness.state, DrainTrigger::Recorded).await;
    assert_eq!(report.stop, DrainStop::Offline);
    assert_eq!(report.pending, 1);
    assert!(!harness.state.is_online());

    harness.ledger.set_mode(LedgerMode::Online);
    let report = sync_service::drain(&harness.state, DrainTrigger::Reconnect).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.stop, DrainStop::Drained);
    assert_eq!(report.pending, 0);
    assert!(harness.state.is_online());

    let view = harness.view().await;
    let event = &view.events[0];
    assert_eq!(event.local_id, recorded.event.local_id);
    assert_eq!(event.sync_state, SyncState::Synced);
    assert!(event.ledger_id.is_some());
    assert_eq!(view.pending_count, 0);
    assert_eq!(harness.ledger.totals(harness.game_id)[0].stats.points, 2);
}

#[tokio::test]
async fn queued_plays_reach_the_ledger_in_recording_order() {
    let harness = Harness::live().await;
    harness.ledger.set_mode(LedgerMode::Offline);

    let first =
        scoring_service::record_event(&harness.state, harness.play(Side::Home, 0, StatType::Pts2))
            .await
            .unwrap();
    sync_service::drain(&harness.state, DrainTrigger::Recorded).await;
    let second =
        scoring_service::record_event(&harness.state, harness.play(Side::Home, 1, StatType::Dreb))
            .await
            .unwrap();
    sync_service::drain(&harness.state, DrainTrigger::Recorded).await;

    let view = harness.view().await;
    let head = view
        .events
        .iter()
        .find(|event| event.local_id == first.event.local_id)
        .unwrap();
    assert_eq!(head.retry_count, Some(1));

    harness.ledger.set_mode(LedgerMode::Online);
    let report = sync_service::drain(&harness.state, DrainTrigger::Reconnect).await;
    assert_eq!(report.delivered, 2);
    assert_eq!(
        harness.ledger.arrivals(),
        vec![first.event.local_id, second.event.local_id]
    );
}

#[tokio::test]
async fn retry_after_lost_acknowledgment_counts_once() {
    let harness = Harness::live().await;
    harness.ledger.drop_next_ack();

    scoring_service::record_event(&harness.state, harness.play(Side::Home, 2, StatType::Pts3))
        .await
        .unwrap();
    let report = sync_service::drain(&harness.state, DrainTrigger::Recorded).await;
    assert_eq!(report.stop, DrainStop::Offline);
    assert_eq!(report.pending, 1);

    let report = sync_service::drain(&harness.state, DrainTrigger::Reconnect).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(harness.ledger.push_attempts(), 2);
    assert_eq!(harness.ledger.arrivals().len(), 1);
    assert_eq!(harness.ledger.totals(harness.game_id)[0].stats.points, 3);
}

#[tokio::test]
async fn ending_the_game_keeps_draining_the_queue() {
    let harness = Harness::live().await;
    harness.ledger.set_mode(LedgerMode::Offline);

    scoring_service::record_event(&harness.state, harness.play(Side::Home, 0, StatType::Pts2))
        .await
        .unwrap();
    scoring_service::record_event(&harness.state, harness.play(Side::Away, 0, StatType::Pts3))
        .await
        .unwrap();

    let view = session_service::end_game(&harness.state).await.unwrap();
    assert_eq!(view.status, SessionStatus::Final);
    assert_eq!(view.pending_count, 2);

    harness.ledger.set_mode(LedgerMode::Online);
    let report = sync_service::drain(&harness.state, DrainTrigger::Reconnect).await;
    assert_eq!(report.delivered, 2);
    assert_eq!(report.pending, 0);

    sync_service::flush_status(&harness.state).await;
    let updates = harness.ledger.status_updates();
    assert!(updates.iter().any(|(game_id, update)| {
        *game_id == harness.game_id
            && *update
                == StatusUpdate::Lifecycle {
                    status: SessionStatus::Final,
                    home_score: 2,
                    away_score: 3,
                }
    }));
    assert_eq!(harness.view().await.pending_status_updates, 0);
}

#[tokio::test]
async fn rejected_head_stalls_until_the_scorer_retries() {
    let harness = Harness::live().await;
    harness.ledger.set_mode(LedgerMode::Rejecting(422));

    let first =
        scoring_service::record_event(&harness.state, harness.play(Side::Home, 0, StatType::Blk))
            .await
            .unwrap();
    let second =
        scoring_service::record_event(&harness.state, harness.play(Side::Home, 1, StatType::Stl))
            .await
            .unwrap();

    let report = sync_service::drain(&harness.state, DrainTrigger::Recorded).await;
    assert_eq!(report.stop, DrainStop::Rejected);
    assert_eq!(report.pending, 2);

    let view = harness.view().await;
    assert!(view.stalled);
    let states: Vec<_> = view
        .events
        .iter()
        .map(|event| (event.local_id, event.sync_state))
        .collect();
    assert!(states.contains(&(first.event.local_id, SyncState::Failed)));
    assert!(states.contains(&(second.event.local_id, SyncState::Pending)));

    harness.ledger.set_mode(LedgerMode::Online);
    let attempts = harness.ledger.push_attempts();
    let report = sync_service::drain(&harness.state, DrainTrigger::Periodic).await;
    assert_eq!(report.stop, DrainStop::Stalled);
    assert_eq!(harness.ledger.push_attempts(), attempts);
    assert!(harness.ledger.arrivals().is_empty());

    let report = sync_service::drain(&harness.state, DrainTrigger::Requested).await;
    assert_eq!(report.delivered, 2);
    assert_eq!(
        harness.ledger.arrivals(),
        vec![first.event.local_id, second.event.local_id]
    );
    assert!(!harness.view().await.stalled);
}

#[tokio::test]
async fn undoing_a_synced_play_sends_one_ledger_undo() {
    let harness = Harness::live().await;

    scoring_service::record_event(&harness.state, harness.play(Side::Away, 3, StatType::Pts2))
        .await
        .unwrap();
    sync_service::drain(&harness.state, DrainTrigger::Recorded).await;
    let ledger_id = harness.view().await.events[0].ledger_id.clone().unwrap();

    let undone = scoring_service::undo_last(&harness.state).await.unwrap();
    assert_eq!(undone.ledger_undo, LedgerUndo::Forwarded);
    assert_eq!(undone.session.away.score, 0);

    wait_until("ledger undo", || !harness.ledger.undo_requests().is_empty()).await;
    let undos = harness.ledger.undo_requests();
    assert_eq!(undos.len(), 1);
    assert_eq!(undos[0].ledger_id, ledger_id);
    assert!(harness.ledger.totals(harness.game_id).is_empty());
}

#[tokio::test]
async fn undoing_a_queued_play_never_reaches_the_ledger() {
    let harness = Harness::live().await;
    harness.ledger.set_mode(LedgerMode::Offline);

    scoring_service::record_event(&harness.state, harness.play(Side::Home, 4, StatType::To))
        .await
        .unwrap();
    let undone = scoring_service::undo_last(&harness.state).await.unwrap();
    assert_eq!(undone.ledger_undo, LedgerUndo::Dequeued);
    assert_eq!(undone.session.pending_count, 0);

    harness.ledger.set_mode(LedgerMode::Online);
    let report = sync_service::drain(&harness.state, DrainTrigger::Reconnect).await;
    assert_eq!(report.delivered, 0);
    assert_eq!(report.stop, DrainStop::Drained);
    assert_eq!(harness.ledger.push_attempts(), 0);
    assert!(harness.ledger.undo_requests().is_empty());
}

#[tokio::test]
async fn status_updates_are_delivered_in_staging_order() {
    let harness = Harness::live().await;
    session_service::advance_period(&harness.state).await.unwrap();

    sync_service::flush_status(&harness.state).await;

    let updates: Vec<StatusUpdate> = harness
        .ledger
        .status_updates()
        .into_iter()
        .map(|(_, update)| update)
        .collect();
    assert_eq!(
        updates.first(),
        Some(&StatusUpdate::Lifecycle {
            status: SessionStatus::InProgress,
            home_score: 0,
            away_score: 0,
        })
    );
    assert_eq!(
        updates.last(),
        Some(&StatusUpdate::Period { current_period: 2 })
    );
    assert_eq!(harness.view().await.pending_status_updates, 0);
}

#[tokio::test]
async fn status_updates_wait_for_the_ledger() {
    let harness = Harness::new();
    harness.load().await;
    harness.ledger.set_mode(LedgerMode::Offline);
    session_service::start_game(&harness.state).await.unwrap();

    assert_eq!(sync_service::flush_status(&harness.state).await, 0);
    assert_eq!(harness.view().await.pending_status_updates, 2);

    harness.ledger.set_mode(LedgerMode::Online);
    sync_service::flush_status(&harness.state).await;
    assert_eq!(harness.view().await.pending_status_updates, 0);
    assert_eq!(harness.ledger.status_updates().len(), 2);
}

#[tokio::test]
async fn connectivity_reports_flip_the_online_flag() {
    let harness = Harness::new();
    harness.load().await;
    assert!(!harness.state.is_online());

    connectivity_service::observe(&harness.state, true).await;
    assert!(harness.state.is_online());
    assert!(harness.view().await.online);

    connectivity_service::observe(&harness.state, false).await;
    assert!(!harness.view().await.online);
}

#[tokio::test]
async fn second_drain_while_one_is_in_flight_is_a_no_op() {
    let (harness, entered, release) = paused_harness(Duration::from_secs(60)).await;
    scoring_service::record_event(&harness.state, harness.play(Side::Home, 0, StatType::Pts2))
        .await
        .unwrap();

    let state = harness.state.clone();
    let first =
        tokio::spawn(async move { sync_service::drain(&state, DrainTrigger::Recorded).await });
    entered.notified().await;

    let second = sync_service::drain(&harness.state, DrainTrigger::Requested).await;
    assert_eq!(second.stop, DrainStop::AlreadyRunning);
    assert_eq!(second.delivered, 0);
    assert_eq!(second.pending, 1);

    release.add_permits(1);
    let first = first.await.unwrap();
    assert_eq!(first.delivered, 1);
    assert_eq!(first.stop, DrainStop::Drained);
    assert_eq!(harness.ledger.push_attempts(), 1);
}

#[tokio::test]
async fn play_undone_mid_push_is_reversed_before_reconciliation() {
    let (harness, entered, release) = paused_harness(Duration::ZERO).await;
    sync_service::flush_status(&harness.state).await;
    scoring_service::record_event(&harness.state, harness.play(Side::Home, 0, StatType::Pts3))
        .await
        .unwrap();

    let state = harness.state.clone();
    let drain =
        tokio::spawn(async move { sync_service::drain(&state, DrainTrigger::Recorded).await });
    entered.notified().await;

    let undone = scoring_service::undo_last(&harness.state).await.unwrap();
    assert_eq!(undone.ledger_undo, LedgerUndo::Retracted);
    connectivity_service::observe(&harness.state, false).await;
    connectivity_service::observe(&harness.state, true).await;
    assert!(harness.view().await.reconciliation_due);

    release.add_permits(1);
    let report = drain.await.unwrap();
    assert_eq!(report.stop, DrainStop::Drained);
    assert_eq!(report.pending, 0);

    let view = harness.view().await;
    assert!(!view.reconciliation_due);
    assert!(view.conflict.is_none());
    assert_eq!(view.home.score, 0);
    assert_eq!(harness.ledger.undo_requests().len(), 1);
    assert!(harness.ledger.totals(harness.game_id).is_empty());
}

#[tokio::test]
async fn reported_reconnect_drains_the_queue() {
    let harness = Harness::live().await;
    sync_service::flush_status(&harness.state).await;
    harness.ledger.set_mode(LedgerMode::Offline);

    let recorded =
        scoring_service::record_event(&harness.state, harness.play(Side::Away, 2, StatType::Pts2))
            .await
            .unwrap();
    sync_service::drain(&harness.state, DrainTrigger::Recorded).await;
    connectivity_service::set_online(&harness.state, false).await;
    assert!(!harness.state.is_online());
    assert!(harness.ledger.arrivals().is_empty());

    harness.ledger.set_mode(LedgerMode::Online);
    connectivity_service::set_online(&harness.state, true).await;
    wait_until("reconnect drain", || !harness.ledger.arrivals().is_empty()).await;
    assert_eq!(harness.ledger.arrivals(), vec![recorded.event.local_id]);
}

#[tokio::test]
async fn long_outage_schedules_reconciliation() {
    let harness = Harness::with_backend(
        |config| config.sync.reconcile_after_offline = Duration::ZERO,
        |ledger| Arc::new(ledger) as Arc<dyn StatLedger>,
    )
    .started()
    .await;
    sync_service::flush_status(&harness.state).await;
    reconcile_service::reconcile(&harness.state).await.unwrap();
    assert!(!harness.view().await.reconciliation_due);

    connectivity_service::observe(&harness.state, false).await;
    connectivity_service::observe(&harness.state, true).await;
    assert!(harness.view().await.reconciliation_due);
}

#[tokio::test]
async fn short_outage_does_not_schedule_reconciliation() {
    let harness = Harness::live().await;
    sync_service::flush_status(&harness.state).await;
    reconcile_service::reconcile(&harness.state).await.unwrap();

    connectivity_service::observe(&harness.state, false).await;
    connectivity_service::observe(&harness.state, true).await;
    assert!(!harness.view().await.reconciliation_due);
}
