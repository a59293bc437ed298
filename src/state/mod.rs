pub mod connectivity;
pub mod event_log;
pub mod game;
pub mod outbox;
pub mod reconcile;
mod sse;
pub mod state_machine;
pub mod stats;
pub mod sync_queue;

use std::{sync::Arc, time::Instant};

use tokio::sync::{Mutex, MutexGuard, Notify, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{journal::JournalStore, ledger::StatLedger, provider::GameProvider},
    error::ServiceError,
    state::{
        connectivity::{Connectivity, ConnectivityChange},
        game::ScoringSession,
    },
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// What the scorer currently has loaded.
#[derive(Debug, Default)]
pub enum SessionSlot {
    /// Nothing loaded yet.
    #[default]
    Empty,
    /// A game is being scored.
    Active(ScoringSession),
    /// The journal of `game_id` was refused; only a reset gets out of here.
    Corrupted {
        /// Game whose journal was refused.
        game_id: Uuid,
        /// Why it was refused.
        reason: String,
    },
}

impl SessionSlot {
    /// Borrow the active session or explain why there is none.
    pub fn active(&self) -> Result<&ScoringSession, ServiceError> {
        match self {
            SessionSlot::Active(session) => Ok(session),
            SessionSlot::Empty => Err(ServiceError::NoSession),
            SessionSlot::Corrupted { reason, .. } => {
                Err(ServiceError::CorruptedJournal(reason.clone()))
            }
        }
    }

    /// Mutable variant of [`SessionSlot::active`].
    pub fn active_mut(&mut self) -> Result<&mut ScoringSession, ServiceError> {
        match self {
            SessionSlot::Active(session) => Ok(session),
            SessionSlot::Empty => Err(ServiceError::NoSession),
            SessionSlot::Corrupted { reason, .. } => {
                Err(ServiceError::CorruptedJournal(reason.clone()))
            }
        }
    }
}

/// Central application state: remote backends, the live session and its sync machinery.
pub struct AppState {
    config: AppConfig,
    ledger: Arc<dyn StatLedger>,
    provider: Arc<dyn GameProvider>,
    journal: Option<JournalStore>,
    session: Mutex<SessionSlot>,
    sse: SseHub,
    connectivity: watch::Sender<Connectivity>,
    drain_gate: Mutex<()>,
    status_gate: Mutex<()>,
    sync_wakeup: Notify,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts offline until a probe or a push reaches the Ledger.
    pub fn new(
        config: AppConfig,
        ledger: Arc<dyn StatLedger>,
        provider: Arc<dyn GameProvider>,
    ) -> SharedState {
        let journal = config.journal_dir.as_ref().map(JournalStore::new);
        let (connectivity, _rx) = watch::channel(Connectivity::offline());
        Arc::new(Self {
            config,
            ledger,
            provider,
            journal,
            session: Mutex::new(SessionSlot::Empty),
            sse: SseHub::new(SSE_CAPACITY),
            connectivity,
            drain_gate: Mutex::new(()),
            status_gate: Mutex::new(()),
            sync_wakeup: Notify::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Stat Ledger client.
    pub fn ledger(&self) -> &Arc<dyn StatLedger> {
        &self.ledger
    }

    /// Game/roster provider.
    pub fn provider(&self) -> &Arc<dyn GameProvider> {
        &self.provider
    }

    /// Session journal, when journaling is enabled.
    pub fn journal(&self) -> Option<&JournalStore> {
        self.journal.as_ref()
    }

    /// Lock the session slot. Never hold the guard across a network call.
    pub async fn session(&self) -> MutexGuard<'_, SessionSlot> {
        self.session.lock().await
    }

    /// Broadcast hub feeding the SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Current connectivity flag.
    pub fn is_online(&self) -> bool {
        self.connectivity.borrow().online
    }

    /// Record a reachability observation, returning the edge it caused if any.
    pub fn report_connectivity(&self, online: bool) -> Option<ConnectivityChange> {
        let mut change = None;
        self.connectivity.send_if_modified(|current| {
            change = current.update(online, Instant::now());
            change.is_some()
        });
        match change {
            Some(ConnectivityChange::CameOnline { offline_for }) => {
                info!(offline_ms = offline_for.as_millis() as u64, "ledger reachable");
            }
            Some(ConnectivityChange::WentOffline) => warn!("ledger unreachable; queueing locally"),
            None => {}
        }
        change
    }

    /// Try to become the single active drain; `None` when one is already running.
    pub fn try_begin_drain(&self) -> Option<MutexGuard<'_, ()>> {
        self.drain_gate.try_lock().ok()
    }

    /// Wait until no drain runs, then hold the gate.
    pub async fn hold_drain_gate(&self) -> MutexGuard<'_, ()> {
        self.drain_gate.lock().await
    }

    /// Serialize status outbox flushes.
    pub async fn status_gate(&self) -> MutexGuard<'_, ()> {
        self.status_gate.lock().await
    }

    /// Wake the sync worker so it drains without waiting for the next tick.
    pub fn wake_sync(&self) {
        self.sync_wakeup.notify_one();
    }

    /// Notification the sync worker waits on.
    pub fn sync_wakeup(&self) -> &Notify {
        &self.sync_wakeup
    }

    /// Write the journal of `session`. Failures are logged, never surfaced.
    pub async fn persist(&self, session: &ScoringSession) {
        let Some(journal) = self.journal.as_ref() else {
            return;
        };
        if let Err(err) = journal.save(&session.to_journal()).await {
            warn!(
                game_id = %session.game_id(),
                error = %err,
                "failed to write session journal"
            );
        }
    }
}
