//! In-memory Stat Ledger for tests, demos and offline rehearsal.

use std::{
    io,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::{
        ledger::StatLedger,
        models::{LedgerAck, PlayerTotalsEntity, StatPushRequest, StatUndoRequest, StatusUpdate},
        remote::{RemoteError, RemoteResult},
    },
    state::stats::PlayerGameStats,
};

/// How the in-memory ledger answers requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// Requests succeed.
    Online,
    /// Requests fail as if the network were down.
    Offline,
    /// Requests are answered with the given non-success status.
    Rejecting(u16),
}

#[derive(Debug, Clone)]
struct StoredStat {
    ledger_id: String,
    request: StatPushRequest,
    undone: bool,
}

#[derive(Default)]
struct Inner {
    mode: Mutex<Option<LedgerMode>>,
    next_id: AtomicU64,
    stats: DashMap<Uuid, StoredStat>,
    ledger_ids: DashMap<String, Uuid>,
    arrivals: Mutex<Vec<Uuid>>,
    undos: Mutex<Vec<StatUndoRequest>>,
    status_updates: Mutex<Vec<(Uuid, StatusUpdate)>>,
    push_attempts: AtomicUsize,
    drop_next_ack: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Stat Ledger kept in process memory, deduplicating pushes by local id.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl MemoryLedger {
    /// Create an empty, reachable ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch how subsequent requests are answered.
    pub fn set_mode(&self, mode: LedgerMode) {
        *lock(&self.inner.mode) = Some(mode);
    }

    /// Commit the next push but answer it with a network error, as if the acknowledgment was lost.
    pub fn drop_next_ack(&self) {
        self.inner.drop_next_ack.store(true, Ordering::SeqCst);
    }

    /// Commit a stat directly, bypassing the scorer (e.g. a correction made at the desk).
    pub fn commit_external(&self, request: StatPushRequest) -> String {
        self.inner.commit(request)
    }

    /// Local ids in the order the ledger first committed them.
    pub fn arrivals(&self) -> Vec<Uuid> {
        lock(&self.inner.arrivals).clone()
    }

    /// Undo requests received so far.
    pub fn undo_requests(&self) -> Vec<StatUndoRequest> {
        lock(&self.inner.undos).clone()
    }

    /// Status updates received so far, in arrival order.
    pub fn status_updates(&self) -> Vec<(Uuid, StatusUpdate)> {
        lock(&self.inner.status_updates).clone()
    }

    /// Number of push requests received, duplicates included.
    pub fn push_attempts(&self) -> usize {
        self.inner.push_attempts.load(Ordering::SeqCst)
    }

    /// Ledger-side totals for `game_id`, computed from committed, non-undone stats.
    pub fn totals(&self, game_id: Uuid) -> Vec<PlayerTotalsEntity> {
        self.inner.totals(game_id)
    }
}

impl Inner {
    fn check_mode(&self) -> RemoteResult<()> {
        match lock(&self.mode).unwrap_or(LedgerMode::Online) {
            LedgerMode::Online => Ok(()),
            LedgerMode::Offline => Err(RemoteError::unavailable(
                "memory ledger offline",
                io::Error::from(io::ErrorKind::ConnectionRefused),
            )),
            LedgerMode::Rejecting(status) => {
                Err(RemoteError::rejected(status, "memory ledger rejecting"))
            }
        }
    }

    fn commit(&self, request: StatPushRequest) -> String {
        let local_id = request.local_id;
        let ledger_id = match self.stats.entry(local_id) {
            Entry::Occupied(existing) => return existing.get().ledger_id.clone(),
            Entry::Vacant(slot) => {
                let ledger_id = format!("ml-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                slot.insert(StoredStat {
                    ledger_id: ledger_id.clone(),
                    request,
                    undone: false,
                });
                ledger_id
            }
        };

        self.ledger_ids.insert(ledger_id.clone(), local_id);
        lock(&self.arrivals).push(local_id);
        ledger_id
    }

    fn totals(&self, game_id: Uuid) -> Vec<PlayerTotalsEntity> {
        let mut totals: IndexMap<Uuid, PlayerGameStats> = IndexMap::new();
        for local_id in lock(&self.arrivals).iter() {
            let Some(stored) = self.stats.get(local_id) else {
                continue;
            };
            if stored.undone || stored.request.game_id != game_id {
                continue;
            }
            totals
                .entry(stored.request.player_id)
                .or_default()
                .apply(&stored.request.stat_type.delta());
        }

        totals
            .into_iter()
            .map(|(player_id, stats)| PlayerTotalsEntity { player_id, stats })
            .collect()
    }
}

impl StatLedger for MemoryLedger {
    fn push_stat(&self, request: StatPushRequest) -> BoxFuture<'static, RemoteResult<LedgerAck>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.push_attempts.fetch_add(1, Ordering::SeqCst);
            inner.check_mode()?;
            let ledger_id = inner.commit(request);

            if inner.drop_next_ack.swap(false, Ordering::SeqCst) {
                return Err(RemoteError::Timeout {
                    message: "acknowledgment lost".into(),
                });
            }
            Ok(LedgerAck { ledger_id })
        })
    }

    fn undo_stat(&self, request: StatUndoRequest) -> BoxFuture<'static, RemoteResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.check_mode()?;
            lock(&inner.undos).push(request.clone());

            let Some(local_id) = inner.ledger_ids.get(&request.ledger_id).map(|id| *id) else {
                return Err(RemoteError::rejected(404, "unknown ledger id"));
            };
            if let Some(mut stored) = inner.stats.get_mut(&local_id) {
                stored.undone = true;
            }
            Ok(())
        })
    }

    fn update_status(
        &self,
        game_id: Uuid,
        update: StatusUpdate,
    ) -> BoxFuture<'static, RemoteResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.check_mode()?;
            lock(&inner.status_updates).push((game_id, update));
            Ok(())
        })
    }

    fn player_totals(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, RemoteResult<Vec<PlayerTotalsEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.check_mode()?;
            Ok(inner.totals(game_id))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, RemoteResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.check_mode() })
    }
}
