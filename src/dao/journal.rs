//! Session journal: one JSON document per game holding the work the Ledger has
//! not acknowledged yet.
//!
//! ```text
//! {journal_dir}/{game_id}.json
//! ```
//!
//! Documents are written to a temporary sibling and renamed into place so a
//! crash never leaves a half-written journal behind.

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::state::{
    event_log::{StatEvent, SyncState},
    outbox::StatusOutbox,
    state_machine::SessionStatus,
    sync_queue::SyncQueueEntry,
};

/// Format version written by this build.
pub const JOURNAL_VERSION: u32 = 1;

/// Result alias for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors raised while reading or writing the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Reading or writing the journal file failed.
    #[error("journal I/O failed for `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The journal could not be encoded.
    #[error("failed to encode journal")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    /// The journal exists but cannot be trusted.
    #[error("journal for game {game_id} is corrupted: {reason}")]
    Corrupted { game_id: Uuid, reason: String },
}

impl JournalError {
    fn corrupted(game_id: Uuid, reason: impl Into<String>) -> Self {
        JournalError::Corrupted {
            game_id,
            reason: reason.into(),
        }
    }
}

/// Persisted form of the unacknowledged part of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntity {
    /// Always [`JOURNAL_VERSION`] when written by this build.
    pub version: u32,
    /// Game the journal belongs to.
    pub game_id: Uuid,
    /// Local lifecycle status, which may be ahead of the provider's.
    pub status: SessionStatus,
    /// Local period.
    pub current_period: u8,
    /// Unacknowledged events, oldest first.
    #[serde(default)]
    pub pending_events: Vec<StatEvent>,
    /// Queue bookkeeping for `pending_events`, same order.
    #[serde(default)]
    pub queue: Vec<SyncQueueEntry>,
    /// Undone events whose push may still land at the Ledger.
    #[serde(default)]
    pub retracted: Vec<Uuid>,
    /// Lifecycle and period updates not yet delivered.
    #[serde(default)]
    pub status_outbox: StatusOutbox,
}

impl JournalEntity {
    /// Structural checks that do not need the rosters.
    pub fn validate(&self, game_id: Uuid) -> JournalResult<()> {
        let corrupted = |reason: String| Err(JournalError::corrupted(game_id, reason));

        if self.version != JOURNAL_VERSION {
            return corrupted(format!("unsupported version {}", self.version));
        }
        if self.game_id != game_id {
            return corrupted(format!("journal belongs to game {}", self.game_id));
        }

        let mut seen = HashSet::with_capacity(self.pending_events.len());
        for event in &self.pending_events {
            if !seen.insert(event.local_id) {
                return corrupted(format!("duplicate local id {}", event.local_id));
            }
            if event.game_id != game_id {
                return corrupted(format!(
                    "event {} belongs to game {}",
                    event.local_id, event.game_id
                ));
            }
            if event.sync_state() == SyncState::Synced || event.ledger_id().is_some() {
                return corrupted(format!("event {} is already acknowledged", event.local_id));
            }
            if event.value != event.stat_type.canonical_value() {
                return corrupted(format!(
                    "event {} carries value {} for {:?}",
                    event.local_id, event.value, event.stat_type
                ));
            }
        }

        let queued = self.queue.iter().map(|entry| entry.local_id);
        let pending = self.pending_events.iter().map(|event| event.local_id);
        if !queued.eq(pending) {
            return corrupted("sync queue does not match pending events".into());
        }

        Ok(())
    }
}

/// Directory of per-game journal files.
#[derive(Debug, Clone)]
pub struct JournalStore {
    dir: PathBuf,
}

impl JournalStore {
    /// Journal files live directly under `dir`, created on first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, game_id: Uuid) -> PathBuf {
        self.dir.join(format!("{game_id}.json"))
    }

    /// Load and validate the journal of `game_id`, `None` when there is none.
    pub async fn load(&self, game_id: Uuid) -> JournalResult<Option<JournalEntity>> {
        let path = self.path(game_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(JournalError::Io { path, source }),
        };

        let journal: JournalEntity = serde_json::from_str(&contents)
            .map_err(|err| JournalError::corrupted(game_id, format!("unreadable: {err}")))?;
        journal.validate(game_id)?;
        Ok(Some(journal))
    }

    /// Replace the journal of `journal.game_id`.
    pub async fn save(&self, journal: &JournalEntity) -> JournalResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| JournalError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path(journal.game_id);
        let tmp = path.with_extension("json.tmp");
        let json =
            serde_json::to_vec_pretty(journal).map_err(|source| JournalError::Encode { source })?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| JournalError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(
            game_id = %journal.game_id,
            pending = journal.pending_events.len(),
            "journal written"
        );
        Ok(())
    }

    /// Delete the journal of `game_id`. Returns whether a file was removed.
    pub async fn discard(&self, game_id: Uuid) -> JournalResult<bool> {
        let path = self.path(game_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(JournalError::Io { path, source }),
        }
    }
}
