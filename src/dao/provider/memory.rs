use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{models::GameSnapshotEntity, provider::GameProvider, remote::RemoteResult};

/// Game provider serving snapshots registered in memory.
#[derive(Clone, Default)]
pub struct StaticGameProvider {
    games: Arc<DashMap<Uuid, GameSnapshotEntity>>,
}

impl StaticGameProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the snapshot returned for its game id.
    pub fn insert(&self, snapshot: GameSnapshotEntity) {
        self.games.insert(snapshot.id, snapshot);
    }
}

impl GameProvider for StaticGameProvider {
    fn load_game(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, RemoteResult<Option<GameSnapshotEntity>>> {
        let snapshot = self.games.get(&game_id).map(|entry| entry.clone());
        Box::pin(async move { Ok(snapshot) })
    }
}
