#[cfg(feature = "http-backends")]
mod http;
pub mod memory;

#[cfg(feature = "http-backends")]
pub use http::HttpGameProvider;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{models::GameSnapshotEntity, remote::RemoteResult};

/// Source of rosters and the committed stat log used to resume a session.
pub trait GameProvider: Send + Sync {
    /// Fetch a game snapshot, `None` when the game is unknown.
    fn load_game(&self, game_id: Uuid)
    -> BoxFuture<'static, RemoteResult<Option<GameSnapshotEntity>>>;
}
