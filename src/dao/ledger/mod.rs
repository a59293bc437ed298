#[cfg(feature = "http-backends")]
mod http;
pub mod memory;

#[cfg(feature = "http-backends")]
pub use http::{HttpLedger, IDEMPOTENCY_HEADER};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{LedgerAck, PlayerTotalsEntity, StatPushRequest, StatUndoRequest, StatusUpdate},
    remote::RemoteResult,
};

/// Client side of the Stat Ledger, the remote system of record for game statistics.
///
/// Implementations must forward `local_id` as the idempotency key so a retried
/// push never double-counts.
pub trait StatLedger: Send + Sync {
    /// Push one stat; answers with the ledger id assigned to it.
    fn push_stat(&self, request: StatPushRequest) -> BoxFuture<'static, RemoteResult<LedgerAck>>;
    /// Reverse a previously acknowledged stat.
    fn undo_stat(&self, request: StatUndoRequest) -> BoxFuture<'static, RemoteResult<()>>;
    /// Publish a lifecycle or period change.
    fn update_status(
        &self,
        game_id: Uuid,
        update: StatusUpdate,
    ) -> BoxFuture<'static, RemoteResult<()>>;
    /// Authoritative per-player totals for a game.
    fn player_totals(&self, game_id: Uuid)
    -> BoxFuture<'static, RemoteResult<Vec<PlayerTotalsEntity>>>;
    /// Cheap reachability probe.
    fn health_check(&self) -> BoxFuture<'static, RemoteResult<()>>;
}
