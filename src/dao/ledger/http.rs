use futures::future::BoxFuture;
use reqwest::Method;
use uuid::Uuid;

use crate::dao::{
    http::{HttpBackend, HttpConfig, HttpResult},
    ledger::StatLedger,
    models::{LedgerAck, PlayerTotalsEntity, StatPushRequest, StatUndoRequest, StatusUpdate},
    remote::RemoteResult,
};

/// Header carrying the idempotency key of a stat push.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Stat Ledger reached over its JSON HTTP API.
#[derive(Clone)]
pub struct HttpLedger {
    backend: HttpBackend,
}

impl HttpLedger {
    /// Build a ledger client; no request is issued until the first call.
    pub fn new(config: HttpConfig) -> HttpResult<Self> {
        Ok(Self {
            backend: HttpBackend::new(config)?,
        })
    }
}

impl StatLedger for HttpLedger {
    fn push_stat(&self, request: StatPushRequest) -> BoxFuture<'static, RemoteResult<LedgerAck>> {
        let backend = self.backend.clone();
        Box::pin(async move {
            let builder = backend
                .request(Method::POST, "stats")
                .header(IDEMPOTENCY_HEADER, request.local_id.to_string())
                .json(&request);
            backend
                .send_json::<LedgerAck>("stats", builder)
                .await
                .map_err(Into::into)
        })
    }

    fn undo_stat(&self, request: StatUndoRequest) -> BoxFuture<'static, RemoteResult<()>> {
        let backend = self.backend.clone();
        Box::pin(async move {
            backend
                .send_ack(Method::POST, "stats/undo", &request)
                .await
                .map_err(Into::into)
        })
    }

    fn update_status(
        &self,
        game_id: Uuid,
        update: StatusUpdate,
    ) -> BoxFuture<'static, RemoteResult<()>> {
        let backend = self.backend.clone();
        Box::pin(async move {
            let path = format!("games/{game_id}/status");
            backend
                .send_ack(Method::PUT, &path, &update)
                .await
                .map_err(Into::into)
        })
    }

    fn player_totals(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, RemoteResult<Vec<PlayerTotalsEntity>>> {
        let backend = self.backend.clone();
        Box::pin(async move {
            let path = format!("games/{game_id}/totals");
            let builder = backend.request(Method::GET, &path);
            backend.send_json(&path, builder).await.map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, RemoteResult<()>> {
        let backend = self.backend.clone();
        Box::pin(async move { backend.probe("health").await.map_err(Into::into) })
    }
}
