use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    http::{HttpBackend, HttpConfig, HttpResult},
    models::GameSnapshotEntity,
    provider::GameProvider,
    remote::RemoteResult,
};

/// Game provider reached over HTTP (`GET /games/{id}`).
#[derive(Clone)]
pub struct HttpGameProvider {
    backend: HttpBackend,
}

impl HttpGameProvider {
    /// Build a provider client.
    pub fn new(config: HttpConfig) -> HttpResult<Self> {
        Ok(Self {
            backend: HttpBackend::new(config)?,
        })
    }
}

impl GameProvider for HttpGameProvider {
    fn load_game(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, RemoteResult<Option<GameSnapshotEntity>>> {
        let backend = self.backend.clone();
        Box::pin(async move {
            backend
                .get_optional(&format!("games/{game_id}"))
                .await
                .map_err(Into::into)
        })
    }
}
