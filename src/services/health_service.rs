use tracing::warn;

use crate::{dto::health::HealthResponse, services::connectivity_service, state::SharedState};

/// Probe the Ledger and report whether scoring currently syncs or runs offline.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let online = match state.ledger().health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "ledger health check failed (offline mode)");
            false
        }
    };
    connectivity_service::set_online(state, online).await;

    if online {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    }
}
