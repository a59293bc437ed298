use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the Stat Ledger is currently reachable.
    pub online: bool,
}

impl HealthResponse {
    /// Create a health response indicating the Ledger is reachable.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            online: true,
        }
    }

    /// Create a health response indicating scoring runs offline.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            online: false,
        }
    }
}
