use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Courtside scorer.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::session_stream,
        crate::routes::session::get_session,
        crate::routes::session::load_session,
        crate::routes::session::reset_journal,
        crate::routes::session::record_event,
        crate::routes::session::undo_last,
        crate::routes::session::start_game,
        crate::routes::session::advance_period,
        crate::routes::session::end_game,
        crate::routes::session::request_sync,
        crate::routes::session::reconcile,
        crate::routes::session::dismiss_conflict,
        crate::routes::session::report_connectivity,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::RecordEventRequest,
            crate::dto::session::GameSelector,
            crate::dto::session::ConnectivityReport,
            crate::dto::session::SessionView,
            crate::dto::session::TeamBoard,
            crate::dto::session::PlayerLine,
            crate::dto::session::StatEventView,
            crate::dto::session::RecordEventResponse,
            crate::dto::session::UndoResponse,
            crate::dto::session::LedgerUndo,
            crate::dto::session::JournalResetResponse,
            crate::dto::session::SyncReport,
            crate::dto::session::DrainStop,
            crate::dto::sse::Handshake,
            crate::dto::sse::ScoreChangedEvent,
            crate::dto::sse::LifecycleEvent,
            crate::dto::sse::SyncStatusEvent,
            crate::dto::sse::ConflictEvent,
            crate::state::reconcile::ReconciliationReport,
            crate::state::reconcile::PlayerMismatch,
            crate::state::stats::StatType,
            crate::state::stats::PlayerGameStats,
            crate::state::stats::TeamSide,
            crate::state::state_machine::SessionStatus,
            crate::state::event_log::SyncState,
            crate::state::sync_queue::FailureKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Scoring session: plays, undo and lifecycle"),
        (name = "sync", description = "Ledger synchronization and reconciliation"),
        (name = "sse", description = "Server-sent events stream"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_session_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/session", "/session/events", "/session/undo", "/session/sync", "/sse"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
