use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        health::HealthResponse,
        session::{
            ConnectivityReport, GameSelector, JournalResetResponse, RecordEventRequest,
            RecordEventResponse, SessionView, SyncReport, UndoResponse,
        },
    },
    error::AppError,
    services::{
        connectivity_service, reconcile_service, scoring_service, session_service,
        sync_service::{self, DrainTrigger},
    },
    state::{SharedState, reconcile::ReconciliationReport},
};

/// Routes driving the scoring session.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/load", post(load_session))
        .route("/session/reset", post(reset_journal))
        .route("/session/events", post(record_event))
        .route("/session/undo", post(undo_last))
        .route("/session/start", post(start_game))
        .route("/session/period", post(advance_period))
        .route("/session/end", post(end_game))
        .route("/session/sync", post(request_sync))
        .route("/session/reconcile", post(reconcile))
        .route("/session/conflict", delete(dismiss_conflict))
        .route("/session/connectivity", put(report_connectivity))
}

/// Derived state of the loaded session.
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses(
        (status = 200, description = "Loaded session", body = SessionView),
        (status = 409, description = "No session loaded or journal corrupted")
    )
)]
pub async fn get_session(State(state): State<SharedState>) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::session_view(&state).await?))
}

/// Load a game from the provider, resuming journaled work.
#[utoipa::path(
    post,
    path = "/session/load",
    tag = "session",
    request_body = GameSelector,
    responses(
        (status = 200, description = "Session loaded", body = SessionView),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Journal corrupted; reset required"),
        (status = 503, description = "Provider unreachable")
    )
)]
pub async fn load_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GameSelector>>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::load_session(&state, payload.game_id).await?))
}

/// Discard the journal of a game.
#[utoipa::path(
    post,
    path = "/session/reset",
    tag = "session",
    request_body = GameSelector,
    responses(
        (status = 200, description = "Journal discarded", body = JournalResetResponse),
        (status = 409, description = "Game is currently loaded")
    )
)]
pub async fn reset_journal(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GameSelector>>,
) -> Result<Json<JournalResetResponse>, AppError> {
    let discarded = session_service::reset_journal(&state, payload.game_id).await?;
    Ok(Json(JournalResetResponse {
        game_id: payload.game_id,
        discarded,
    }))
}

/// Record a play.
#[utoipa::path(
    post,
    path = "/session/events",
    tag = "session",
    request_body = RecordEventRequest,
    responses(
        (status = 200, description = "Play recorded", body = RecordEventResponse),
        (status = 400, description = "Invalid play"),
        (status = 409, description = "Session not live")
    )
)]
pub async fn record_event(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RecordEventRequest>>,
) -> Result<Json<RecordEventResponse>, AppError> {
    Ok(Json(scoring_service::record_event(&state, payload).await?))
}

/// Undo the most recent play.
#[utoipa::path(
    post,
    path = "/session/undo",
    tag = "session",
    responses(
        (status = 200, description = "Play undone", body = UndoResponse),
        (status = 409, description = "Nothing to undo or session final")
    )
)]
pub async fn undo_last(State(state): State<SharedState>) -> Result<Json<UndoResponse>, AppError> {
    Ok(Json(scoring_service::undo_last(&state).await?))
}

/// Start the game.
#[utoipa::path(
    post,
    path = "/session/start",
    tag = "session",
    responses(
        (status = 200, description = "Game live", body = SessionView),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn start_game(State(state): State<SharedState>) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::start_game(&state).await?))
}

/// Advance to the next period.
#[utoipa::path(
    post,
    path = "/session/period",
    tag = "session",
    responses(
        (status = 200, description = "Period advanced", body = SessionView),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn advance_period(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::advance_period(&state).await?))
}

/// End the game.
#[utoipa::path(
    post,
    path = "/session/end",
    tag = "session",
    responses(
        (status = 200, description = "Game final", body = SessionView),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn end_game(State(state): State<SharedState>) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::end_game(&state).await?))
}

/// Drain the queue now, retrying a rejected head.
#[utoipa::path(
    post,
    path = "/session/sync",
    tag = "sync",
    responses((status = 200, description = "Drain finished", body = SyncReport))
)]
pub async fn request_sync(State(state): State<SharedState>) -> Json<SyncReport> {
    let report = sync_service::drain(&state, DrainTrigger::Requested).await;
    sync_service::flush_status(&state).await;
    Json(report)
}

/// Compare acknowledged local totals with the Ledger's.
#[utoipa::path(
    post,
    path = "/session/reconcile",
    tag = "sync",
    responses(
        (status = 200, description = "Totals match", body = ReconciliationReport),
        (status = 409, description = "Totals diverge; see the session conflict"),
        (status = 503, description = "Ledger unreachable")
    )
)]
pub async fn reconcile(
    State(state): State<SharedState>,
) -> Result<Json<ReconciliationReport>, AppError> {
    Ok(Json(reconcile_service::reconcile(&state).await?))
}

/// Clear the reconciliation conflict indicator.
#[utoipa::path(
    delete,
    path = "/session/conflict",
    tag = "sync",
    responses((status = 200, description = "Conflict dismissed", body = SessionView))
)]
pub async fn dismiss_conflict(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(reconcile_service::dismiss_conflict(&state).await?))
}

/// Report the platform's view of network reachability.
#[utoipa::path(
    put,
    path = "/session/connectivity",
    tag = "sync",
    request_body = ConnectivityReport,
    responses((status = 200, description = "Connectivity recorded", body = HealthResponse))
)]
pub async fn report_connectivity(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ConnectivityReport>>,
) -> Json<HealthResponse> {
    connectivity_service::set_online(&state, payload.online).await;
    Json(if state.is_online() {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    })
}
