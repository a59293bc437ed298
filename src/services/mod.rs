/// Connectivity tracking and the Ledger probe loop.
pub mod connectivity_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Reconciliation of local totals against the Ledger.
pub mod reconcile_service;
/// Recording and undoing plays.
pub mod scoring_service;
/// Loading sessions, lifecycle transitions and journal resets.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Background delivery of queued plays and status updates.
pub mod sync_service;
