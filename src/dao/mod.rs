/// Shared HTTP plumbing for the remote backends.
#[cfg(feature = "http-backends")]
pub mod http;
/// On-disk journal of unacknowledged session work.
pub mod journal;
/// Stat Ledger client trait and backends.
pub mod ledger;
/// Wire models exchanged with remote services.
pub mod models;
/// Game/roster provider trait and backends.
pub mod provider;
/// Transport-agnostic remote error type.
pub mod remote;
