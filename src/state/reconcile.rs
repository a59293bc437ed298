//! Comparison of locally replayed totals against the Ledger's authoritative totals.

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::PlayerTotalsEntity, state::stats::PlayerGameStats};

/// One player whose local and Ledger totals disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMismatch {
    /// Player concerned.
    pub player_id: Uuid,
    /// Totals replayed from acknowledged local events.
    pub local: PlayerGameStats,
    /// Totals reported by the Ledger.
    pub ledger: PlayerGameStats,
}

/// Outcome of a reconciliation pass that found divergences.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// When the comparison ran (milliseconds since the epoch).
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    #[schema(value_type = i64)]
    pub checked_at: SystemTime,
    /// Diverging players, local order first then Ledger-only players.
    pub mismatches: Vec<PlayerMismatch>,
}

/// Compare `local` totals with `ledger` rows. Players missing on one side count as all zeros.
pub fn compare(
    local: &IndexMap<Uuid, PlayerGameStats>,
    ledger: &[PlayerTotalsEntity],
) -> Vec<PlayerMismatch> {
    let remote: IndexMap<Uuid, PlayerGameStats> = ledger
        .iter()
        .map(|row| (row.player_id, row.stats))
        .collect();

    let mut players: Vec<Uuid> = local.keys().copied().collect();
    players.extend(remote.keys().filter(|id| !local.contains_key(*id)).copied());

    players
        .into_iter()
        .filter_map(|player_id| {
            let local = local.get(&player_id).copied().unwrap_or_default();
            let ledger = remote.get(&player_id).copied().unwrap_or_default();
            (local != ledger).then_some(PlayerMismatch {
                player_id,
                local,
                ledger,
            })
        })
        .collect()
}
