//! Coalescing outbox for lifecycle and period updates bound for the Ledger.

use serde::{Deserialize, Serialize};

use crate::dao::models::StatusUpdate;

/// Which slot of the outbox an update occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSlot {
    /// Status plus scores.
    Lifecycle,
    /// Current period.
    Period,
}

impl StatusSlot {
    fn of(update: &StatusUpdate) -> Self {
        match update {
            StatusUpdate::Lifecycle { .. } => StatusSlot::Lifecycle,
            StatusUpdate::Period { .. } => StatusSlot::Period,
        }
    }
}

/// Update waiting for delivery, stamped with the sequence it was staged at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingStatus {
    /// Staging sequence; a newer update in the same slot has a larger one.
    pub seq: u64,
    /// Body sent to the Ledger.
    pub update: StatusUpdate,
}

/// At most one lifecycle update and one period update awaiting delivery.
///
/// Staging into an occupied slot replaces the older update. Settling only clears
/// a slot when it still holds the exact update that was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutbox {
    lifecycle: Option<PendingStatus>,
    period: Option<PendingStatus>,
    next_seq: u64,
}

impl StatusOutbox {
    fn slot_mut(&mut self, slot: StatusSlot) -> &mut Option<PendingStatus> {
        match slot {
            StatusSlot::Lifecycle => &mut self.lifecycle,
            StatusSlot::Period => &mut self.period,
        }
    }

    /// Stage `update`, superseding whatever occupied its slot.
    pub fn stage(&mut self, update: StatusUpdate) -> PendingStatus {
        self.next_seq += 1;
        let pending = PendingStatus {
            seq: self.next_seq,
            update,
        };
        *self.slot_mut(StatusSlot::of(&pending.update)) = Some(pending.clone());
        pending
    }

    /// Updates awaiting delivery, in staging order.
    pub fn pending(&self) -> Vec<PendingStatus> {
        let mut pending: Vec<_> = [&self.lifecycle, &self.period]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        pending.sort_by_key(|entry| entry.seq);
        pending
    }

    /// Clear the slot of `sent` unless it was superseded meanwhile. Returns whether it was cleared.
    pub fn settle(&mut self, sent: &PendingStatus) -> bool {
        let slot = self.slot_mut(StatusSlot::of(&sent.update));
        if slot.as_ref().is_some_and(|current| current.seq == sent.seq) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Number of updates awaiting delivery.
    pub fn len(&self) -> usize {
        usize::from(self.lifecycle.is_some()) + usize::from(self.period.is_some())
    }

    /// Whether nothing awaits delivery.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
