use std::time::{Duration, Instant};

/// Last known reachability of the Stat Ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    /// Whether the Ledger is believed reachable.
    pub online: bool,
    /// When `online` last changed.
    pub since: Instant,
}

impl Connectivity {
    /// Initial state: offline until the first successful probe or push.
    pub fn offline() -> Self {
        Self {
            online: false,
            since: Instant::now(),
        }
    }

    /// Flip to `online`, returning the resulting change if any.
    pub fn update(&mut self, online: bool, now: Instant) -> Option<ConnectivityChange> {
        if self.online == online {
            return None;
        }
        let change = if online {
            ConnectivityChange::CameOnline {
                offline_for: now.saturating_duration_since(self.since),
            }
        } else {
            ConnectivityChange::WentOffline
        };
        self.online = online;
        self.since = now;
        Some(change)
    }
}

/// Edge observed on the connectivity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityChange {
    /// Offline → online, after `offline_for`.
    CameOnline {
        /// Length of the offline gap.
        offline_for: Duration,
    },
    /// Online → offline.
    WentOffline,
}
