//! Subscription status as shown by the host.

use crate::engine::{Subscription, Synchronizer};
use fos_shim::Host;
use std::fmt;
use tracing::debug;

/// Download status meaning "nothing to report".
pub const STATUS_OK: &str = "synchronize_ok";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The synchronizer is downloading it right now
    InProgress,
    /// Last download failed with this status tag
    Failed(String),
    /// Last successful download, milliseconds since the epoch
    LastAt(u64),
    Never,
}

impl SyncStatus {
    pub fn of(subscription: &Subscription, synchronizer: &dyn Synchronizer) -> Self {
        if synchronizer.is_executing(&subscription.url) {
            return Self::InProgress;
        }
        if let Some(status) = subscription.download_status().filter(|s| *s != STATUS_OK) {
            return Self::Failed(status.to_string());
        }
        match subscription.last_download() {
            0 => Self::Never,
            seconds => Self::LastAt(seconds.saturating_mul(1000)),
        }
    }

    /// Localisation key the host displays.
    pub fn tag(&self) -> &str {
        match self {
            Self::InProgress => "synchronize_in_progress",
            Self::Failed(status) => status,
            Self::LastAt(_) => "synchronize_last_at",
            Self::Never => "synchronize_never",
        }
    }

    pub fn time_ms(&self) -> u64 {
        match self {
            Self::LastAt(ms) => *ms,
            _ => 0,
        }
    }

    pub fn report(&self, host: &dyn Host) {
        debug!("Subscription status: {} ({})", self.tag(), self.time_ms());
        host.set_status(self.tag(), self.time_ms());
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastAt(ms) => write!(f, "{} {}", self.tag(), ms),
            _ => f.write_str(self.tag()),
        }
    }
}
