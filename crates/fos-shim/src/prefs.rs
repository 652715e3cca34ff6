//! Preferences exposed to the engine, derived from [`ShimConfig`](crate::ShimConfig).

use crate::context::ShimContext;

/// Read-only preference view.
///
/// `subscriptions_autoupdate` is re-evaluated on every read because the host
/// may revoke permission at any time (e.g. when leaving Wi-Fi).
#[derive(Debug, Clone)]
pub struct Prefs {
    ctx: ShimContext,
}

impl Prefs {
    pub fn new(ctx: ShimContext) -> Self {
        Self { ctx }
    }

    /// Number of filter storage backups to keep.
    pub fn patterns_backups(&self) -> u32 {
        self.ctx.config().backup_count
    }

    /// Hours between filter storage backups.
    pub fn patterns_backup_interval(&self) -> u32 {
        self.ctx.config().backup_interval_hours
    }

    pub fn data_directory(&self) -> String {
        self.ctx.config().data_path()
    }

    pub fn save_stats(&self) -> bool {
        false
    }

    pub fn private_browsing(&self) -> bool {
        false
    }

    pub fn subscriptions_autoupdate(&self) -> bool {
        self.ctx.config().autoupdate_enabled && self.ctx.host().can_autoupdate()
    }

    pub fn subscriptions_fallback_errors(&self) -> u32 {
        self.ctx.config().fallback_errors
    }

    pub fn subscriptions_fallback_url(&self) -> &str {
        &self.ctx.config().fallback_url
    }
}
