//! Native host backed by the local filesystem and a timer queue.

use super::{Host, HostError, TimerCallback};
use crate::config::ShimConfig;
use crate::timer_queue::TimerQueue;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// Host implementation for running the shim as a native process.
///
/// Console output and toasts go to `tracing`; timeouts land on an internal
/// [`TimerQueue`] that the embedder drives.
pub struct NativeHost {
    timers: Rc<TimerQueue>,
    locale: String,
    autoupdate: bool,
    status: RefCell<Option<(String, u64)>>,
    loaded: RefCell<Vec<String>>,
}

impl NativeHost {
    pub fn new(config: &ShimConfig) -> Self {
        let locale = config.locale.clone().unwrap_or_else(system_locale);
        info!("Native host ready (locale: {})", locale);

        Self {
            timers: Rc::new(TimerQueue::new()),
            locale,
            autoupdate: config.autoupdate_enabled,
            status: RefCell::new(None),
            loaded: RefCell::new(Vec::new()),
        }
    }

    /// Queue backing `set_timeout`.
    pub fn timers(&self) -> Rc<TimerQueue> {
        self.timers.clone()
    }

    /// Last status reported through `set_status`.
    pub fn last_status(&self) -> Option<(String, u64)> {
        self.status.borrow().clone()
    }

    /// Modules loaded so far, in load order.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.loaded.borrow().clone()
    }
}

/// Locale from the usual POSIX environment variables, `en-US` otherwise.
fn system_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .map(|value| {
            // en_US.UTF-8 -> en-US
            let tag = value.split('.').next().unwrap_or(value.as_str());
            tag.replace('_', "-")
        })
        .unwrap_or_else(|| "en-US".to_string())
}

impl Host for NativeHost {
    fn print(&self, text: &str) {
        info!(target: "engine", "{}", text);
    }

    fn show_toast(&self, text: &str) {
        warn!(target: "toast", "{}", text);
    }

    fn set_timeout(&self, callback: TimerCallback, delay_ms: u64) {
        self.timers.schedule(callback, delay_ms);
    }

    fn file_exists(&self, path: &str) -> bool {
        debug!("fileExists({})", path);
        fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
    }

    fn file_read(&self, path: &str) -> Result<String, HostError> {
        debug!("fileRead({})", path);
        fs::read_to_string(path).map_err(|source| HostError::Open {
            path: path.to_string(),
            source,
        })
    }

    fn file_write(&self, path: &str, data: &str) -> Result<(), HostError> {
        debug!("fileWrite({}, {} bytes)", path, data.len());
        if let Err(source) = fs::write(path, data) {
            // Never leave a truncated file behind
            let _ = fs::remove_file(path);
            return Err(HostError::Write {
                path: path.to_string(),
                source,
            });
        }
        Ok(())
    }

    fn file_rename(&self, from: &str, to: &str) -> Result<(), HostError> {
        debug!("fileRename({}, {})", from, to);
        fs::rename(from, to).map_err(|source| HostError::Rename {
            from: from.to_string(),
            to: to.to_string(),
            source,
        })
    }

    fn file_remove(&self, path: &str) -> Result<(), HostError> {
        debug!("fileRemove({})", path);
        fs::remove_file(path).map_err(|source| HostError::Remove {
            path: path.to_string(),
            source,
        })
    }

    fn file_last_modified(&self, path: &str) -> Result<u64, HostError> {
        debug!("fileLastModified({})", path);
        let stat_error = |source: std::io::Error| HostError::Stat {
            path: path.to_string(),
            source,
        };
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(stat_error)?;
        let since_epoch = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|e| stat_error(std::io::Error::other(e)))?;
        Ok(since_epoch.as_millis() as u64)
    }

    fn locale(&self) -> String {
        self.locale.clone()
    }

    fn can_autoupdate(&self) -> bool {
        self.autoupdate
    }

    fn set_status(&self, status: &str, timestamp_ms: u64) {
        info!("Subscription status: {} ({})", status, timestamp_ms);
        *self.status.borrow_mut() = Some((status.to_string(), timestamp_ms));
    }

    fn load(&self, module: &str) -> Result<(), HostError> {
        if module.is_empty() {
            return Err(HostError::Module("empty module name".to_string()));
        }
        debug!("Loading engine module {}", module);
        self.loaded.borrow_mut().push(module.to_string());
        Ok(())
    }
}
