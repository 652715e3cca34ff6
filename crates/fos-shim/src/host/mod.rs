//! Host Primitives
//!
//! The minimal surface a host runtime exposes to the shim: console output,
//! toasts, one-shot timeouts, whole-file I/O, locale and status reporting.
//! Everything richer (files, streams, timers, codecs) is built on top of
//! this trait.

mod memory;
mod native;

pub use memory::MemoryHost;
pub use native::NativeHost;

use std::io;
use thiserror::Error;

/// One-shot callback handed to [`Host::set_timeout`].
pub type TimerCallback = Box<dyn FnOnce()>;

/// Errors raised by host primitives.
///
/// The shim never translates or retries these; they reach the caller as-is.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed opening file: {path}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("File write error: {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("File couldn't be renamed: {from} -> {to}")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },

    #[error("File couldn't be removed: {path}")]
    Remove {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("File couldn't be inspected: {path}")]
    Stat {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Module couldn't be loaded: {0}")]
    Module(String),
}

impl HostError {
    pub(crate) fn not_found(path: &str) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
    }
}

/// Primitive calls provided by the embedding runtime.
///
/// All calls are synchronous except [`set_timeout`](Host::set_timeout),
/// which queues the callback on the host's event loop.
pub trait Host {
    /// Write a line to the host console.
    fn print(&self, text: &str);

    /// Surface a short message to the user.
    fn show_toast(&self, text: &str);

    /// Run `callback` once after `delay_ms` milliseconds.
    fn set_timeout(&self, callback: TimerCallback, delay_ms: u64);

    /// Whether `path` names an existing regular file.
    fn file_exists(&self, path: &str) -> bool;

    /// Read the whole file as text.
    fn file_read(&self, path: &str) -> Result<String, HostError>;

    /// Replace the whole file with `data`.
    fn file_write(&self, path: &str, data: &str) -> Result<(), HostError>;

    fn file_rename(&self, from: &str, to: &str) -> Result<(), HostError>;

    fn file_remove(&self, path: &str) -> Result<(), HostError>;

    /// Last modification time in milliseconds since the Unix epoch.
    fn file_last_modified(&self, path: &str) -> Result<u64, HostError>;

    /// Current locale string, e.g. `en-US`.
    fn locale(&self) -> String;

    /// Whether automatic subscription updates are allowed right now.
    fn can_autoupdate(&self) -> bool;

    /// Report a subscription status tag with a timestamp in milliseconds.
    fn set_status(&self, status: &str, timestamp_ms: u64);

    /// Make a named engine module available.
    fn load(&self, module: &str) -> Result<(), HostError>;
}
