//! Error reporting for callbacks run on the host event loop.

use crate::host::Host;
use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::fmt;
use tracing::warn;

/// Failure raised by an engine callback.
#[derive(Debug)]
pub enum CallbackError {
    /// Plain message; also surfaced to the user as a toast
    Message(String),
    /// Structured error, reported with its backtrace when one was captured
    Error(anyhow::Error),
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Error(error) => write!(f, "{:#}", error),
        }
    }
}

impl From<anyhow::Error> for CallbackError {
    fn from(error: anyhow::Error) -> Self {
        Self::Error(error)
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl CallbackError {
    /// Turn a caught panic payload into a reportable error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self::Message(message)
    }
}

/// Report a callback failure through the host without propagating it.
pub fn report_error(host: &dyn Host, error: &CallbackError) {
    warn!("Callback failed: {}", error);
    host.print(&format!("Error: {}", error));

    match error {
        CallbackError::Message(message) => host.show_toast(message),
        CallbackError::Error(error) => {
            let backtrace = error.backtrace();
            if backtrace.status() == BacktraceStatus::Captured {
                host.print(&backtrace.to_string());
            }
        }
    }
}
