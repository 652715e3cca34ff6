//! Buffered Output Stream
//!
//! Accumulates strings in memory and writes them to the host file in one go
//! on `close`/`finish`. A stream opened from another stream shares its target
//! and buffer, so writes through either handle are visible to both.
//!
//! The shared buffer is `Rc<RefCell<..>>`: single-threaded only. Concurrent
//! writers would need a lock around the buffer to keep that visibility.

use crate::file::VirtualFile;
use crate::host::HostError;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Errors from output streams
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Output stream used before init")]
    NotInitialized,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Where a stream writes to.
pub enum OutputTarget<'a> {
    File(&'a VirtualFile),
    Stream(&'a OutputStream),
}

impl<'a> From<&'a VirtualFile> for OutputTarget<'a> {
    fn from(file: &'a VirtualFile) -> Self {
        Self::File(file)
    }
}

impl<'a> From<&'a OutputStream> for OutputTarget<'a> {
    fn from(stream: &'a OutputStream) -> Self {
        Self::Stream(stream)
    }
}

#[derive(Debug)]
struct SharedOutput {
    target: VirtualFile,
    buffer: RefCell<Vec<String>>,
}

/// Accumulate-then-flush writer over a [`VirtualFile`].
#[derive(Debug, Clone, Default)]
pub struct OutputStream {
    shared: Option<Rc<SharedOutput>>,
}

impl OutputStream {
    /// An uninitialised stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `new()` followed by `init(file)`.
    pub fn open(file: &VirtualFile) -> Self {
        let mut stream = Self::new();
        stream.init(file);
        stream
    }

    /// Target a file with an empty buffer, or alias another stream.
    ///
    /// Initialising from an uninitialised stream leaves this one
    /// uninitialised too.
    pub fn init<'a>(&mut self, target: impl Into<OutputTarget<'a>>) {
        self.shared = match target.into() {
            OutputTarget::Stream(other) => other.shared.clone(),
            OutputTarget::File(file) => Some(Rc::new(SharedOutput {
                target: file.clone(),
                buffer: RefCell::new(Vec::new()),
            })),
        };
    }

    fn shared(&self) -> Result<&SharedOutput, StreamError> {
        self.shared.as_deref().ok_or(StreamError::NotInitialized)
    }

    /// Append to the buffer.
    pub fn write_string(&self, s: &str) -> Result<(), StreamError> {
        self.shared()?.buffer.borrow_mut().push(s.to_string());
        Ok(())
    }

    /// Everything buffered so far, joined.
    pub fn contents(&self) -> String {
        self.shared
            .as_ref()
            .map(|shared| shared.buffer.borrow().concat())
            .unwrap_or_default()
    }

    /// Target file, once initialised.
    pub fn target(&self) -> Option<&VirtualFile> {
        self.shared.as_ref().map(|shared| &shared.target)
    }

    /// Whether both streams write through the same buffer.
    pub fn shares_buffer_with(&self, other: &OutputStream) -> bool {
        match (&self.shared, &other.shared) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Write the whole buffer to the target, replacing its content.
    ///
    /// The buffer is kept, so closing again rewrites the same content.
    pub fn close(&self) -> Result<(), StreamError> {
        let shared = self.shared()?;
        let data = shared.buffer.borrow().concat();
        debug!("Flushing {} bytes to {}", data.len(), shared.target);
        shared.target.host().file_write(shared.target.path(), &data)?;
        Ok(())
    }

    pub fn finish(&self) -> Result<(), StreamError> {
        self.close()
    }

    /// No-op; data only reaches the host on close/finish.
    pub fn flush(&self) {}
}
