//! Line Input Stream
//!
//! Sequential line reader over a whole-file read. Streams opened from
//! another stream share its line buffer but keep their own cursor.

use crate::file::VirtualFile;
use crate::host::HostError;
use std::rc::Rc;
use tracing::trace;

/// Out-parameter filled by [`LineInputStream::read_line`].
///
/// The value is left untouched when there is nothing left to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineRecord {
    pub value: String,
}

/// Where a stream takes its lines from.
pub enum InputSource<'a> {
    File(&'a VirtualFile),
    Stream(&'a LineInputStream),
}

impl<'a> From<&'a VirtualFile> for InputSource<'a> {
    fn from(file: &'a VirtualFile) -> Self {
        Self::File(file)
    }
}

impl<'a> From<&'a LineInputStream> for InputSource<'a> {
    fn from(stream: &'a LineInputStream) -> Self {
        Self::Stream(stream)
    }
}

/// Line reader with a forward-only cursor.
#[derive(Debug, Clone, Default)]
pub struct LineInputStream {
    lines: Rc<Vec<String>>,
    cursor: usize,
}

impl LineInputStream {
    /// An empty, uninitialised stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `new()` followed by `init(file)`.
    pub fn open(file: &VirtualFile) -> Result<Self, HostError> {
        let mut stream = Self::new();
        stream.init(file)?;
        Ok(stream)
    }

    /// Load lines from a file, or share them with another stream.
    ///
    /// The cursor starts at 0 either way, whatever the source cursor is.
    pub fn init<'a>(&mut self, source: impl Into<InputSource<'a>>) -> Result<(), HostError> {
        self.lines = match source.into() {
            InputSource::Stream(other) => other.lines.clone(),
            InputSource::File(file) => {
                let content = file.host().file_read(file.path())?;
                Rc::new(content.split('\n').map(str::to_string).collect())
            }
        };
        self.cursor = 0;
        trace!("Input stream initialised with {} lines", self.lines.len());
        Ok(())
    }

    /// Read the line under the cursor into `record`, then advance.
    ///
    /// Returns whether a *further* call would yield data, so the call that
    /// reads the last line already returns `false`. Read first, then check.
    pub fn read_line(&mut self, record: &mut LineRecord) -> bool {
        if let Some(line) = self.lines.get(self.cursor) {
            record.value.clone_from(line);
        }
        self.cursor = self.cursor.saturating_add(1);
        self.cursor < self.lines.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Whether both streams read from the same line buffer.
    pub fn shares_lines_with(&self, other: &LineInputStream) -> bool {
        Rc::ptr_eq(&self.lines, &other.lines)
    }

    pub fn close(&mut self) {}
}
