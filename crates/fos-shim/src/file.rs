//! Virtual File Handle
//!
//! A path plus a host handle. Nothing is cached: every query goes straight
//! to the host, and directories are assumed to exist already.

use crate::context::ShimContext;
use crate::host::{Host, HostError};
use std::fmt;
use std::rc::Rc;

/// Path-based proxy over the host file primitives.
#[derive(Clone)]
pub struct VirtualFile {
    path: String,
    separator: char,
    host: Rc<dyn Host>,
}

/// Parent directory stand-in; creating it does nothing.
#[derive(Debug, Clone, Copy)]
pub struct ParentDirectory;

impl ParentDirectory {
    /// No-op: directories are never created by the shim.
    pub fn create(&self) {}
}

impl VirtualFile {
    pub fn new(ctx: &ShimContext, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            separator: ctx.separator(),
            host: ctx.host().clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    /// Trailing path segment.
    pub fn leaf_name(&self) -> &str {
        match self.path.rfind(self.separator) {
            Some(index) => &self.path[index + self.separator.len_utf8()..],
            None => &self.path,
        }
    }

    /// Replace the trailing path segment.
    pub fn set_leaf_name(&mut self, name: &str) {
        let keep = self
            .path
            .rfind(self.separator)
            .map(|index| index + self.separator.len_utf8())
            .unwrap_or(0);
        self.path.truncate(keep);
        self.path.push_str(name);
    }

    /// Append a path segment using the host separator.
    pub fn append(&mut self, segment: &str) {
        self.path.push(self.separator);
        self.path.push_str(segment);
    }

    pub fn exists(&self) -> bool {
        self.host.file_exists(&self.path)
    }

    pub fn remove(&self) -> Result<(), HostError> {
        self.host.file_remove(&self.path)
    }

    /// Rename the file on the host.
    ///
    /// The handle keeps pointing at its old path, exactly like every other
    /// pass-through operation here.
    pub fn move_to(&self, new_path: &str) -> Result<(), HostError> {
        self.host.file_rename(&self.path, new_path)
    }

    /// Last modification time in milliseconds.
    pub fn last_modified_time(&self) -> Result<u64, HostError> {
        self.host.file_last_modified(&self.path)
    }

    pub fn parent(&self) -> ParentDirectory {
        ParentDirectory
    }

    pub fn normalize(&mut self) {}
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFile").field("path", &self.path).finish()
    }
}

impl fmt::Display for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
