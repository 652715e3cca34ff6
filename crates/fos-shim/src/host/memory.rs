//! In-memory host for embedding tests.

use super::{Host, HostError, TimerCallback};
use crate::timer_queue::TimerQueue;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

struct MemoryFile {
    data: String,
    modified_ms: u64,
}

/// Host that keeps files in a map and records every side effect.
///
/// Modification times come from a logical clock that ticks once per write,
/// so tests can order writes without sleeping.
pub struct MemoryHost {
    files: RefCell<HashMap<String, MemoryFile>>,
    clock: Cell<u64>,
    timers: Rc<TimerQueue>,
    locale: RefCell<String>,
    autoupdate: Cell<bool>,
    prints: RefCell<Vec<String>>,
    toasts: RefCell<Vec<String>>,
    statuses: RefCell<Vec<(String, u64)>>,
    loaded: RefCell<Vec<String>>,
    writes: Cell<usize>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            files: RefCell::new(HashMap::new()),
            clock: Cell::new(0),
            timers: Rc::new(TimerQueue::new()),
            locale: RefCell::new("en-US".to_string()),
            autoupdate: Cell::new(true),
            prints: RefCell::new(Vec::new()),
            toasts: RefCell::new(Vec::new()),
            statuses: RefCell::new(Vec::new()),
            loaded: RefCell::new(Vec::new()),
            writes: Cell::new(0),
        }
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without counting it as a write.
    pub fn insert_file(&self, path: &str, data: &str) {
        let modified_ms = self.tick();
        self.files.borrow_mut().insert(
            path.to_string(),
            MemoryFile {
                data: data.to_string(),
                modified_ms,
            },
        );
    }

    /// Current contents of a file.
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).map(|f| f.data.clone())
    }

    pub fn set_locale(&self, locale: &str) {
        *self.locale.borrow_mut() = locale.to_string();
    }

    pub fn set_autoupdate(&self, allowed: bool) {
        self.autoupdate.set(allowed);
    }

    pub fn timers(&self) -> Rc<TimerQueue> {
        self.timers.clone()
    }

    pub fn prints(&self) -> Vec<String> {
        self.prints.borrow().clone()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.toasts.borrow().clone()
    }

    pub fn statuses(&self) -> Vec<(String, u64)> {
        self.statuses.borrow().clone()
    }

    pub fn loaded_modules(&self) -> Vec<String> {
        self.loaded.borrow().clone()
    }

    /// Number of `file_write` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    fn tick(&self) -> u64 {
        let now = self.clock.get() + 1;
        self.clock.set(now);
        now
    }
}

impl Host for MemoryHost {
    fn print(&self, text: &str) {
        self.prints.borrow_mut().push(text.to_string());
    }

    fn show_toast(&self, text: &str) {
        self.toasts.borrow_mut().push(text.to_string());
    }

    fn set_timeout(&self, callback: TimerCallback, delay_ms: u64) {
        self.timers.schedule(callback, delay_ms);
    }

    fn file_exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn file_read(&self, path: &str) -> Result<String, HostError> {
        self.file(path).ok_or_else(|| HostError::Open {
            path: path.to_string(),
            source: HostError::not_found(path),
        })
    }

    fn file_write(&self, path: &str, data: &str) -> Result<(), HostError> {
        self.writes.set(self.writes.get() + 1);
        self.insert_file(path, data);
        Ok(())
    }

    fn file_rename(&self, from: &str, to: &str) -> Result<(), HostError> {
        let mut files = self.files.borrow_mut();
        let file = files.remove(from).ok_or_else(|| HostError::Rename {
            from: from.to_string(),
            to: to.to_string(),
            source: HostError::not_found(from),
        })?;
        files.insert(to.to_string(), file);
        Ok(())
    }

    fn file_remove(&self, path: &str) -> Result<(), HostError> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| HostError::Remove {
                path: path.to_string(),
                source: HostError::not_found(path),
            })
    }

    fn file_last_modified(&self, path: &str) -> Result<u64, HostError> {
        self.files
            .borrow()
            .get(path)
            .map(|f| f.modified_ms)
            .ok_or_else(|| HostError::Stat {
                path: path.to_string(),
                source: HostError::not_found(path),
            })
    }

    fn locale(&self) -> String {
        self.locale.borrow().clone()
    }

    fn can_autoupdate(&self) -> bool {
        self.autoupdate.get()
    }

    fn set_status(&self, status: &str, timestamp_ms: u64) {
        self.statuses
            .borrow_mut()
            .push((status.to_string(), timestamp_ms));
    }

    fn load(&self, module: &str) -> Result<(), HostError> {
        self.loaded.borrow_mut().push(module.to_string());
        Ok(())
    }
}
