//! Thread run state, consulted before switching the backend's selected thread
//!
//! Selecting a thread or frame only makes sense while the thread is stopped.
//! Without a registered [`RunState`] the engine never switches.

use std::collections::HashMap;

use mictl_protocol::{AsyncKind, MiAsyncRecord, MiOobRecord, MiValue};
use parking_lot::RwLock;
use tracing::trace;

use crate::listener::{EventListener, MiEvent};

/// Thread id the backend uses internally for single-threaded programs
pub const INTERNAL_THREAD_ID: &str = "0";

/// Answers whether a thread is currently suspended
pub trait RunState: Send + Sync {
    fn is_suspended(&self, thread_id: &str) -> bool;
}

#[derive(Debug, Default)]
struct Threads {
    /// Per-thread state; `true` means suspended
    known: HashMap<String, bool>,
    /// State of threads without an entry, set by `all` notifications
    default_suspended: bool,
}

/// Run state fed from `*running`/`*stopped` and thread notifications
#[derive(Debug, Default)]
pub struct ThreadStateTracker {
    threads: RwLock<Threads>,
}

impl ThreadStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one async record
    pub fn update(&self, record: &MiAsyncRecord) {
        match (record.kind, record.class.as_str()) {
            (AsyncKind::Exec, "running") => {
                let thread = record.const_field("thread-id").unwrap_or("all");
                self.set(thread, false);
            }
            (AsyncKind::Exec, "stopped") => match record.field("stopped-threads") {
                Some(MiValue::Const(all)) if all == "all" => self.set("all", true),
                Some(list @ MiValue::List(_)) => {
                    for value in list.list_values() {
                        if let Some(thread) = value.as_const() {
                            self.set(thread, true);
                        }
                    }
                }
                _ => {
                    let thread = record.const_field("thread-id").unwrap_or("all");
                    self.set(thread, true);
                }
            },
            (AsyncKind::Notify, "thread-created") => {
                if let Some(id) = record.const_field("id") {
                    let mut threads = self.threads.write();
                    let state = threads.default_suspended;
                    threads.known.insert(id.to_string(), state);
                }
            }
            (AsyncKind::Notify, "thread-exited") => {
                if let Some(id) = record.const_field("id") {
                    self.threads.write().known.remove(id);
                }
            }
            _ => {}
        }
    }

    fn set(&self, thread: &str, suspended: bool) {
        trace!(thread, suspended, "Thread run state changed");
        let mut threads = self.threads.write();
        if thread == "all" {
            threads.default_suspended = suspended;
            for state in threads.known.values_mut() {
                *state = suspended;
            }
        } else {
            threads.known.insert(thread.to_string(), suspended);
        }
    }

    /// Ids of the threads seen so far
    pub fn thread_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.threads.read().known.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl RunState for ThreadStateTracker {
    fn is_suspended(&self, thread_id: &str) -> bool {
        let threads = self.threads.read();
        threads
            .known
            .get(thread_id)
            .copied()
            .unwrap_or(threads.default_suspended)
    }
}

impl EventListener for ThreadStateTracker {
    fn event_received(&self, event: &MiEvent) {
        if let Some(MiOobRecord::Async(record)) = event.oob() {
            self.update(record);
        }
    }
}
