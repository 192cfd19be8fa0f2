//! Command lifecycle and event observers
//!
//! Listeners are only ever invoked from the dispatch task, one at a time, in
//! registration order.

use std::sync::Arc;

use mictl_protocol::{MiOobRecord, MiResultRecord, MiStreamRecord};
use serde::Serialize;

use crate::handle::{CommandHandle, CommandOutcome};

/// Something the backend reported without being asked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MiEvent {
    /// An out-of-band record, with the stream records that preceded it
    Oob {
        record: MiOobRecord,
        preceding_streams: Vec<MiStreamRecord>,
    },
    /// A result record whose token matched no command in flight
    UnmatchedResult { record: MiResultRecord },
}

impl MiEvent {
    pub fn oob(&self) -> Option<&MiOobRecord> {
        match self {
            Self::Oob { record, .. } => Some(record),
            Self::UnmatchedResult { .. } => None,
        }
    }
}

/// Observer of command progress
pub trait CommandListener: Send + Sync {
    fn command_queued(&self, _handle: &CommandHandle) {}

    /// The command left the queue for the wire
    fn command_sent(&self, _handle: &CommandHandle) {}

    /// The command was withdrawn before it was sent
    fn command_removed(&self, _handle: &CommandHandle) {}

    fn command_done(&self, _handle: &CommandHandle, _outcome: &CommandOutcome) {}
}

/// Observer of backend events
pub trait EventListener: Send + Sync {
    fn event_received(&self, event: &MiEvent);
}

/// Registration handle for a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Ordered listener list
pub(crate) struct Registry<L: ?Sized> {
    entries: Vec<(ListenerId, Arc<L>)>,
}

impl<L: ?Sized> Default for Registry<L> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<L: ?Sized> Registry<L> {
    pub fn add(&mut self, id: ListenerId, listener: Arc<L>) {
        self.entries.push((id, listener));
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        before != self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<L>> {
        self.entries.iter().map(|(_, listener)| listener)
    }
}
