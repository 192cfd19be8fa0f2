//! Pending-command tables and out-of-band history

use std::collections::VecDeque;

use dashmap::DashMap;
use mictl_protocol::Token;

use crate::handle::{CommandHandle, CommandId};

/// Commands accepted but not yet handed to the transmit worker
#[derive(Debug, Default)]
pub(crate) struct QueuedTable {
    handles: VecDeque<CommandHandle>,
}

impl QueuedTable {
    pub fn push(&mut self, handle: CommandHandle) {
        self.handles.push_back(handle);
    }

    pub fn pop(&mut self) -> Option<CommandHandle> {
        self.handles.pop_front()
    }

    pub fn remove(&mut self, id: CommandId) -> Option<CommandHandle> {
        let index = self.handles.iter().position(|h| h.id() == id)?;
        self.handles.remove(index)
    }

    pub fn drain(&mut self) -> Vec<CommandHandle> {
        self.handles.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Commands written to the backend and awaiting their result record
///
/// Shared between the transmit worker (registers), the receive worker
/// (takes on a matching result) and failure injection (takes on timeout).
#[derive(Debug, Default)]
pub(crate) struct InFlightTable {
    handles: DashMap<Token, CommandHandle>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle previously holding `token`, if the counter wrapped
    /// onto a command that is still waiting
    pub fn register(&self, token: Token, handle: CommandHandle) -> Option<CommandHandle> {
        self.handles.insert(token, handle)
    }

    pub fn take(&self, token: Token) -> Option<CommandHandle> {
        self.handles.remove(&token).map(|(_, handle)| handle)
    }

    /// Remove every entry, oldest token first
    pub fn drain(&self) -> Vec<CommandHandle> {
        let mut tokens: Vec<Token> = self.handles.iter().map(|entry| *entry.key()).collect();
        tokens.sort();
        tokens.into_iter().filter_map(|t| self.take(t)).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[cfg(test)]
    pub fn contains(&self, token: Token) -> bool {
        self.handles.contains_key(&token)
    }
}

/// Bounded history, dropping the oldest entry past its capacity
#[derive(Debug, Clone)]
pub(crate) struct History<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T: Clone> History<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn take(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mictl_protocol::MiCommandLine;
    use std::sync::Arc;

    fn handle(id: u64) -> CommandHandle {
        CommandHandle::new(CommandId(id), Arc::new(MiCommandLine::new("-x")), None)
    }

    // ==================== QueuedTable Tests ====================

    #[test]
    fn test_queued_fifo() {
        let mut queued = QueuedTable::default();
        queued.push(handle(1));
        queued.push(handle(2));

        assert_eq!(queued.len(), 2);
        assert_eq!(queued.pop().map(|h| h.id()), Some(CommandId(1)));
        assert_eq!(queued.pop().map(|h| h.id()), Some(CommandId(2)));
        assert!(queued.pop().is_none());
    }

    #[test]
    fn test_queued_remove_by_id() {
        let mut queued = QueuedTable::default();
        for id in 1..=3 {
            queued.push(handle(id));
        }

        assert_eq!(queued.remove(CommandId(2)).map(|h| h.id()), Some(CommandId(2)));
        assert!(queued.remove(CommandId(2)).is_none());

        let remaining: Vec<_> = queued.drain().into_iter().map(|h| h.id()).collect();
        assert_eq!(remaining, vec![CommandId(1), CommandId(3)]);
        assert!(queued.is_empty());
    }

    // ==================== InFlightTable Tests ====================

    #[test]
    fn test_in_flight_take_once() {
        let table = InFlightTable::new();
        table.register(Token(7), handle(1));

        assert!(table.contains(Token(7)));
        assert_eq!(table.take(Token(7)).map(|h| h.id()), Some(CommandId(1)));
        assert!(table.take(Token(7)).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_in_flight_drain_sorted() {
        let table = InFlightTable::new();
        table.register(Token(9), handle(3));
        table.register(Token(2), handle(1));
        table.register(Token(5), handle(2));

        let ids: Vec<_> = table.drain().into_iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec![CommandId(1), CommandId(2), CommandId(3)]);
        assert_eq!(table.len(), 0);
    }

    // ==================== History Tests ====================

    #[test]
    fn test_history_drops_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(i);
        }
        assert_eq!(history.snapshot(), vec![2, 3, 4]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_history_take_clears() {
        let mut history = History::new(20);
        history.push("a");
        history.push("b");

        assert_eq!(history.take(), vec!["a", "b"]);
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_history_zero_capacity_keeps_latest() {
        let mut history = History::new(0);
        history.push(1);
        history.push(2);
        assert_eq!(history.snapshot(), vec![2]);
    }
}
