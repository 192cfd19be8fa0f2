//! Dispatch loop
//!
//! The one task that owns the session state. Workers and callers never touch
//! the queue, the session context or the listeners directly: they post a
//! [`DispatchMsg`] and this task applies it, so every sink and listener runs
//! here, one at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mictl_protocol::{stack_select_frame, thread_select, CommandContext, Framing, MiCommandLine};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use crate::error::CommandError;
use crate::handle::{CommandHandle, CommandId, CommandOutcome};
use crate::listener::{CommandListener, EventListener, ListenerId, MiEvent, Registry};
use crate::run_state::{RunState, INTERNAL_THREAD_ID};
use crate::tables::{InFlightTable, QueuedTable};
use crate::token::TokenAllocator;

pub(crate) type DispatchSender = mpsc::UnboundedSender<DispatchMsg>;

/// Unit of work for the dispatch task
pub(crate) enum DispatchMsg {
    Enqueue(CommandHandle),
    /// Try to move the next queued command to the wire
    ProcessNext,
    Remove(CommandId),
    Completed {
        handle: CommandHandle,
        outcome: CommandOutcome,
    },
    Event(MiEvent),
    Shutdown,
    /// Handles the transmit worker still held when it stopped
    Cancelled(Vec<CommandHandle>),
    AddCommandListener(ListenerId, Arc<dyn CommandListener>),
    AddEventListener(ListenerId, Arc<dyn EventListener>),
    RemoveListener(ListenerId),
    SetRunState(Option<Arc<dyn RunState>>),
    SetUseThreadAndFrameOptions(bool),
    ResetCurrentThread,
    ResetCurrentFrame,
    /// Answered once every message posted before it has been applied
    Barrier(oneshot::Sender<()>),
}

/// Work for the transmit worker
pub(crate) enum TxItem {
    Send {
        handle: CommandHandle,
        /// Addressing to embed natively, when the command takes it
        target: Option<CommandContext>,
    },
    /// Stop after cancelling whatever is still in flight
    Terminate,
}

/// Thread and frame the backend currently has selected, as far as we know
#[derive(Debug, Default)]
struct SessionContext {
    current_thread: Option<String>,
    current_frame: Option<u32>,
}

pub(crate) struct Dispatcher {
    queued: QueuedTable,
    in_flight: Arc<InFlightTable>,
    tokens: TokenAllocator,
    command_ids: Arc<AtomicU64>,
    transmit: mpsc::UnboundedSender<TxItem>,
    me: mpsc::WeakUnboundedSender<DispatchMsg>,
    context: SessionContext,
    window_size: usize,
    /// Tokenized commands on the wire without a result yet
    occupancy: usize,
    use_thread_and_frame_options: bool,
    run_state: Option<Arc<dyn RunState>>,
    command_listeners: Registry<dyn CommandListener>,
    event_listeners: Registry<dyn EventListener>,
    stopped: bool,
}

pub(crate) struct DispatcherSettings {
    pub window_size: usize,
    pub use_thread_and_frame_options: bool,
}

impl Dispatcher {
    pub fn new(
        settings: DispatcherSettings,
        in_flight: Arc<InFlightTable>,
        command_ids: Arc<AtomicU64>,
        transmit: mpsc::UnboundedSender<TxItem>,
        me: mpsc::WeakUnboundedSender<DispatchMsg>,
    ) -> Self {
        Self {
            queued: QueuedTable::default(),
            in_flight,
            tokens: TokenAllocator::new(),
            command_ids,
            transmit,
            me,
            context: SessionContext::default(),
            window_size: settings.window_size.max(1),
            occupancy: 0,
            use_thread_and_frame_options: settings.use_thread_and_frame_options,
            run_state: None,
            command_listeners: Registry::default(),
            event_listeners: Registry::default(),
            stopped: false,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<DispatchMsg>) {
        debug!(window_size = self.window_size, "Dispatch loop started");
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        debug!("Dispatch loop finished");
    }

    fn handle(&mut self, msg: DispatchMsg) {
        match msg {
            DispatchMsg::Enqueue(handle) => self.enqueue(handle),
            DispatchMsg::ProcessNext => self.process_next(),
            DispatchMsg::Remove(id) => self.remove(id),
            DispatchMsg::Completed { handle, outcome } => self.complete(handle, outcome),
            DispatchMsg::Event(event) => {
                for listener in self.event_listeners.iter() {
                    listener.event_received(&event);
                }
            }
            DispatchMsg::Shutdown => self.shutdown(),
            DispatchMsg::Cancelled(handles) => {
                for handle in handles {
                    handle.resolve(Err(CommandError::ShutDown));
                }
            }
            DispatchMsg::AddCommandListener(id, listener) => self.command_listeners.add(id, listener),
            DispatchMsg::AddEventListener(id, listener) => self.event_listeners.add(id, listener),
            DispatchMsg::RemoveListener(id) => {
                let removed =
                    self.command_listeners.remove(id) | self.event_listeners.remove(id);
                if !removed {
                    debug!(?id, "Listener was not registered");
                }
            }
            DispatchMsg::SetRunState(run_state) => self.run_state = run_state,
            DispatchMsg::SetUseThreadAndFrameOptions(enabled) => {
                debug!(enabled, "Native thread/frame options toggled");
                self.use_thread_and_frame_options = enabled;
            }
            DispatchMsg::ResetCurrentThread => self.context.current_thread = None,
            DispatchMsg::ResetCurrentFrame => self.context.current_frame = None,
            DispatchMsg::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }

    fn enqueue(&mut self, handle: CommandHandle) {
        if self.stopped {
            handle.resolve(Err(CommandError::ShutDown));
            return;
        }

        for listener in self.command_listeners.iter() {
            listener.command_queued(&handle);
        }
        trace!(
            id = %handle.id(),
            command = %handle.command(),
            queued = self.queued.len() + 1,
            "Command queued"
        );
        self.queued.push(handle);

        // Scheduled as a separate message so listeners reacting to the
        // queued notification get a chance to run first.
        if self.occupancy < self.window_size {
            self.schedule();
        }
    }

    fn schedule(&self) {
        if let Some(me) = self.me.upgrade() {
            let _ = me.send(DispatchMsg::ProcessNext);
        }
    }

    fn remove(&mut self, id: CommandId) {
        match self.queued.remove(id) {
            Some(handle) => {
                debug!(id = %id, "Command removed before sending");
                for listener in self.command_listeners.iter() {
                    listener.command_removed(&handle);
                }
                handle.resolve(Err(CommandError::Removed));
            }
            None => debug!(id = %id, "Command not queued, nothing to remove"),
        }
    }

    fn process_next(&mut self) {
        if self.stopped || self.occupancy >= self.window_size {
            return;
        }
        let Some(mut handle) = self.queued.pop() else {
            return;
        };

        for listener in self.command_listeners.iter() {
            listener.command_sent(&handle);
        }

        let command = Arc::clone(handle.command());
        let native = self.use_thread_and_frame_options && command.supports_thread_and_frame_options();
        if !native {
            if let Some(ctx) = command.context() {
                self.synchronize_context(ctx);
            }
        }
        let target = if native { command.context().cloned() } else { None };

        let raw = handle.framing() == Framing::Raw;
        if !raw {
            handle.assign_token(self.tokens.next_token());
            self.occupancy += 1;
        }
        self.transmit(handle, target);

        // Raw commands take no slot in the window
        if raw {
            self.schedule();
        }
    }

    /// Select the command's thread and frame on the backend if they differ
    /// from what is currently selected
    fn synchronize_context(&mut self, ctx: &CommandContext) {
        let Some(run_state) = &self.run_state else {
            return;
        };
        let Some(thread) = ctx.thread_id.as_deref() else {
            return;
        };
        if !run_state.is_suspended(thread) {
            return;
        }

        if thread != INTERNAL_THREAD_ID && self.context.current_thread.as_deref() != Some(thread) {
            self.context.current_thread = Some(thread.to_string());
            self.context.current_frame = None;
            self.transmit_synthetic(thread_select(thread));
        }

        if let Some(level) = ctx.frame_level {
            if self.context.current_frame != Some(level) {
                self.context.current_frame = Some(level);
                self.transmit_synthetic(stack_select_frame(level));
            }
        }
    }

    fn transmit_synthetic(&mut self, command: MiCommandLine) {
        let id = CommandId(self.command_ids.fetch_add(1, Ordering::Relaxed));
        let mut handle = CommandHandle::new(id, Arc::new(command), None);
        handle.assign_token(self.tokens.next_token());
        self.occupancy += 1;
        self.transmit(handle, None);
    }

    fn transmit(&mut self, handle: CommandHandle, target: Option<CommandContext>) {
        if let Err(mpsc::error::SendError(item)) = self.transmit.send(TxItem::Send { handle, target }) {
            error!("Transmit worker is gone");
            if let TxItem::Send { handle, .. } = item {
                if handle.token().is_some() {
                    self.occupancy = self.occupancy.saturating_sub(1);
                }
                handle.resolve(Err(CommandError::ShutDown));
            }
        }
    }

    fn complete(&mut self, handle: CommandHandle, outcome: CommandOutcome) {
        if handle.token().is_some() {
            self.occupancy = self.occupancy.saturating_sub(1);
        }

        // The sink sees the outcome before any listener does
        handle.resolve(outcome.clone());
        for listener in self.command_listeners.iter() {
            listener.command_done(&handle, &outcome);
        }

        self.process_next();
    }

    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        let queued = self.queued.drain();
        let in_flight = self.in_flight.drain();
        debug!(
            queued = queued.len(),
            in_flight = in_flight.len(),
            "Stopping command processing"
        );

        for handle in queued.into_iter().chain(in_flight) {
            handle.resolve(Err(CommandError::ShutDown));
        }
        self.occupancy = 0;

        let _ = self.transmit.send(TxItem::Terminate);
    }
}
