//! `MiControl`: the public face of the engine
//!
//! Owns the channels into the dispatch task and the worker handles. All
//! methods are non-blocking; outcomes arrive through completion sinks or the
//! typed receivers returned by [`MiControl::submit`].

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use mictl_protocol::{MiCommand, MiLineCodec, Token, WireCommand};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ControlConfig;
use crate::dispatch::{DispatchMsg, DispatchSender, Dispatcher, DispatcherSettings};
use crate::error::{BackendError, CommandError, FailureCode};
use crate::handle::{CommandHandle, CommandId, CompletionSink};
use crate::listener::{CommandListener, EventListener, ListenerId};
use crate::receive::{run_error_channel, RxWorker};
use crate::run_state::RunState;
use crate::tables::InFlightTable;
use crate::trace::MiTrace;
use crate::transmit::TxWorker;

/// Backend output stream
pub type BackendReader = Box<dyn AsyncRead + Send + Unpin>;

/// Backend input stream
pub type BackendWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Byte streams connecting the engine to a backend
pub struct BackendStreams {
    /// Lines the backend prints (its stdout)
    pub reader: BackendReader,
    /// Where commands are written (its stdin)
    pub writer: BackendWriter,
    /// The backend's own error output, drained into console events
    pub errors: Option<BackendReader>,
}

impl BackendStreams {
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            errors: None,
        }
    }

    pub fn with_errors(mut self, errors: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.errors = Some(Box::new(errors));
        self
    }
}

/// Result of a typed command
pub type TypedOutcome<C> = Result<<C as MiCommand>::Output, CommandError>;

pub struct MiControl {
    dispatch: DispatchSender,
    in_flight: Arc<InFlightTable>,
    active: AtomicBool,
    command_ids: Arc<AtomicU64>,
    next_listener_id: AtomicU64,
    trace: Arc<MiTrace>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl MiControl {
    /// Start the engine over `streams`; must be called inside a tokio runtime
    pub fn start(streams: BackendStreams, config: &ControlConfig) -> Self {
        Self::start_with_trace(streams, config, MiTrace::default())
    }

    pub fn start_with_trace(
        streams: BackendStreams,
        config: &ControlConfig,
        trace: MiTrace,
    ) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let (transmit_tx, transmit_rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(InFlightTable::new());
        let command_ids = Arc::new(AtomicU64::new(1));
        let trace = Arc::new(trace);
        let codec = MiLineCodec::with_max_length(config.max_line_length);

        let dispatcher = Dispatcher::new(
            DispatcherSettings {
                window_size: config.window_size,
                use_thread_and_frame_options: config.use_thread_and_frame_options,
            },
            Arc::clone(&in_flight),
            Arc::clone(&command_ids),
            transmit_tx,
            dispatch_tx.downgrade(),
        );
        // Ends once every sender is gone, after the workers below
        tokio::spawn(dispatcher.run(dispatch_rx));

        let mut workers = Vec::with_capacity(3);
        let transmit = TxWorker::new(
            streams.writer,
            codec.clone(),
            Arc::clone(&in_flight),
            dispatch_tx.clone(),
            Arc::clone(&trace),
        );
        workers.push(tokio::spawn(transmit.run(transmit_rx)));

        let receive = RxWorker::new(
            streams.reader,
            codec.clone(),
            Arc::clone(&in_flight),
            dispatch_tx.clone(),
            Arc::clone(&trace),
            config.oob_history,
        );
        workers.push(tokio::spawn(receive.run()));

        if let Some(errors) = streams.errors {
            workers.push(tokio::spawn(run_error_channel(errors, codec, dispatch_tx.clone())));
        }

        debug!(
            window_size = config.window_size,
            oob_history = config.oob_history,
            native_targeting = config.use_thread_and_frame_options,
            "MI control started"
        );

        Self {
            dispatch: dispatch_tx,
            in_flight,
            active: AtomicBool::new(true),
            command_ids,
            next_listener_id: AtomicU64::new(1),
            trace,
            workers: Mutex::new(workers),
        }
    }

    /// Queue a command; `sink` receives its outcome exactly once
    ///
    /// After shutdown the sink is called right away with
    /// [`CommandError::ShutDown`].
    pub fn queue_command(
        &self,
        command: Arc<dyn WireCommand>,
        sink: Option<CompletionSink>,
    ) -> CommandId {
        let id = CommandId(self.command_ids.fetch_add(1, Ordering::Relaxed));
        let handle = CommandHandle::new(id, command, sink);

        if !self.is_active() {
            debug!(id = %id, command = %handle.command(), "Command rejected, control is shut down");
            handle.resolve(Err(CommandError::ShutDown));
            return id;
        }

        if let Err(mpsc::error::SendError(msg)) = self.dispatch.send(DispatchMsg::Enqueue(handle)) {
            if let DispatchMsg::Enqueue(handle) = msg {
                handle.resolve(Err(CommandError::ShutDown));
            }
        }
        id
    }

    /// Queue a typed command, receiving its decoded result
    pub fn submit<C: MiCommand>(
        &self,
        command: C,
    ) -> (CommandId, oneshot::Receiver<TypedOutcome<C>>) {
        let (tx, rx) = oneshot::channel();
        let command = Arc::new(command);
        let decoder = Arc::clone(&command);

        let sink: CompletionSink = Box::new(move |outcome| {
            let result = outcome.and_then(|output| {
                decoder.decode(output).map_err(|source| CommandError::Decode {
                    command: decoder.to_string(),
                    source,
                })
            });
            // The caller may have stopped waiting
            let _ = tx.send(result);
        });

        let id = self.queue_command(command, Some(sink));
        (id, rx)
    }

    /// Queue a typed command and wait for its result
    pub async fn execute<C: MiCommand>(&self, command: C) -> TypedOutcome<C> {
        let (_, rx) = self.submit(command);
        rx.await.unwrap_or(Err(CommandError::ShutDown))
    }

    /// Withdraw a command that has not been sent yet
    ///
    /// Its sink receives [`CommandError::Removed`]. Commands already on the
    /// wire are unaffected.
    pub fn remove_command(&self, id: CommandId) {
        self.post(DispatchMsg::Remove(id));
    }

    /// Fail the in-flight command carrying `token` without waiting for the backend
    ///
    /// A reply that arrives later for the same token is reported as an
    /// unmatched result event. Returns false when no such command is in flight.
    pub fn command_failed(
        &self,
        token: Token,
        code: FailureCode,
        message: impl Into<String>,
    ) -> bool {
        let Some(handle) = self.in_flight.take(token) else {
            debug!(%token, "No command in flight to fail");
            return false;
        };

        let error = BackendError::new(handle.command().to_string(), code, message);
        debug!(%token, error = %error, "Command failed locally");
        let outcome = Err(CommandError::Backend(error));
        if let Err(mpsc::error::SendError(msg)) =
            self.dispatch.send(DispatchMsg::Completed { handle, outcome })
        {
            if let DispatchMsg::Completed { handle, .. } = msg {
                handle.resolve(Err(CommandError::ShutDown));
            }
        }
        true
    }

    /// Stop processing: every queued and in-flight command fails with
    /// [`CommandError::ShutDown`] and the backend input is closed
    ///
    /// Calling it again has no effect.
    pub fn shutdown(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Shutting down MI control");
            self.post(DispatchMsg::Shutdown);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of commands awaiting a result
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn add_command_listener(&self, listener: Arc<dyn CommandListener>) -> ListenerId {
        let id = self.next_listener_id();
        self.post(DispatchMsg::AddCommandListener(id, listener));
        id
    }

    pub fn remove_command_listener(&self, id: ListenerId) {
        self.post(DispatchMsg::RemoveListener(id));
    }

    pub fn add_event_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = self.next_listener_id();
        self.post(DispatchMsg::AddEventListener(id, listener));
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) {
        self.post(DispatchMsg::RemoveListener(id));
    }

    /// Install the run state consulted before selecting threads; `None`
    /// disables thread and frame selection
    pub fn set_run_state(&self, run_state: Option<Arc<dyn RunState>>) {
        self.post(DispatchMsg::SetRunState(run_state));
    }

    /// Switch between `--thread`/`--frame` options and explicit selection
    pub fn set_use_thread_and_frame_options(&self, enabled: bool) {
        self.post(DispatchMsg::SetUseThreadAndFrameOptions(enabled));
    }

    /// Forget the selected thread, e.g. after the user switched it by hand
    pub fn reset_current_thread(&self) {
        self.post(DispatchMsg::ResetCurrentThread);
    }

    pub fn reset_current_frame(&self) {
        self.post(DispatchMsg::ResetCurrentFrame);
    }

    pub fn set_trace_writer(&self, writer: Option<Box<dyn Write + Send>>) {
        self.trace.set_writer(writer);
    }

    /// Wait until the workers have exited and every outcome they left
    /// behind has been delivered
    ///
    /// The receive worker only stops once the backend closes its output.
    pub async fn closed(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "MI worker task failed");
            }
        }

        let (tx, rx) = oneshot::channel();
        if self.dispatch.send(DispatchMsg::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed))
    }

    fn post(&self, msg: DispatchMsg) {
        if self.dispatch.send(msg).is_err() {
            debug!("Dispatch task is gone");
        }
    }
}

impl Drop for MiControl {
    fn drop(&mut self) {
        // The transmit worker and the dispatch task keep each other alive
        // until shutdown terminates the former
        self.shutdown();
    }
}
