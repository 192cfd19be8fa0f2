//! mictl-engine: Command/response engine for a debugger backend
//!
//! Queues commands, keeps a bounded number of them in flight, pairs result
//! records with their commands by token and routes everything else to event
//! listeners. One dispatch task owns all session state; dedicated workers own
//! the backend's input, output and error streams.

pub mod backend;
pub mod config;
pub mod control;
mod dispatch;
pub mod error;
pub mod handle;
pub mod listener;
mod receive;
pub mod run_state;
mod tables;
pub mod token;
pub mod trace;
mod transmit;

// Re-export main types at crate root
pub use backend::DebuggerSession;
pub use config::{AppConfig, BackendConfig, ConfigLoader, ControlConfig, TraceConfig};
pub use control::{BackendReader, BackendStreams, BackendWriter, MiControl, TypedOutcome};
pub use error::{BackendError, CommandError, FailureCode};
pub use handle::{CommandHandle, CommandId, CommandOutcome, CompletionSink};
pub use listener::{CommandListener, EventListener, ListenerId, MiEvent};
pub use run_state::{RunState, ThreadStateTracker, INTERNAL_THREAD_ID};
pub use token::{TokenAllocator, MAX_TOKEN};
pub use trace::{wrap_line, MiTrace, TraceWriter};
