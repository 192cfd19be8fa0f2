//! Submitted commands and their completion sinks

use std::fmt;
use std::sync::Arc;

use mictl_protocol::{CommandContext, Framing, MiOutput, Token, WireCommand};
use parking_lot::Mutex;

use crate::error::CommandError;

/// What a command resolves to
pub type CommandOutcome = Result<MiOutput, CommandError>;

/// Callback receiving the outcome of a command, invoked exactly once
pub type CompletionSink = Box<dyn FnOnce(CommandOutcome) + Send>;

/// Identifies a submitted command until it completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) u64);

impl CommandId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A command on its way through the engine
///
/// The token stays unset until the command is about to be written, so token
/// order follows transmission order.
pub struct CommandHandle {
    id: CommandId,
    command: Arc<dyn WireCommand>,
    sink: Mutex<Option<CompletionSink>>,
    token: Option<Token>,
}

impl CommandHandle {
    pub(crate) fn new(
        id: CommandId,
        command: Arc<dyn WireCommand>,
        sink: Option<CompletionSink>,
    ) -> Self {
        Self {
            id,
            command,
            sink: Mutex::new(sink),
            token: None,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn command(&self) -> &Arc<dyn WireCommand> {
        &self.command
    }

    pub fn token(&self) -> Option<Token> {
        self.token
    }

    pub fn context(&self) -> Option<&CommandContext> {
        self.command.context()
    }

    pub fn framing(&self) -> Framing {
        self.command.framing()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub(crate) fn assign_token(&mut self, token: Token) {
        self.token = Some(token);
    }

    /// Wire text for this command, token first
    pub(crate) fn render(&self, target: Option<&CommandContext>) -> String {
        let text = self.command.construct(target);
        match self.token {
            Some(token) => format!("{}{}", token, text),
            None => text,
        }
    }

    /// Hand the outcome to the sink; later calls are no-ops
    pub(crate) fn resolve(&self, outcome: CommandOutcome) {
        let sink = self.sink.lock().take();
        if let Some(sink) = sink {
            sink(outcome);
        }
    }
}

impl fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandle")
            .field("id", &self.id)
            .field("command", &self.command.to_string())
            .field("token", &self.token)
            .field("has_sink", &self.has_sink())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mictl_protocol::{CliCommand, MiCommandLine, RawCommand};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_sink(counter: Arc<AtomicUsize>) -> CompletionSink {
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_render_with_and_without_token() {
        let mut handle = CommandHandle::new(
            CommandId(1),
            Arc::new(MiCommandLine::new("-exec-next")),
            None,
        );
        assert_eq!(handle.render(None), "-exec-next");

        handle.assign_token(Token(42));
        assert_eq!(handle.render(None), "42-exec-next");

        let ctx = CommandContext::frame("1", 0);
        assert_eq!(handle.render(Some(&ctx)), "42-exec-next --thread 1 --frame 0");
    }

    #[test]
    fn test_raw_handle_renders_verbatim() {
        let handle = CommandHandle::new(CommandId(2), Arc::new(RawCommand::new("yes")), None);
        assert_eq!(handle.framing(), Framing::Raw);
        assert_eq!(handle.render(None), "yes");
    }

    #[test]
    fn test_resolve_invokes_sink_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = CommandHandle::new(
            CommandId(3),
            Arc::new(CliCommand::new("info threads")),
            Some(counting_sink(counter.clone())),
        );

        assert!(handle.has_sink());
        handle.resolve(Err(CommandError::ShutDown));
        handle.resolve(Err(CommandError::ShutDown));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!handle.has_sink());
    }

    #[test]
    fn test_debug_shows_command_text() {
        let handle = CommandHandle::new(CommandId(4), Arc::new(CliCommand::new("bt")), None);
        let debug = format!("{:?}", handle);
        assert!(debug.contains("\"bt\""));
        assert!(debug.contains("has_sink: false"));
    }
}
