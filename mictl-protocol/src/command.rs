//! Command boundary between callers and the engine
//!
//! A command knows how to render itself as wire text and how to turn the
//! backend's answer into a typed result. The engine never looks inside a
//! command beyond this trait.

use std::fmt;
use std::ops::Deref;

use serde::Serialize;

use crate::record::MiOutput;

/// Thread group, thread and frame a command is addressed to
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CommandContext {
    pub group_id: Option<String>,
    pub thread_id: Option<String>,
    pub frame_level: Option<u32>,
}

impl CommandContext {
    pub fn thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn frame(thread_id: impl Into<String>, frame_level: u32) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            frame_level: Some(frame_level),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// How a command is framed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Prefixed with a token; the backend answers with a result record
    Tokenized,
    /// Written verbatim; no result record is expected
    Raw,
}

/// A command as seen by the engine
pub trait WireCommand: fmt::Display + Send + Sync {
    /// Addressing context, if the command targets a specific thread or frame
    fn context(&self) -> Option<&CommandContext> {
        None
    }

    /// Whether the command accepts `--thread`/`--frame` options itself
    fn supports_thread_and_frame_options(&self) -> bool {
        true
    }

    fn framing(&self) -> Framing {
        Framing::Tokenized
    }

    /// Render the command text, without token or line terminator
    ///
    /// When `target` is given the command embeds it as native options;
    /// otherwise it relies on the backend's currently selected thread and
    /// frame.
    fn construct(&self, target: Option<&CommandContext>) -> String;
}

/// Failure turning a backend answer into a typed result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Answer has no result record")]
    NoResultRecord,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {message}")]
    InvalidField { field: &'static str, message: String },
}

/// A command with a typed result
pub trait MiCommand: WireCommand + 'static {
    type Output: Send + 'static;

    fn decode(&self, output: MiOutput) -> Result<Self::Output, DecodeError>;
}

/// Untyped result: the backend answer as is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MiInfo {
    output: MiOutput,
}

impl MiInfo {
    pub fn new(output: MiOutput) -> Self {
        Self { output }
    }

    pub fn output(&self) -> &MiOutput {
        &self.output
    }

    pub fn into_output(self) -> MiOutput {
        self.output
    }
}

impl Deref for MiInfo {
    type Target = MiOutput;

    fn deref(&self) -> &MiOutput {
        &self.output
    }
}
