//! Per-command failures
//!
//! Submission never fails; whatever goes wrong with a command is delivered
//! to its completion sink as a [`CommandError`].

use mictl_protocol::{DecodeError, MiOutput, Token};
use serde::Serialize;

/// Classification of a failed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// The backend answered with `^error`
    RequestFailed,
    /// No answer arrived in time
    TimedOut,
    /// The command was not valid in the current state
    InvalidState,
    /// The backend does not implement the command
    NotSupported,
}

/// A failure reported by (or on behalf of) the backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{formatted}")]
pub struct BackendError {
    /// Text of the failed command
    pub command: String,
    pub code: FailureCode,
    /// Message as sent by the backend, placeholders unresolved
    pub message: String,
    /// Machine readable error code (`code="undefined-command"`), if any
    pub backend_code: Option<String>,
    pub parameters: Vec<String>,
    formatted: String,
}

impl BackendError {
    pub fn new(command: impl Into<String>, code: FailureCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            command: command.into(),
            code,
            formatted: message.clone(),
            message,
            backend_code: None,
            parameters: Vec::new(),
        }
    }

    /// Extract the failure from an `^error` answer
    ///
    /// The message is taken from `message` or, failing that, `msg`. A
    /// `parameters` list fills `{N}` placeholders in the message.
    pub fn from_output(command: impl Into<String>, output: &MiOutput) -> Self {
        let message = output
            .const_field("message")
            .or_else(|| output.const_field("msg"))
            .unwrap_or_default()
            .to_string();

        let parameters: Vec<String> = output
            .field("parameters")
            .map(|list| {
                list.list_values()
                    .into_iter()
                    .map(|v| v.as_const().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let formatted = format_message(&message, &parameters);

        Self {
            command: command.into(),
            code: FailureCode::RequestFailed,
            message,
            backend_code: output.const_field("code").map(str::to_string),
            parameters,
            formatted,
        }
    }

    /// Message with parameters substituted
    pub fn formatted(&self) -> &str {
        &self.formatted
    }

    /// Full description naming the command, for user-facing reports
    pub fn status_message(&self) -> String {
        if self.formatted.is_empty() {
            format!("Failed to execute MI command:\n{}", self.command)
        } else {
            format!(
                "Failed to execute MI command:\n{}\nError message from debugger back end:\n{}",
                self.command, self.formatted
            )
        }
    }
}

/// Substitute `{N}` placeholders; fall back to appending the parameters when
/// the pattern does not fit them
fn format_message(message: &str, parameters: &[String]) -> String {
    if parameters.is_empty() {
        return message.to_string();
    }

    substitute(message, parameters).unwrap_or_else(|| {
        let mut out = message.to_string();
        for p in parameters {
            out.push(' ');
            out.push_str(p);
        }
        out
    })
}

fn substitute(message: &str, parameters: &[String]) -> Option<String> {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let index: usize = after[..close].trim().parse().ok()?;
        out.push_str(parameters.get(index)?);
        rest = &after[close + 1..];
    }

    if rest.contains('}') {
        return None;
    }
    out.push_str(rest);
    Some(out)
}

/// Why a command did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Connection is shut down")]
    ShutDown,

    #[error("Command was removed before it was sent")]
    Removed,

    #[error("Token {0} was reused before its result arrived")]
    Superseded(Token),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Failed to decode answer to {command}: {source}")]
    Decode {
        command: String,
        #[source]
        source: DecodeError,
    },
}

impl CommandError {
    pub fn is_shut_down(&self) -> bool {
        matches!(self, Self::ShutDown)
    }

    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }
}
