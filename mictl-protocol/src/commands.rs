//! Built-in commands
//!
//! Only what the engine needs for itself (context switches, exit, feature
//! probing) plus generic carriers for commands typed in by a user.

use std::fmt;

use serde::Serialize;

use crate::command::{CommandContext, DecodeError, Framing, MiCommand, MiInfo, WireCommand};
use crate::cstring::quote_parameter;
use crate::record::{MiOutput, MiValue};

/// An MI command: `-operation [options] [--] [parameters]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiCommandLine {
    operation: String,
    options: Vec<String>,
    parameters: Vec<String>,
    /// Pre-formatted argument text typed by a user, sent verbatim
    raw_args: Option<String>,
    context: Option<CommandContext>,
    native_targeting: bool,
}

impl MiCommandLine {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            options: Vec::new(),
            parameters: Vec::new(),
            raw_args: None,
            context: None,
            native_targeting: true,
        }
    }

    /// Split a typed line into the operation and its verbatim arguments
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.split_once(char::is_whitespace) {
            Some((operation, rest)) => {
                let rest = rest.trim();
                let mut cmd = Self::new(operation);
                if !rest.is_empty() {
                    cmd.raw_args = Some(rest.to_string());
                }
                cmd
            }
            None => Self::new(line),
        }
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    pub fn with_context(mut self, context: CommandContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Mark the command as unable to take `--thread`/`--frame` itself
    pub fn without_native_targeting(mut self) -> Self {
        self.native_targeting = false;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl WireCommand for MiCommandLine {
    fn context(&self) -> Option<&CommandContext> {
        self.context.as_ref()
    }

    fn supports_thread_and_frame_options(&self) -> bool {
        self.native_targeting
    }

    fn construct(&self, target: Option<&CommandContext>) -> String {
        let mut out = self.operation.clone();

        if let Some(target) = target {
            if let Some(group) = &target.group_id {
                out.push_str(" --thread-group ");
                out.push_str(group);
            }
            if let Some(thread) = &target.thread_id {
                out.push_str(" --thread ");
                out.push_str(thread);
                if let Some(level) = target.frame_level {
                    out.push_str(&format!(" --frame {}", level));
                }
            }
        }

        for option in &self.options {
            out.push(' ');
            out.push_str(option);
        }

        if !self.parameters.is_empty() {
            if !self.options.is_empty() || self.parameters.iter().any(|p| p.starts_with('-')) {
                out.push_str(" --");
            }
            for parameter in &self.parameters {
                out.push(' ');
                out.push_str(&quote_parameter(parameter));
            }
        }

        if let Some(raw) = &self.raw_args {
            out.push(' ');
            out.push_str(raw);
        }

        out
    }
}

impl MiCommand for MiCommandLine {
    type Output = MiInfo;

    fn decode(&self, output: MiOutput) -> Result<MiInfo, DecodeError> {
        Ok(MiInfo::new(output))
    }
}

impl fmt::Display for MiCommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.construct(None))
    }
}

/// A console command such as `info registers`
///
/// Console commands cannot be addressed natively, so the backend's selected
/// thread and frame are switched beforehand when a context is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCommand {
    text: String,
    context: Option<CommandContext>,
}

impl CliCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: CommandContext) -> Self {
        self.context = Some(context);
        self
    }
}

impl WireCommand for CliCommand {
    fn context(&self) -> Option<&CommandContext> {
        self.context.as_ref()
    }

    fn supports_thread_and_frame_options(&self) -> bool {
        false
    }

    fn construct(&self, _target: Option<&CommandContext>) -> String {
        self.text.clone()
    }
}

impl MiCommand for CliCommand {
    type Output = MiInfo;

    fn decode(&self, output: MiOutput) -> Result<MiInfo, DecodeError> {
        Ok(MiInfo::new(output))
    }
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Text written to the backend as is, e.g. input for the debugged program
///
/// The backend never answers it with a result record, so it carries no token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    text: String,
}

impl RawCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl WireCommand for RawCommand {
    fn framing(&self) -> Framing {
        Framing::Raw
    }

    fn supports_thread_and_frame_options(&self) -> bool {
        false
    }

    fn construct(&self, _target: Option<&CommandContext>) -> String {
        self.text.clone()
    }
}

impl MiCommand for RawCommand {
    type Output = ();

    fn decode(&self, _output: MiOutput) -> Result<(), DecodeError> {
        Ok(())
    }
}

impl fmt::Display for RawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `-thread-select ID`
pub fn thread_select(thread_id: &str) -> MiCommandLine {
    MiCommandLine::new("-thread-select")
        .parameter(thread_id)
        .without_native_targeting()
}

/// `-stack-select-frame LEVEL`
pub fn stack_select_frame(level: u32) -> MiCommandLine {
    MiCommandLine::new("-stack-select-frame")
        .parameter(level.to_string())
        .without_native_targeting()
}

/// `-gdb-exit`
pub fn gdb_exit() -> MiCommandLine {
    MiCommandLine::new("-gdb-exit")
}

/// `-gdb-version`; the version text arrives on the console stream
pub fn gdb_version() -> MiCommandLine {
    MiCommandLine::new("-gdb-version")
}

/// `-list-features`
pub fn list_features() -> ListFeatures {
    ListFeatures(MiCommandLine::new("-list-features"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFeatures(MiCommandLine);

/// Features the backend advertises, e.g. `thread-info` or `python`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeaturesInfo {
    pub features: Vec<String>,
}

impl FeaturesInfo {
    pub fn has(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

impl WireCommand for ListFeatures {
    fn construct(&self, target: Option<&CommandContext>) -> String {
        self.0.construct(target)
    }
}

impl MiCommand for ListFeatures {
    type Output = FeaturesInfo;

    fn decode(&self, output: MiOutput) -> Result<FeaturesInfo, DecodeError> {
        if output.result_record.is_none() {
            return Err(DecodeError::NoResultRecord);
        }
        let list = output
            .field("features")
            .ok_or(DecodeError::MissingField("features"))?;

        let features = list
            .list_values()
            .into_iter()
            .map(|v| {
                v.as_const().map(str::to_string).ok_or_else(|| DecodeError::InvalidField {
                    field: "features",
                    message: format!("expected string, found {}", v),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeaturesInfo { features })
    }
}

impl fmt::Display for ListFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Convenience for decoders expecting a numeric constant
pub fn const_u32(value: Option<&MiValue>, field: &'static str) -> Result<u32, DecodeError> {
    let text = value
        .and_then(MiValue::as_const)
        .ok_or(DecodeError::MissingField(field))?;
    text.parse().map_err(|_| DecodeError::InvalidField {
        field,
        message: format!("not a number: {}", text),
    })
}
