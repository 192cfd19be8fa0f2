//! MI record model
//!
//! Every line the debugger backend prints is one record. Result records
//! answer a previously sent command and carry its token; out-of-band records
//! carry no correlation and are delivered as events.

use std::fmt;

use serde::Serialize;

/// Correlation identifier linking a transmitted command to its result record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Token(pub u32);

impl Token {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion class of a result record (`^done`, `^error`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl ResultClass {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "done" => Some(Self::Done),
            "running" => Some(Self::Running),
            "connected" => Some(Self::Connected),
            "error" => Some(Self::Error),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Running => "running",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for ResultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in an MI payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MiValue {
    /// A C-string constant, already unescaped
    Const(String),
    /// `{name=value,...}`
    Tuple(Vec<MiResult>),
    /// `[value,...]`
    List(Vec<MiValue>),
    /// `[name=value,...]`
    ResultList(Vec<MiResult>),
}

impl MiValue {
    pub fn as_const(&self) -> Option<&str> {
        match self {
            Self::Const(s) => Some(s),
            _ => None,
        }
    }

    /// Field lookup for tuples and result lists
    pub fn field(&self, name: &str) -> Option<&MiValue> {
        match self {
            Self::Tuple(results) | Self::ResultList(results) => find_result(results, name),
            _ => None,
        }
    }

    /// Elements of a list; result lists yield their values
    pub fn list_values(&self) -> Vec<&MiValue> {
        match self {
            Self::List(values) => values.iter().collect(),
            Self::ResultList(results) => results.iter().map(|r| &r.value).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for MiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(s) => write!(f, "\"{}\"", crate::cstring::escape_string(s, true)),
            Self::Tuple(results) => {
                f.write_str("{")?;
                write_results(f, results)?;
                f.write_str("}")
            }
            Self::List(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Self::ResultList(results) => {
                f.write_str("[")?;
                write_results(f, results)?;
                f.write_str("]")
            }
        }
    }
}

/// `variable=value` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiResult {
    pub variable: String,
    pub value: MiValue,
}

impl fmt::Display for MiResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.variable, self.value)
    }
}

fn write_results(f: &mut fmt::Formatter<'_>, results: &[MiResult]) -> fmt::Result {
    for (i, r) in results.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", r)?;
    }
    Ok(())
}

pub(crate) fn find_result<'a>(results: &'a [MiResult], name: &str) -> Option<&'a MiValue> {
    results.iter().find(|r| r.variable == name).map(|r| &r.value)
}

/// `[token]^class[,results]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiResultRecord {
    pub token: Option<Token>,
    pub class: ResultClass,
    pub results: Vec<MiResult>,
}

impl MiResultRecord {
    pub fn field(&self, name: &str) -> Option<&MiValue> {
        find_result(&self.results, name)
    }

    pub fn const_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(MiValue::as_const)
    }

    pub fn is_error(&self) -> bool {
        self.class == ResultClass::Error
    }
}

impl fmt::Display for MiResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(token) = self.token {
            write!(f, "{}", token)?;
        }
        write!(f, "^{}", self.class)?;
        for r in &self.results {
            write!(f, ",{}", r)?;
        }
        Ok(())
    }
}

/// Kind of asynchronous out-of-band record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AsyncKind {
    /// `*` execution state changes (running, stopped)
    Exec,
    /// `+` progress of slow operations
    Status,
    /// `=` supplementary notifications (thread-created, breakpoint-modified)
    Notify,
}

impl AsyncKind {
    pub fn prefix(self) -> char {
        match self {
            Self::Exec => '*',
            Self::Status => '+',
            Self::Notify => '=',
        }
    }
}

/// `[token](*|+|=)class[,results]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiAsyncRecord {
    pub kind: AsyncKind,
    pub token: Option<Token>,
    pub class: String,
    pub results: Vec<MiResult>,
}

impl MiAsyncRecord {
    pub fn field(&self, name: &str) -> Option<&MiValue> {
        find_result(&self.results, name)
    }

    pub fn const_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(MiValue::as_const)
    }
}

/// Kind of stream out-of-band record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// `~` text meant for the console
    Console,
    /// `@` output of the running target
    Target,
    /// `&` the backend's own log
    Log,
}

impl StreamKind {
    pub fn prefix(self) -> char {
        match self {
            Self::Console => '~',
            Self::Target => '@',
            Self::Log => '&',
        }
    }
}

/// `(~|@|&)c-string`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiStreamRecord {
    pub kind: StreamKind,
    pub text: String,
}

impl MiStreamRecord {
    pub fn console(text: impl Into<String>) -> Self {
        Self {
            kind: StreamKind::Console,
            text: text.into(),
        }
    }

    pub fn target(text: impl Into<String>) -> Self {
        Self {
            kind: StreamKind::Target,
            text: text.into(),
        }
    }
}

/// Backend output not tied to a specific command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MiOobRecord {
    Async(MiAsyncRecord),
    Stream(MiStreamRecord),
}

impl MiOobRecord {
    pub fn as_stream(&self) -> Option<&MiStreamRecord> {
        match self {
            Self::Stream(s) => Some(s),
            Self::Async(_) => None,
        }
    }

    pub fn as_async(&self) -> Option<&MiAsyncRecord> {
        match self {
            Self::Async(a) => Some(a),
            Self::Stream(_) => None,
        }
    }
}

impl fmt::Display for MiOobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Async(a) => {
                if let Some(token) = a.token {
                    write!(f, "{}", token)?;
                }
                write!(f, "{}{}", a.kind.prefix(), a.class)?;
                for r in &a.results {
                    write!(f, ",{}", r)?;
                }
                Ok(())
            }
            Self::Stream(s) => write!(
                f,
                "{}\"{}\"",
                s.kind.prefix(),
                crate::cstring::escape_string(&s.text, true)
            ),
        }
    }
}

/// One classified line of backend output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiRecord {
    Result(MiResultRecord),
    Oob(MiOobRecord),
    /// The `(gdb)` prompt terminating a batch of output
    Prompt,
}

/// A result record together with the out-of-band records that preceded it
///
/// Some replies (console commands in particular) are only interpretable
/// together with the stream text printed before the result record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MiOutput {
    pub result_record: Option<MiResultRecord>,
    pub oob_records: Vec<MiOobRecord>,
}

impl MiOutput {
    pub fn new(result_record: MiResultRecord, oob_records: Vec<MiOobRecord>) -> Self {
        Self {
            result_record: Some(result_record),
            oob_records,
        }
    }

    pub fn field(&self, name: &str) -> Option<&MiValue> {
        self.result_record.as_ref().and_then(|rr| rr.field(name))
    }

    pub fn const_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(MiValue::as_const)
    }

    pub fn is_error(&self) -> bool {
        self.result_record.as_ref().is_some_and(MiResultRecord::is_error)
    }

    /// Concatenated text of the console stream records
    pub fn console_text(&self) -> String {
        self.oob_records
            .iter()
            .filter_map(MiOobRecord::as_stream)
            .filter(|s| s.kind == StreamKind::Console)
            .map(|s| s.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pairs: &[(&str, &str)]) -> Vec<MiResult> {
        pairs
            .iter()
            .map(|(k, v)| MiResult {
                variable: k.to_string(),
                value: MiValue::Const(v.to_string()),
            })
            .collect()
    }

    #[test]
    fn test_result_class_parse() {
        assert_eq!(ResultClass::parse("done"), Some(ResultClass::Done));
        assert_eq!(ResultClass::parse("error"), Some(ResultClass::Error));
        assert_eq!(ResultClass::parse("stopped"), None);
    }

    #[test]
    fn test_result_record_display() {
        let rr = MiResultRecord {
            token: Some(Token(12)),
            class: ResultClass::Error,
            results: results(&[("msg", "No symbol \"x\" in current context.")]),
        };
        assert_eq!(
            rr.to_string(),
            r#"12^error,msg="No symbol \"x\" in current context.""#
        );
    }

    #[test]
    fn test_value_field_lookup() {
        let frame = MiValue::Tuple(results(&[("level", "0"), ("func", "main")]));
        assert_eq!(frame.field("func").and_then(MiValue::as_const), Some("main"));
        assert!(frame.field("addr").is_none());
        assert!(MiValue::Const("x".into()).field("x").is_none());
    }

    #[test]
    fn test_list_values_of_result_list() {
        let list = MiValue::ResultList(results(&[("frame", "a"), ("frame", "b")]));
        let values: Vec<_> = list.list_values().into_iter().filter_map(MiValue::as_const).collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_output_console_text_skips_other_streams() {
        let output = MiOutput::new(
            MiResultRecord {
                token: Some(Token(1)),
                class: ResultClass::Done,
                results: vec![],
            },
            vec![
                MiOobRecord::Stream(MiStreamRecord::console("Thread 1\n")),
                MiOobRecord::Stream(MiStreamRecord::target("noise")),
                MiOobRecord::Stream(MiStreamRecord::console("Thread 2\n")),
            ],
        );
        assert_eq!(output.console_text(), "Thread 1\nThread 2\n");
        assert!(!output.is_error());
    }

    #[test]
    fn test_stream_record_display_escapes() {
        let oob = MiOobRecord::Stream(MiStreamRecord::console("line\n"));
        assert_eq!(oob.to_string(), r#"~"line\n""#);
    }
}
