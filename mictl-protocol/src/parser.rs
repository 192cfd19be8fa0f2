//! Line classifier for MI output
//!
//! ```text
//! result-record  = [token] "^" class *("," result)
//! async-record   = [token] ("*" | "+" | "=") class *("," result)
//! stream-record  = ("~" | "@" | "&") c-string
//! prompt         = "(gdb)" [whitespace]
//! ```

use crate::cstring;
use crate::record::{
    AsyncKind, MiAsyncRecord, MiOobRecord, MiRecord, MiResult, MiResultRecord, MiStreamRecord,
    MiValue, ResultClass, StreamKind, Token,
};

/// Classify one line of backend output
///
/// Never fails: lines that do not follow the grammar are passed through as
/// target stream text so nothing the backend prints is lost.
pub fn parse_line(line: &str) -> MiRecord {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.trim_end() == "(gdb)" {
        return MiRecord::Prompt;
    }

    classify(line).unwrap_or_else(|| raw_target(line))
}

fn raw_target(line: &str) -> MiRecord {
    MiRecord::Oob(MiOobRecord::Stream(MiStreamRecord::target(format!("{}\n", line))))
}

fn classify(line: &str) -> Option<MiRecord> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    let token = if digits > 0 {
        Some(Token(line[..digits].parse().ok()?))
    } else {
        None
    };

    let rest = &line[digits..];
    let prefix = rest.chars().next()?;
    let body = &rest[prefix.len_utf8()..];

    match prefix {
        '^' => {
            let (class, results) = split_class(body);
            let class = ResultClass::parse(class)?;
            Some(MiRecord::Result(MiResultRecord {
                token,
                class,
                results,
            }))
        }
        '*' | '+' | '=' => {
            let kind = match prefix {
                '*' => AsyncKind::Exec,
                '+' => AsyncKind::Status,
                _ => AsyncKind::Notify,
            };
            let (class, results) = split_class(body);
            if class.is_empty() {
                return None;
            }
            Some(MiRecord::Oob(MiOobRecord::Async(MiAsyncRecord {
                kind,
                token,
                class: class.to_string(),
                results,
            })))
        }
        '~' | '@' | '&' if token.is_none() => {
            let kind = match prefix {
                '~' => StreamKind::Console,
                '@' => StreamKind::Target,
                _ => StreamKind::Log,
            };
            let mut cursor = Cursor::new(body);
            let text = cursor.cstring()?;
            Some(MiRecord::Oob(MiOobRecord::Stream(MiStreamRecord { kind, text })))
        }
        _ => None,
    }
}

/// Split `class,results...`, keeping whatever prefix of the results parses
fn split_class(body: &str) -> (&str, Vec<MiResult>) {
    match body.find(',') {
        Some(idx) => {
            let mut cursor = Cursor::new(&body[idx + 1..]);
            (&body[..idx], cursor.results_until(None))
        }
        None => (body, Vec::new()),
    }
}

/// Parse the payload of a record (`name=value,...`) on its own
///
/// Useful for decoding console output that embeds MI syntax.
pub fn parse_results(text: &str) -> Vec<MiResult> {
    Cursor::new(text).results_until(None)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Results separated by commas, stopping at `close` or end of input
    fn results_until(&mut self, close: Option<u8>) -> Vec<MiResult> {
        let mut results = Vec::new();
        loop {
            if self.peek() == close || self.peek().is_none() {
                break;
            }
            match self.result() {
                Some(r) => results.push(r),
                None => break,
            }
            if !self.eat(b',') {
                break;
            }
        }
        results
    }

    fn result(&mut self) -> Option<MiResult> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'=' {
                break;
            }
            if matches!(b, b',' | b'{' | b'}' | b'[' | b']' | b'"') {
                return None;
            }
            self.pos += 1;
        }
        let variable = self.input[start..self.pos].to_string();
        if variable.is_empty() || !self.eat(b'=') {
            return None;
        }
        let value = self.value()?;
        Some(MiResult { variable, value })
    }

    fn value(&mut self) -> Option<MiValue> {
        match self.peek()? {
            b'"' => self.cstring().map(MiValue::Const),
            b'{' => {
                self.pos += 1;
                let results = self.results_until(Some(b'}'));
                self.eat(b'}').then_some(MiValue::Tuple(results))
            }
            b'[' => {
                self.pos += 1;
                if self.eat(b']') {
                    return Some(MiValue::List(Vec::new()));
                }
                match self.peek()? {
                    b'"' | b'{' | b'[' => {
                        let mut values = Vec::new();
                        loop {
                            values.push(self.value()?);
                            if !self.eat(b',') {
                                break;
                            }
                        }
                        self.eat(b']').then_some(MiValue::List(values))
                    }
                    _ => {
                        let results = self.results_until(Some(b']'));
                        self.eat(b']').then_some(MiValue::ResultList(results))
                    }
                }
            }
            _ => None,
        }
    }

    /// A quoted C-string starting at the cursor, unescaped
    fn cstring(&mut self) -> Option<String> {
        if !self.eat(b'"') {
            return None;
        }
        let bytes = self.input.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\\' => self.pos += 2,
                b'"' => {
                    let body = &self.input[start..self.pos];
                    self.pos += 1;
                    return Some(cstring::unescape(body));
                }
                _ => self.pos += 1,
            }
        }
        None
    }
}
