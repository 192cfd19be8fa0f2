//! MI trace: a transcript of every line exchanged with the backend
//!
//! Lines always go to `tracing` on the `mictl::mi` target. When a trace
//! writer is installed they are also appended to it, timestamped and wrapped.

use std::fs::OpenOptions;
use std::io::Write;

use chrono::Local;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::config::TraceConfig;
use mictl_utils::{MictlError, Result};

/// Writer receiving the trace transcript
pub type TraceWriter = Box<dyn Write + Send>;

pub struct MiTrace {
    writer: Mutex<Option<TraceWriter>>,
    wrap_width: usize,
}

impl MiTrace {
    pub fn new(wrap_width: usize) -> Self {
        Self {
            writer: Mutex::new(None),
            wrap_width,
        }
    }

    /// Trace set up from configuration, appending to the configured file
    pub fn from_config(config: &TraceConfig) -> Result<Self> {
        let trace = Self::new(config.wrap_width);
        if let Some(path) = &config.file {
            if let Some(parent) = path.parent() {
                mictl_utils::paths::ensure_dir(parent).map_err(|e| MictlError::FileWrite {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| MictlError::FileWrite {
                    path: path.clone(),
                    source: e,
                })?;
            trace.set_writer(Some(Box::new(file)));
        }
        Ok(trace)
    }

    pub fn set_writer(&self, writer: Option<TraceWriter>) {
        *self.writer.lock() = writer;
    }

    pub fn is_writing(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Record a line written to the backend
    pub fn sent(&self, line: &str) {
        trace!(target: "mictl::mi", direction = "out", "{}", line);
        self.append(line);
    }

    /// Record a line read from the backend
    pub fn received(&self, line: &str) {
        trace!(target: "mictl::mi", direction = "in", "{}", line);
        self.append(line);
    }

    fn append(&self, line: &str) {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return;
        };

        let timestamp = Local::now().format("%H:%M:%S%.3f");
        let message = wrap_line(&format!("{} {}", timestamp, line), self.wrap_width);

        let result = writer
            .write_all(message.as_bytes())
            .and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!(error = %e, "MI trace writer failed, tracing disabled");
            *guard = None;
        }
    }
}

impl Default for MiTrace {
    fn default() -> Self {
        Self::new(TraceConfig::default().wrap_width)
    }
}

/// Break `message` into chunks of `width` characters, each continued with a
/// backslash, and terminate it with a newline
pub fn wrap_line(message: &str, width: usize) -> String {
    let width = width.max(1);
    let mut out = String::with_capacity(message.len() + message.len() / width * 2 + 1);
    let mut count = 0;
    let total = message.chars().count();

    for (i, c) in message.chars().enumerate() {
        out.push(c);
        count += 1;
        if count == width && i + 1 < total {
            out.push_str("\\\n");
            count = 0;
        }
    }
    out.push('\n');
    out
}
