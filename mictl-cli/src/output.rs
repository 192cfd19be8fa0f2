//! Rendering of events and command outcomes for the terminal

use std::io::Write;

use mictl_engine::{CommandError, EventListener, MiEvent};
use mictl_protocol::{MiInfo, MiOobRecord};
use serde_json::json;

/// Event listener printing everything the debugger reports on its own
pub struct EventPrinter {
    json: bool,
}

impl EventPrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl EventListener for EventPrinter {
    fn event_received(&self, event: &MiEvent) {
        let text = format_event(event, self.json);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            tracing::debug!(error = %e, "Failed to print event");
        }
    }
}

/// Event as printed, newline included
pub fn format_event(event: &MiEvent, json: bool) -> String {
    if json {
        return format!("{}\n", serde_json::to_string(event).unwrap_or_default());
    }

    match event {
        // Stream text already carries its own line breaks
        MiEvent::Oob {
            record: MiOobRecord::Stream(stream),
            ..
        } => stream.text.clone(),
        MiEvent::Oob { record, .. } => format!("{}\n", record),
        MiEvent::UnmatchedResult { record } => format!("(unmatched) {}\n", record),
    }
}

/// Outcome of a command with a result record
pub fn format_result(outcome: &Result<MiInfo, CommandError>, json: bool) -> String {
    match (outcome, json) {
        (Ok(info), false) => match &info.result_record {
            Some(record) => format!("{}\n", record),
            None => String::new(),
        },
        (Ok(info), true) => format!("{}\n", json!({ "result": info.result_record })),
        (Err(e), json) => format_error(e, json),
    }
}

/// Outcome of a command written verbatim
pub fn format_raw(outcome: &Result<(), CommandError>, json: bool) -> String {
    match outcome {
        Ok(()) => String::new(),
        Err(e) => format_error(e, json),
    }
}

fn format_error(error: &CommandError, json: bool) -> String {
    let message = match error.backend() {
        Some(backend) => backend.status_message(),
        None => error.to_string(),
    };
    if json {
        format!("{}\n", json!({ "error": message }))
    } else {
        format!("error: {}\n", message)
    }
}
