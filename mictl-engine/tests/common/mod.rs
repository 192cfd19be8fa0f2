//! Common test infrastructure for engine integration tests
//!
//! `ScriptedBackend` plays the debugger: the test reads the command lines the
//! engine wrote and answers with whatever records the scenario needs.
//! `Recorder` captures listener notifications.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mictl_engine::{
    BackendStreams, CommandHandle, CommandListener, CommandOutcome, ControlConfig, EventListener,
    MiControl, MiEvent, RunState,
};
use parking_lot::Mutex;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};

/// How long a test waits for a line the engine should write
const LINE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the engine must stay quiet to count as not sending
const SILENCE: Duration = Duration::from_millis(100);

pub struct ScriptedBackend {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl ScriptedBackend {
    /// Start a control with the given window over an in-memory backend
    pub fn start(window_size: usize) -> (MiControl, Self) {
        Self::start_with(ControlConfig {
            window_size,
            ..Default::default()
        })
    }

    pub fn start_with(config: ControlConfig) -> (MiControl, Self) {
        let (engine, backend) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(engine);
        let control = MiControl::start(BackendStreams::new(reader, writer), &config);
        (control, Self::new(backend))
    }

    /// Start a control whose backend also has an error stream
    pub fn start_with_errors(window_size: usize) -> (MiControl, Self, DuplexStream) {
        let (engine, backend) = tokio::io::duplex(64 * 1024);
        let (errors_engine, errors_backend) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(engine);
        let streams = BackendStreams::new(reader, writer).with_errors(errors_engine);
        let config = ControlConfig {
            window_size,
            ..Default::default()
        };
        let control = MiControl::start(streams, &config);
        (control, Self::new(backend), errors_backend)
    }

    fn new(backend: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(backend);
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Next line the engine wrote
    pub async fn next_line(&mut self) -> String {
        match tokio::time::timeout(LINE_TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => panic!("Engine closed the backend input"),
            Ok(Err(e)) => panic!("Failed to read from engine: {}", e),
            Err(_) => panic!("Timed out waiting for a command"),
        }
    }

    pub async fn expect_line(&mut self, expected: &str) {
        assert_eq!(self.next_line().await, expected);
    }

    /// Assert the engine writes nothing for a while
    pub async fn expect_silence(&mut self) {
        if let Ok(line) = tokio::time::timeout(SILENCE, self.lines.next_line()).await {
            panic!("Unexpected output from engine: {:?}", line);
        }
    }

    /// Assert the engine closed its end of the backend input
    pub async fn expect_closed(&mut self) {
        match tokio::time::timeout(LINE_TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(None)) | Ok(Err(_)) => {}
            Ok(Ok(Some(line))) => panic!("Unexpected output from engine: {:?}", line),
            Err(_) => panic!("Engine did not close the backend input"),
        }
    }

    /// Print one or more lines, as the backend would
    pub async fn reply(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

/// Token prefix of a command line
pub fn token_of(line: &str) -> u32 {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap()
}

/// Listener recording every notification
#[derive(Default)]
pub struct Recorder {
    log: Mutex<Vec<String>>,
    events: Mutex<Vec<MiEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn events(&self) -> Vec<MiEvent> {
        self.events.lock().clone()
    }

    fn push(&self, what: &str, handle: &CommandHandle) {
        self.log.lock().push(format!("{} {}", what, handle.command()));
    }
}

impl CommandListener for Recorder {
    fn command_queued(&self, handle: &CommandHandle) {
        self.push("queued", handle);
    }

    fn command_sent(&self, handle: &CommandHandle) {
        self.push("sent", handle);
    }

    fn command_removed(&self, handle: &CommandHandle) {
        self.push("removed", handle);
    }

    fn command_done(&self, handle: &CommandHandle, outcome: &CommandOutcome) {
        let what = if outcome.is_ok() { "done" } else { "failed" };
        self.push(what, handle);
    }
}

impl EventListener for Recorder {
    fn event_received(&self, event: &MiEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Run state reporting every thread as stopped
pub struct AllSuspended;

impl RunState for AllSuspended {
    fn is_suspended(&self, _thread_id: &str) -> bool {
        true
    }
}

/// Register `recorder` for both kinds of notification
pub fn observe(control: &MiControl, recorder: &Arc<Recorder>) {
    control.add_command_listener(Arc::clone(recorder) as Arc<dyn CommandListener>);
    control.add_event_listener(Arc::clone(recorder) as Arc<dyn EventListener>);
}
