//! Receive worker: owns the backend's output stream
//!
//! Classifies each line, pairs result records with the commands in flight
//! and forwards everything else as events. Completions and events are
//! posted to the dispatch task rather than delivered from here.

use std::sync::Arc;

use futures::StreamExt;
use mictl_protocol::{
    parse_line, MiLineCodec, MiOobRecord, MiOutput, MiRecord, MiResultRecord, MiStreamRecord,
};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::dispatch::{DispatchMsg, DispatchSender};
use crate::error::{BackendError, CommandError};
use crate::listener::MiEvent;
use crate::tables::{History, InFlightTable};
use crate::trace::MiTrace;

pub(crate) struct RxWorker<R> {
    lines: FramedRead<R, MiLineCodec>,
    in_flight: Arc<InFlightTable>,
    dispatch: DispatchSender,
    trace: Arc<MiTrace>,
    /// Out-of-band records since the last matched result
    oob_history: History<MiOobRecord>,
    /// Stream records since the last matched result
    stream_history: History<MiStreamRecord>,
}

impl<R: AsyncRead + Unpin> RxWorker<R> {
    pub fn new(
        reader: R,
        codec: MiLineCodec,
        in_flight: Arc<InFlightTable>,
        dispatch: DispatchSender,
        trace: Arc<MiTrace>,
        history: usize,
    ) -> Self {
        Self {
            lines: FramedRead::new(reader, codec),
            in_flight,
            dispatch,
            trace,
            oob_history: History::new(history),
            stream_history: History::new(history),
        }
    }

    pub async fn run(mut self) {
        while let Some(next) = self.lines.next().await {
            let line = match next {
                Ok(line) => line,
                Err(e) => {
                    debug!(error = %e, "Backend output closed");
                    break;
                }
            };

            if line.is_empty() {
                continue;
            }

            self.trace.received(&line);
            if !self.process_line(&line) {
                break;
            }
        }
        debug!("Receive worker finished");
    }

    /// Handle one line; false once the dispatch task is gone
    fn process_line(&mut self, line: &str) -> bool {
        let msg = match parse_line(line) {
            MiRecord::Result(record) => Some(self.result_record(record)),
            MiRecord::Oob(record) => Some(self.oob_record(record)),
            MiRecord::Prompt => None,
        };

        if let Some(msg) = msg {
            if self.dispatch.send(msg).is_err() {
                return false;
            }
        }

        // Whatever the line was, capacity may have freed up
        self.dispatch.send(DispatchMsg::ProcessNext).is_ok()
    }

    fn result_record(&mut self, record: MiResultRecord) -> DispatchMsg {
        let handle = record.token.and_then(|token| self.in_flight.take(token));

        let Some(handle) = handle else {
            warn!(token = ?record.token, class = %record.class, "Result record matches no command in flight");
            return DispatchMsg::Event(MiEvent::UnmatchedResult { record });
        };

        let output = MiOutput::new(record, self.oob_history.take());
        self.stream_history.clear();

        let outcome = if output.is_error() {
            let error = BackendError::from_output(handle.command().to_string(), &output);
            debug!(command = %handle.command(), error = %error, "Command failed");
            Err(CommandError::Backend(error))
        } else {
            Ok(output)
        };

        DispatchMsg::Completed { handle, outcome }
    }

    fn oob_record(&mut self, record: MiOobRecord) -> DispatchMsg {
        self.oob_history.push(record.clone());

        // The event carries the streams that came before this record
        let preceding_streams = self.stream_history.snapshot();
        if let MiOobRecord::Stream(stream) = &record {
            self.stream_history.push(stream.clone());
        }

        DispatchMsg::Event(MiEvent::Oob {
            record,
            preceding_streams,
        })
    }
}

/// Drain the backend's stderr, turning each line into a console event
pub(crate) async fn run_error_channel<R: AsyncRead + Unpin>(
    reader: R,
    codec: MiLineCodec,
    dispatch: DispatchSender,
) {
    let mut lines = FramedRead::new(reader, codec);
    while let Some(next) = lines.next().await {
        let line = match next {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "Backend error stream closed");
                break;
            }
        };

        debug!(line = %line, "Backend stderr");
        let event = MiEvent::Oob {
            record: MiOobRecord::Stream(MiStreamRecord::console(format!("{}\n", line))),
            preceding_streams: Vec::new(),
        };
        if dispatch.send(DispatchMsg::Event(event)).is_err() {
            break;
        }
    }
    debug!("Error channel worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{CommandHandle, CommandId};
    use mictl_protocol::{MiCommandLine, StreamKind, Token};
    use tokio::sync::mpsc;

    fn receiver(
        in_flight: Arc<InFlightTable>,
        history: usize,
    ) -> (
        RxWorker<tokio::io::Empty>,
        mpsc::UnboundedReceiver<DispatchMsg>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = RxWorker::new(
            tokio::io::empty(),
            MiLineCodec::new(),
            in_flight,
            tx,
            Arc::new(MiTrace::default()),
            history,
        );
        (receiver, rx)
    }

    fn register(in_flight: &InFlightTable, token: u32) {
        let mut handle =
            CommandHandle::new(CommandId(token as u64), Arc::new(MiCommandLine::new("-x")), None);
        handle.assign_token(Token(token));
        in_flight.register(Token(token), handle);
    }

    fn next_non_schedule(rx: &mut mpsc::UnboundedReceiver<DispatchMsg>) -> DispatchMsg {
        loop {
            match rx.try_recv() {
                Ok(DispatchMsg::ProcessNext) => continue,
                Ok(msg) => return msg,
                Err(_) => panic!("No message posted"),
            }
        }
    }

    #[test]
    fn test_result_collects_preceding_oob() {
        let in_flight = Arc::new(InFlightTable::new());
        register(&in_flight, 3);
        let (mut r, mut rx) = receiver(in_flight.clone(), 20);

        assert!(r.process_line(r#"~"Thread 1 (process 42)\n""#));
        assert!(r.process_line("3^done"));

        let _event = next_non_schedule(&mut rx);
        match next_non_schedule(&mut rx) {
            DispatchMsg::Completed { handle, outcome } => {
                assert_eq!(handle.token(), Some(Token(3)));
                let output = outcome.unwrap();
                assert_eq!(output.oob_records.len(), 1);
                assert_eq!(output.console_text(), "Thread 1 (process 42)\n");
            }
            _ => panic!("Expected completion"),
        }
        assert_eq!(r.oob_history.len(), 0);
        assert_eq!(r.stream_history.len(), 0);
    }

    #[test]
    fn test_error_result_becomes_backend_error() {
        let in_flight = Arc::new(InFlightTable::new());
        register(&in_flight, 1);
        let (mut r, mut rx) = receiver(in_flight, 20);

        r.process_line(r#"1^error,msg="No executable specified.""#);
        match next_non_schedule(&mut rx) {
            DispatchMsg::Completed { outcome, .. } => {
                let err = outcome.unwrap_err();
                assert_eq!(err.to_string(), "No executable specified.");
                assert_eq!(err.backend().map(|b| b.command.as_str()), Some("-x"));
            }
            _ => panic!("Expected completion"),
        }
    }

    #[test]
    fn test_unmatched_result_is_event_without_history() {
        let in_flight = Arc::new(InFlightTable::new());
        let (mut r, mut rx) = receiver(in_flight, 20);

        r.process_line(r#"=library-loaded,id="libc.so.6""#);
        let _ = next_non_schedule(&mut rx);
        r.process_line("77^done");

        match next_non_schedule(&mut rx) {
            DispatchMsg::Event(MiEvent::UnmatchedResult { record }) => {
                assert_eq!(record.token, Some(Token(77)));
            }
            _ => panic!("Expected unmatched result event"),
        }
        // History is kept for the next matched result
        assert_eq!(r.oob_history.len(), 1);
    }

    #[test]
    fn test_stream_snapshot_excludes_current_record() {
        let (mut r, mut rx) = receiver(Arc::new(InFlightTable::new()), 20);

        r.process_line(r#"~"first\n""#);
        r.process_line(r#"~"second\n""#);
        r.process_line(r#"*stopped,reason="signal-received""#);

        let streams: Vec<usize> = (0..3)
            .map(|_| match next_non_schedule(&mut rx) {
                DispatchMsg::Event(MiEvent::Oob {
                    preceding_streams, ..
                }) => preceding_streams.len(),
                _ => panic!("Expected OOB event"),
            })
            .collect();
        assert_eq!(streams, vec![0, 1, 2]);
    }

    #[test]
    fn test_history_is_bounded() {
        let (mut r, _rx) = receiver(Arc::new(InFlightTable::new()), 4);
        for i in 0..10 {
            r.process_line(&format!("~\"line {}\"", i));
        }
        assert_eq!(r.oob_history.len(), 4);
        assert_eq!(r.stream_history.len(), 4);
        assert_eq!(r.stream_history.snapshot()[0].text, "line 6");
    }

    #[test]
    fn test_prompt_only_schedules() {
        let (mut r, mut rx) = receiver(Arc::new(InFlightTable::new()), 20);
        r.process_line("(gdb) ");
        assert!(matches!(rx.try_recv(), Ok(DispatchMsg::ProcessNext)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_reads_stream_until_eof() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"~\"hello\\n\"\n\n(gdb) \n";
        let worker = RxWorker::new(
            input,
            MiLineCodec::new(),
            Arc::new(InFlightTable::new()),
            tx,
            Arc::new(MiTrace::default()),
            20,
        );
        worker.run().await;

        match next_non_schedule(&mut rx) {
            DispatchMsg::Event(MiEvent::Oob { record, .. }) => {
                assert_eq!(record.as_stream().map(|s| s.text.as_str()), Some("hello\n"));
            }
            _ => panic!("Expected OOB event"),
        }
    }

    #[tokio::test]
    async fn test_error_channel_emits_console_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"warning: no loadable sections\n";
        run_error_channel(input, MiLineCodec::new(), tx).await;

        match rx.recv().await {
            Some(DispatchMsg::Event(MiEvent::Oob { record, .. })) => {
                let stream = record.as_stream().cloned().unwrap();
                assert_eq!(stream.kind, StreamKind::Console);
                assert_eq!(stream.text, "warning: no loadable sections\n");
            }
            _ => panic!("Expected console event"),
        }
    }
}
