//! Transmit worker: owns the backend's input stream

use std::sync::Arc;

use futures::SinkExt;
use mictl_protocol::MiLineCodec;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, warn};

use crate::dispatch::{DispatchMsg, DispatchSender, TxItem};
use crate::error::CommandError;
use crate::handle::CommandHandle;
use crate::tables::InFlightTable;
use crate::trace::MiTrace;

pub(crate) struct TxWorker<W> {
    writer: Option<FramedWrite<W, MiLineCodec>>,
    in_flight: Arc<InFlightTable>,
    dispatch: DispatchSender,
    trace: Arc<MiTrace>,
    /// Raw commands that could not be written after the stream failed
    unsent_raw: Vec<CommandHandle>,
}

impl<W: AsyncWrite + Unpin> TxWorker<W> {
    pub fn new(
        writer: W,
        codec: MiLineCodec,
        in_flight: Arc<InFlightTable>,
        dispatch: DispatchSender,
        trace: Arc<MiTrace>,
    ) -> Self {
        Self {
            writer: Some(FramedWrite::new(writer, codec)),
            in_flight,
            dispatch,
            trace,
            unsent_raw: Vec::new(),
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<TxItem>) {
        while let Some(item) = rx.recv().await {
            match item {
                TxItem::Send { handle, target } => {
                    let line = handle.render(target.as_ref());
                    self.send(handle, line).await;
                }
                TxItem::Terminate => break,
            }
        }

        // Anything registered after shutdown cleared the table ends up here
        let mut leftover = self.in_flight.drain();
        leftover.append(&mut self.unsent_raw);
        if !leftover.is_empty() {
            debug!(count = leftover.len(), "Cancelling commands left at shutdown");
            let _ = self.dispatch.send(DispatchMsg::Cancelled(leftover));
        }

        self.close().await;
        debug!("Transmit worker finished");
    }

    async fn send(&mut self, handle: CommandHandle, line: String) {
        let token = handle.token();

        // Register before writing: a fast backend may answer before
        // the write call returns.
        let raw = match token {
            Some(token) => {
                if let Some(stale) = self.in_flight.register(token, handle) {
                    warn!(
                        token = %token,
                        stale = %stale.id(),
                        "Token reused while still in flight"
                    );
                    let _ = self.dispatch.send(DispatchMsg::Completed {
                        handle: stale,
                        outcome: Err(CommandError::Superseded(token)),
                    });
                }
                None
            }
            None => Some(handle),
        };

        let Some(writer) = self.writer.as_mut() else {
            // Stream already failed; tokenized commands wait in the table
            // until shutdown cancels them.
            if let Some(handle) = raw {
                self.unsent_raw.push(handle);
            }
            return;
        };

        match writer.send(line.as_str()).await {
            Ok(()) => {
                self.trace.sent(&line);
                if let Some(handle) = raw {
                    let _ = self.dispatch.send(DispatchMsg::Completed {
                        handle,
                        outcome: Ok(Default::default()),
                    });
                }
            }
            Err(e) => {
                error!(error = %e, line = %line, "Failed to write to backend");
                if let Some(handle) = raw {
                    self.unsent_raw.push(handle);
                }
                self.close().await;
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "Error closing backend input");
            }
        }
    }
}
