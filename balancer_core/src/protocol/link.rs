//! The serial link object: receive strategy, packet parser, transmit queue,
//! status message and the live command/telemetry documents.
//!
//! Owned by the main loop and passed around explicitly; there is no global
//! communication state.

use balancer_traits::ByteSink;
use serde::Serialize;

use super::codec;
use super::interface::{Command, StatusPacket, Telemetry, TelemetryPacket};
use super::message::StatusMessage;
use super::rx::{RxEngine, RxState, Scan};
use super::strategy::RxStrategy;
use super::tx::TxQueue;
use crate::error::{BalancerError, CodecError, TransmitError};
use crate::hw_error::map_hw_error;
use crate::status::ReceiveCode;

/// Joins diagnostics that pile up while the transmit queue is full.
const DIAG_SEPARATOR: &str = "; ";

/// Transmit queue plus the diagnostic text that rides on the next frame.
struct Outbox {
    queue: TxQueue,
    message: StatusMessage,
}

impl Outbox {
    fn post(&mut self, text: &str) -> Result<usize, TransmitError> {
        self.message.append(text);
        self.send_status()
    }

    fn send_status(&mut self) -> Result<usize, TransmitError> {
        let n = self.queue.enqueue(&StatusPacket {
            msg: &self.message,
        })?;
        self.message.clear();
        Ok(n)
    }

    /// Status frame for diagnostics raised where nobody can act on a failure.
    /// Text left over from a failed enqueue stays pending; a repeat of it is
    /// not appended again and anything new is joined with [`DIAG_SEPARATOR`].
    fn diagnose(&mut self, text: &str) {
        tracing::debug!(text, "diagnostic");
        if self.message.is_empty() {
            self.message.append(text);
        } else if !self.message.as_str().contains(text) {
            self.message.append(DIAG_SEPARATOR);
            self.message.append(text);
        }
        if let Err(e) = self.send_status() {
            tracing::warn!(error = %e, text, "diagnostic not queued");
        }
    }
}

pub struct Link<R, W> {
    rx: R,
    engine: RxEngine,
    outbox: Outbox,
    sink: W,
    command: Command,
    telemetry: Telemetry,
}

impl<R: RxStrategy, W: ByteSink> Link<R, W> {
    pub fn new(rx: R, sink: W, tx_capacity: usize) -> Self {
        Self {
            rx,
            engine: RxEngine::new(),
            outbox: Outbox {
                queue: TxQueue::with_capacity(tx_capacity),
                message: StatusMessage::new(),
            },
            sink,
            command: Command::default(),
            telemetry: Telemetry::default(),
        }
    }

    /// Advance the packet parser over whatever has arrived. Never blocks.
    ///
    /// A decoded packet replaces the command state wholesale; a packet that
    /// fails to decode leaves it untouched.
    pub fn async_receive(&mut self) -> ReceiveCode {
        let Self {
            rx,
            engine,
            outbox,
            command,
            ..
        } = self;
        rx.with_buffer(|buf| match engine.scan(buf, |w| outbox.diagnose(w.as_str())) {
            Scan::NoData => ReceiveCode::NoDataAvailable,
            Scan::InProgress => ReceiveCode::RxInProgress,
            Scan::Overrun => {
                outbox.diagnose("Receive Error: INCOMING_DATA_RATE_TOO_FAST");
                ReceiveCode::IncomingDataRateTooFast
            }
            Scan::Oversized { .. } => {
                outbox.diagnose("Receive Error: MESSAGE_EXCEEDS_RX_BUFFER_SIZE");
                ReceiveCode::MessageExceedsBufferSize
            }
            Scan::Complete(range) => {
                let payload = buf.payload(range);
                match codec::decode::<Command>(payload) {
                    Ok(decoded) => {
                        tracing::debug!(bytes = payload.len(), "command packet received");
                        *command = decoded;
                        ReceiveCode::PacketReceived
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, bytes = payload.len(), "dropping undecodable packet");
                        let text = format!(
                            "Error: {e} when deserializing: {}",
                            String::from_utf8_lossy(payload)
                        );
                        outbox.diagnose(&text);
                        ReceiveCode::DeserializationFailed
                    }
                }
            }
        })
    }

    /// Queue an arbitrary payload as one frame.
    pub fn enqueue<T: Serialize + ?Sized>(&mut self, payload: &T) -> Result<usize, TransmitError> {
        self.outbox.queue.enqueue(payload)
    }

    /// Queue the current telemetry together with any pending status text.
    /// The status text is cleared only once the frame is queued.
    pub fn enqueue_telemetry(&mut self) -> Result<usize, TransmitError> {
        let n = self.outbox.queue.enqueue(&TelemetryPacket {
            msg: &self.outbox.message,
            telemetry: &self.telemetry,
        })?;
        self.outbox.message.clear();
        Ok(n)
    }

    /// Push queued bytes to the transport without blocking.
    /// Returns how many bytes are still waiting.
    pub fn async_transmit(&mut self) -> usize {
        self.outbox.queue.drain_nonblocking(&mut self.sink)
    }

    /// Add text to the status message. False when it had to be truncated.
    pub fn message_append(&mut self, text: &str) -> bool {
        self.outbox.message.append(text)
    }

    /// Append `text` and queue the status message as its own frame.
    pub fn message_enqueue(&mut self, text: &str) -> Result<usize, TransmitError> {
        self.outbox.post(text)
    }

    /// Append `text` and send the status message right away, after flushing
    /// everything already queued. Blocks until the transport took the frame.
    pub fn message_transmit_now(&mut self, text: &str) -> Result<(), BalancerError> {
        self.outbox.message.append(text);
        let frame = codec::encode_to_vec(&StatusPacket {
            msg: &self.outbox.message,
        })
        .map_err(|e: CodecError| BalancerError::Io(e.to_string()))?;
        loop {
            let pending = self
                .outbox
                .queue
                .try_drain(&mut self.sink)
                .map_err(|e| map_hw_error(&*e))?;
            if pending == 0 {
                break;
            }
            std::thread::yield_now();
        }
        self.sink.write_all(&frame).map_err(|e| map_hw_error(&*e))?;
        self.outbox.message.clear();
        Ok(())
    }

    pub fn message_clear(&mut self) {
        self.outbox.message.clear();
    }

    pub fn message(&self) -> &StatusMessage {
        &self.outbox.message
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    /// Split borrow for the control cycle: read the command, write telemetry.
    pub fn command_and_telemetry(&mut self) -> (&Command, &mut Telemetry) {
        (&self.command, &mut self.telemetry)
    }

    pub fn pending(&self) -> usize {
        self.outbox.queue.pending()
    }

    pub fn rx_state(&self) -> RxState {
        self.engine.state()
    }

    /// (tail, head) of the local receive buffer.
    pub fn rx_cursors(&mut self) -> (usize, usize) {
        self.rx.with_buffer(|buf| buf.cursors())
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn rx(&self) -> &R {
        &self.rx
    }
}
