//! Bounded transmit queue.
//!
//! Frames are encoded straight into the free space after `head`; `tail` marks
//! the next byte to hand to the transport. Both cursors return to zero once
//! the queue drains, so no wrap-around is needed.

use balancer_traits::{BoxError, ByteSink};
use serde::Serialize;

use super::codec;
use crate::error::{CodecError, TransmitError};

pub struct TxQueue {
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl TxQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes queued but not yet accepted by the transport.
    pub fn pending(&self) -> usize {
        self.head - self.tail
    }

    pub fn cursors(&self) -> (usize, usize) {
        (self.tail, self.head)
    }

    /// Encode one frame at the head of the queue.
    pub fn enqueue<T: Serialize + ?Sized>(&mut self, payload: &T) -> Result<usize, TransmitError> {
        match codec::encode(payload, &mut self.buf[self.head..]) {
            Ok(n) => {
                self.head += n;
                tracing::trace!(bytes = n, pending = self.pending(), "frame queued");
                Ok(n)
            }
            Err(CodecError::InsufficientCapacity { .. } | CodecError::PayloadTooLong(_)) => {
                let fits_when_empty = codec::encoded_len(payload)
                    .is_ok_and(|n| n <= self.capacity() && n - codec::HEADER_LEN <= usize::from(u16::MAX));
                if self.tail < self.head && fits_when_empty {
                    Err(TransmitError::TransmitRateTooLow)
                } else {
                    Err(TransmitError::PacketExceedsTxBufferCapacity)
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "telemetry document could not be encoded");
                Err(TransmitError::DocOverflow)
            }
        }
    }

    /// Hand as many queued bytes to `sink` as it accepts without blocking.
    /// Returns the number of bytes still pending.
    pub fn drain_nonblocking<W: ByteSink + ?Sized>(&mut self, sink: &mut W) -> usize {
        match self.try_drain(sink) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "serial write failed");
                self.pending()
            }
        }
    }

    /// `drain_nonblocking` that reports transport errors instead of logging them.
    pub fn try_drain<W: ByteSink + ?Sized>(&mut self, sink: &mut W) -> Result<usize, BoxError> {
        if self.head > self.tail {
            let room = sink.available_for_write();
            if room > 0 {
                let end = self.tail + room.min(self.pending());
                let written = sink.write(&self.buf[self.tail..end])?;
                self.tail += written.min(end - self.tail);
            }
        }
        if self.tail == self.head {
            self.head = 0;
            self.tail = 0;
        }
        Ok(self.pending())
    }
}
