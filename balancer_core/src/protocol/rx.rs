//! Receive side: the local byte buffer and the packet state machine.
//!
//! The state machine scans bytes between `tail` and `head`. A start token
//! always restarts parsing, and the buffer is compacted at that moment so the
//! frame being assembled begins at offset 0. The payload of a frame is
//! therefore always `HEADER_LEN..HEADER_LEN + len`.

use balancer_traits::ByteSource;
use std::ops::Range;

use super::codec::{HEADER_LEN, START_TOKEN};

/// Local receive buffer shared between the byte mover and the parser.
pub struct RxBuffer {
    data: Box<[u8]>,
    head: usize,
    tail: usize,
    overrun: bool,
    hw_saturated: bool,
}

impl RxBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            overrun: false,
            hw_saturated: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// (tail, head): next byte to scan and end of received data.
    pub fn cursors(&self) -> (usize, usize) {
        (self.tail, self.head)
    }

    /// Bytes received but not yet scanned.
    pub fn unscanned(&self) -> usize {
        self.head - self.tail
    }

    pub fn payload(&self, range: Range<usize>) -> &[u8] {
        &self.data[range]
    }

    /// Append bytes directly (used by tests and the fuzz target).
    /// Returns how many fit.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.capacity() - self.head);
        self.data[self.head..self.head + n].copy_from_slice(&bytes[..n]);
        self.head += n;
        n
    }

    /// Pull whatever fits from `source`. Bytes that do not fit stay in the
    /// hardware buffer for the next call.
    pub fn pull_from<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> usize {
        let available = self.note_available(source);
        let free = self.capacity() - self.head;
        self.read_from(source, available.min(free))
    }

    /// Move everything from `source`. If the local buffer fills first, all
    /// buffered bytes are discarded and the overrun is flagged for the parser.
    pub fn drain_from<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> usize {
        let available = self.note_available(source);
        let free = self.capacity() - self.head;
        let n = self.read_from(source, available.min(free));
        if available > free {
            tracing::warn!(
                buffered = self.head,
                waiting = available - n,
                "receive buffer overrun, discarding buffered bytes"
            );
            self.head = 0;
            self.tail = 0;
            self.overrun = true;
        }
        n
    }

    fn note_available<S: ByteSource + ?Sized>(&mut self, source: &S) -> usize {
        let available = source.available();
        if available > 0 && available >= source.capacity() {
            self.hw_saturated = true;
        }
        available
    }

    fn read_from<S: ByteSource + ?Sized>(&mut self, source: &mut S, want: usize) -> usize {
        if want == 0 {
            return 0;
        }
        match source.read(&mut self.data[self.head..self.head + want]) {
            Ok(n) => {
                let n = n.min(want);
                self.head += n;
                n
            }
            Err(e) => {
                tracing::warn!(error = %e, "serial read failed");
                0
            }
        }
    }

    fn recycle_if_empty(&mut self) {
        if self.tail == self.head {
            self.head = 0;
            self.tail = 0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxState {
    #[default]
    Idle,
    LenHi,
    LenLo,
    Payload,
}

/// Non-fatal conditions noticed while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxWarning {
    /// A start token arrived before the previous frame completed.
    PreviousPacketIncomplete,
    /// The hardware receive buffer was found full; bytes may have been lost.
    InsufficientReceiveRate,
}

impl RxWarning {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreviousPacketIncomplete => "Warning: PREVIOUS_PACKET_INCOMPLETE",
            Self::InsufficientReceiveRate => "Receive Warning: INSUFFICIENT_RECEIVE_RATE",
        }
    }
}

/// What one scan produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// No unscanned bytes.
    NoData,
    /// Bytes consumed, frame not complete.
    InProgress,
    /// A full frame; the payload sits at this range of the buffer.
    Complete(Range<usize>),
    /// The declared length cannot fit the buffer; everything was dropped.
    Oversized { declared: usize },
    /// The byte mover overran the buffer since the last scan.
    Overrun,
}

#[derive(Debug, Default)]
pub struct RxEngine {
    state: RxState,
    length: usize,
}

impl RxEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    fn restart(&mut self) {
        self.state = RxState::Idle;
        self.length = 0;
    }

    /// Scan buffered bytes until one frame completes or the bytes run out.
    /// At most one frame is returned per call.
    pub fn scan(&mut self, buf: &mut RxBuffer, mut warn: impl FnMut(RxWarning)) -> Scan {
        if std::mem::take(&mut buf.overrun) {
            self.restart();
            return Scan::Overrun;
        }
        if std::mem::take(&mut buf.hw_saturated) {
            warn(RxWarning::InsufficientReceiveRate);
        }
        if buf.tail == buf.head {
            return Scan::NoData;
        }

        while buf.tail < buf.head {
            let pos = buf.tail;
            let byte = buf.data[pos];
            buf.tail += 1;

            if byte == START_TOKEN {
                if self.state != RxState::Idle {
                    tracing::debug!(state = ?self.state, "start token inside a frame");
                    warn(RxWarning::PreviousPacketIncomplete);
                }
                if pos > 0 {
                    buf.data.copy_within(pos..buf.head, 0);
                    buf.head -= pos;
                    buf.tail = 1;
                }
                self.length = 0;
                self.state = RxState::LenHi;
                continue;
            }

            match self.state {
                RxState::Idle => {}
                RxState::LenHi => {
                    self.length = usize::from(byte) << 8;
                    self.state = RxState::LenLo;
                }
                RxState::LenLo => {
                    self.length |= usize::from(byte);
                    if HEADER_LEN + self.length > buf.capacity() {
                        let declared = self.length;
                        tracing::warn!(declared, capacity = buf.capacity(), "frame exceeds receive buffer");
                        self.restart();
                        buf.head = 0;
                        buf.tail = 0;
                        return Scan::Oversized { declared };
                    }
                    self.state = RxState::Payload;
                }
                RxState::Payload => {}
            }

            if self.state == RxState::Payload && buf.tail >= HEADER_LEN + self.length {
                let range = HEADER_LEN..HEADER_LEN + self.length;
                self.restart();
                buf.recycle_if_empty();
                return Scan::Complete(range);
            }
        }

        if self.state == RxState::Idle {
            buf.recycle_if_empty();
        }
        Scan::InProgress
    }
}
