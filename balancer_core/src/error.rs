use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum BalancerError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("calibration failed: {0}")]
    Calibration(String),
    #[error("serial link closed")]
    LinkClosed,
    #[error("io error: {0}")]
    Io(String),
}

/// Framing codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("destination holds {capacity} bytes, too small for the frame")]
    InsufficientCapacity { capacity: usize },
    #[error("payload of {0} bytes does not fit the 16-bit length field")]
    PayloadTooLong(usize),
    #[error("payload could not be serialized: {0}")]
    Serialize(String),
    #[error("{0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Why a packet could not be queued for transmission.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    /// The payload itself could not be encoded.
    #[error("TX_DOC_OVERFLOW")]
    DocOverflow,
    /// The frame is larger than the whole transmit buffer.
    #[error("PACKET_EXCEEDS_TX_BUFFER_SIZE")]
    PacketExceedsTxBufferCapacity,
    /// Unsent bytes occupy the space the frame needs; retry after draining.
    #[error("TRANSMIT_RATE_TOO_LOW")]
    TransmitRateTooLow,
}

impl TransmitError {
    /// Backpressure clears by itself; the other variants are sizing bugs.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::TransmitRateTooLow)
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
