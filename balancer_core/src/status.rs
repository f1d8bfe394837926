//! Outcome of one receive-engine invocation.

/// Result of `Link::async_receive`. None of these are fatal; the main loop
/// decides whether to log or act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveCode {
    /// Nothing was buffered.
    NoDataAvailable,
    /// A complete packet was decoded and applied to the command state.
    PacketReceived,
    /// Bytes were consumed but the packet is not complete yet.
    RxInProgress,
    /// The declared length does not fit the receive buffer; bytes dropped.
    MessageExceedsBufferSize,
    /// The payload was not a valid command document; state left unchanged.
    DeserializationFailed,
    /// The drain task overran the local buffer; all buffered bytes dropped.
    IncomingDataRateTooFast,
}

impl ReceiveCode {
    /// Packet was dropped for integrity reasons.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::MessageExceedsBufferSize | Self::DeserializationFailed | Self::IncomingDataRateTooFast
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoDataAvailable => "NO_DATA_AVAILABLE",
            Self::PacketReceived => "PACKET_RECEIVED",
            Self::RxInProgress => "RX_IN_PROGRESS",
            Self::MessageExceedsBufferSize => "MESSAGE_EXCEEDS_RX_BUFFER_SIZE",
            Self::DeserializationFailed => "DESERIALIZATION_FAILED",
            Self::IncomingDataRateTooFast => "INCOMING_DATA_RATE_TOO_FAST",
        }
    }
}
