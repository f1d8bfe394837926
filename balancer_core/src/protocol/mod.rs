//! Framed serial protocol: `$` + big-endian u16 length + JSON payload.
pub mod codec;
pub mod interface;
pub mod link;
pub mod message;
pub mod rx;
pub mod strategy;
pub mod tx;

pub use codec::{HEADER_LEN, START_TOKEN};
pub use interface::{Command, Telemetry};
pub use link::Link;
pub use message::StatusMessage;
pub use rx::{RxBuffer, RxEngine};
pub use strategy::{Drained, Polled, RxStrategy};
pub use tx::TxQueue;
