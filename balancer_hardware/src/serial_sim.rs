//! In-process serial link: two bounded FIFOs standing in for the UART buffers.
//!
//! The device side implements `ByteSource`/`ByteSink`; the host side is what a
//! test or the CLI simulator uses to talk to the firmware.

use balancer_traits::{BoxError, ByteSink, ByteSource};
use crossbeam_channel as xch;
use std::time::Duration;

use crate::error::HwError;

/// Arduino-class UARTs buffer 64 bytes in each direction.
pub const DEFAULT_FIFO_BYTES: usize = 64;

pub struct SimRx {
    rx: xch::Receiver<u8>,
    capacity: usize,
}

pub struct SimTx {
    tx: xch::Sender<u8>,
    capacity: usize,
}

pub struct SimHost {
    to_device: xch::Sender<u8>,
    from_device: xch::Receiver<u8>,
}

/// Build a connected (device rx, device tx, host) triple.
pub fn sim_serial(rx_fifo: usize, tx_fifo: usize) -> (SimRx, SimTx, SimHost) {
    let (to_device, rx) = xch::bounded(rx_fifo);
    let (tx, from_device) = xch::bounded(tx_fifo);
    (
        SimRx {
            rx,
            capacity: rx_fifo,
        },
        SimTx {
            tx,
            capacity: tx_fifo,
        },
        SimHost {
            to_device,
            from_device,
        },
    )
}

impl ByteSource for SimRx {
    fn available(&self) -> usize {
        self.rx.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let mut n = 0;
        for slot in buf.iter_mut() {
            match self.rx.try_recv() {
                Ok(b) => {
                    *slot = b;
                    n += 1;
                }
                Err(xch::TryRecvError::Empty) => break,
                Err(xch::TryRecvError::Disconnected) if n > 0 => break,
                Err(xch::TryRecvError::Disconnected) => return Err(HwError::Disconnected.into()),
            }
        }
        Ok(n)
    }
}

impl ByteSink for SimTx {
    fn available_for_write(&self) -> usize {
        self.capacity.saturating_sub(self.tx.len())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, BoxError> {
        let mut n = 0;
        for &b in bytes {
            match self.tx.try_send(b) {
                Ok(()) => n += 1,
                Err(xch::TrySendError::Full(_)) => break,
                Err(xch::TrySendError::Disconnected(_)) => return Err(HwError::Disconnected.into()),
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        for &b in bytes {
            self.tx.send(b).map_err(|_| HwError::Disconnected)?;
        }
        Ok(())
    }
}

impl SimHost {
    /// Push bytes into the device receive FIFO without blocking.
    /// Returns how many were accepted; the rest would be lost on a real UART.
    pub fn send(&self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .take_while(|&&b| self.to_device.try_send(b).is_ok())
            .count()
    }

    /// Push bytes, waiting for the device to drain its FIFO when full.
    pub fn send_blocking(&self, bytes: &[u8]) -> Result<(), HwError> {
        for &b in bytes {
            self.to_device.send(b).map_err(|_| HwError::Disconnected)?;
        }
        Ok(())
    }

    /// Everything the device has transmitted so far.
    pub fn recv_all(&self) -> Vec<u8> {
        self.from_device.try_iter().collect()
    }

    /// Wait up to `timeout` for the next transmitted byte.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<u8> {
        self.from_device.recv_timeout(timeout).ok()
    }
}
