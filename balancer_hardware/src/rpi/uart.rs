use std::sync::{Arc, Mutex};

use balancer_traits::{BoxError, ByteSink, ByteSource};
use rppal::uart::{Parity, Uart};

use crate::error::HwError;

/// Kernel tty buffer size on the Pi; used as the "hardware" buffer capacity.
const TTY_BUFFER_BYTES: usize = 4096;

pub struct UartRx {
    uart: Arc<Mutex<Uart>>,
}

pub struct UartTx {
    uart: Arc<Mutex<Uart>>,
}

/// Open `device` at 8N1 and split it into receive and transmit halves.
pub fn open_uart(device: &str, baud_rate: u32) -> Result<(UartRx, UartTx), HwError> {
    let mut uart = Uart::with_path(device, baud_rate, Parity::None, 8, 1)
        .map_err(|e| HwError::Uart(format!("open {device}: {e}")))?;
    // Non-blocking reads: return immediately with whatever is buffered.
    uart.set_read_mode(0, std::time::Duration::ZERO)
        .map_err(|e| HwError::Uart(e.to_string()))?;
    uart.set_write_mode(false)
        .map_err(|e| HwError::Uart(e.to_string()))?;
    tracing::info!(device, baud_rate, "uart opened");
    let shared = Arc::new(Mutex::new(uart));
    Ok((
        UartRx {
            uart: shared.clone(),
        },
        UartTx { uart: shared },
    ))
}

fn lock(uart: &Mutex<Uart>) -> Result<std::sync::MutexGuard<'_, Uart>, HwError> {
    uart.lock()
        .map_err(|_| HwError::Uart("uart mutex poisoned".into()))
}

impl ByteSource for UartRx {
    fn available(&self) -> usize {
        lock(&self.uart)
            .ok()
            .and_then(|u| u.input_len().ok())
            .unwrap_or(0)
    }

    fn capacity(&self) -> usize {
        TTY_BUFFER_BYTES
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let mut uart = lock(&self.uart)?;
        uart.read(buf)
            .map_err(|e| HwError::Uart(e.to_string()).into())
    }
}

impl ByteSink for UartTx {
    fn available_for_write(&self) -> usize {
        lock(&self.uart)
            .ok()
            .and_then(|u| u.output_len().ok())
            .map_or(0, |queued| TTY_BUFFER_BYTES.saturating_sub(queued))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, BoxError> {
        let mut uart = lock(&self.uart)?;
        uart.write(bytes)
            .map_err(|e| HwError::Uart(e.to_string()).into())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut uart = lock(&self.uart)?;
        uart.set_write_mode(true)
            .map_err(|e| HwError::Uart(e.to_string()))?;
        let mut sent = 0;
        while sent < bytes.len() {
            sent += uart
                .write(&bytes[sent..])
                .map_err(|e| HwError::Uart(e.to_string()))?;
        }
        uart.drain().map_err(|e| HwError::Uart(e.to_string()))?;
        uart.set_write_mode(false)
            .map_err(|e| HwError::Uart(e.to_string()))?;
        Ok(())
    }
}
