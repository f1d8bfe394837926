//! Two interchangeable ways of moving bytes from the UART into the local
//! receive buffer.
//!
//! `Polled` pulls bytes when the parser runs. `Drained` owns a background
//! task that empties the UART every `period`, the way a timer interrupt would
//! on a microcontroller; the parser excludes that task while it scans.
//!
//! Safety: each `Drained` spawns exactly one thread that is shut down and
//! joined when the `Drained` is dropped.

use balancer_traits::ByteSource;
use balancer_traits::clock::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::rx::RxBuffer;

pub trait RxStrategy {
    /// Bring the local buffer up to date and run `f` on it. While `f` runs,
    /// nothing else touches the buffer.
    fn with_buffer<T>(&mut self, f: impl FnOnce(&mut RxBuffer) -> T) -> T;
}

pub struct Polled<S> {
    source: S,
    buffer: RxBuffer,
}

impl<S: ByteSource> Polled<S> {
    pub fn new(source: S, capacity: usize) -> Self {
        Self {
            source,
            buffer: RxBuffer::with_capacity(capacity),
        }
    }
}

impl<S: ByteSource> RxStrategy for Polled<S> {
    fn with_buffer<T>(&mut self, f: impl FnOnce(&mut RxBuffer) -> T) -> T {
        self.buffer.pull_from(&mut self.source);
        f(&mut self.buffer)
    }
}

pub struct Drained {
    shared: Arc<Mutex<RxBuffer>>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Drained {
    pub fn spawn<S, C>(mut source: S, capacity: usize, period: Duration, clock: C) -> Self
    where
        S: ByteSource + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let shared = Arc::new(Mutex::new(RxBuffer::with_capacity(capacity)));
        let shared_bg = shared.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_bg = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_bg.load(Ordering::Relaxed) {
                    tracing::debug!("receive drain task received shutdown signal");
                    break;
                }
                {
                    // Blocks while the parser is scanning, like a masked
                    // interrupt that fires once it is re-enabled.
                    let mut buf = shared_bg.lock().unwrap_or_else(PoisonError::into_inner);
                    let moved = buf.drain_from(&mut source);
                    if moved > 0 {
                        tracing::trace!(moved, "drained uart bytes");
                    }
                }
                clock.sleep(period);
            }
            tracing::trace!("receive drain task exiting cleanly");
        });

        Self {
            shared,
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl RxStrategy for Drained {
    fn with_buffer<T>(&mut self, f: impl FnOnce(&mut RxBuffer) -> T) -> T {
        let mut buf = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut buf)
    }
}

impl Drop for Drained {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("receive drain task panicked");
        }
    }
}
