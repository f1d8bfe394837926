//! Quadrature decoding shared by the GPIO interrupt handler and the simulator.
//!
//! The count lives in an `AtomicI32` so the edge handler can bump it while the
//! control loop reads it without ever observing a torn value.

use balancer_traits::Encoder;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Shared, lock-free encoder count. Clones observe the same counter.
#[derive(Debug, Clone, Default)]
pub struct EncoderCounter(Arc<AtomicI32>);

impl EncoderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: i32) {
        self.0.store(value, Ordering::Release);
    }

    #[inline]
    pub fn add(&self, delta: i32) {
        self.0.fetch_add(delta, Ordering::AcqRel);
    }
}

impl Encoder for EncoderCounter {
    fn count(&self) -> i32 {
        self.get()
    }

    fn reset(&mut self) {
        self.set(0);
    }
}

/// Edge state machine for channel A with direction from channel B.
///
/// One count per rising edge of A: +1 when B is at the same level as A, -1 otherwise.
#[derive(Debug)]
pub struct QuadratureDecoder {
    last_a: bool,
    counter: EncoderCounter,
}

impl QuadratureDecoder {
    pub fn new(counter: EncoderCounter, initial_a: bool) -> Self {
        Self {
            last_a: initial_a,
            counter,
        }
    }

    /// Feed the current channel levels after a change on A. Returns the applied delta.
    pub fn on_edge(&mut self, a: bool, b: bool) -> i32 {
        if a == self.last_a {
            return 0;
        }
        self.last_a = a;
        if !a {
            return 0;
        }
        let delta = if b == a { 1 } else { -1 };
        self.counter.add(delta);
        delta
    }

    pub fn counter(&self) -> &EncoderCounter {
        &self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_rising_edges_of_a() {
        let counter = EncoderCounter::new();
        let mut dec = QuadratureDecoder::new(counter.clone(), false);
        assert_eq!(dec.on_edge(true, true), 1);
        assert_eq!(dec.on_edge(false, true), 0);
        assert_eq!(dec.on_edge(true, false), -1);
        // repeated level is not an edge
        assert_eq!(dec.on_edge(true, false), 0);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn reset_through_trait_is_seen_by_all_clones() {
        let counter = EncoderCounter::new();
        counter.set(42);
        let mut handle = counter.clone();
        handle.reset();
        assert_eq!(counter.count(), 0);
    }
}
