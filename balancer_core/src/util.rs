//! Common time/period helpers for balancer_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Compute the period in microseconds for a given rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Control period: the host-set `h_ms` when non-zero, else the configured default.
#[inline]
pub fn cycle_period(h_ms: u16, default_ms: u64) -> Duration {
    if h_ms == 0 {
        Duration::from_millis(default_ms.max(1))
    } else {
        Duration::from_millis(u64::from(h_ms))
    }
}

/// Saturating conversion used for the `cycle_us` telemetry field.
#[inline]
pub fn clamp_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
