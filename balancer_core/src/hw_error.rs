//! Maps `Box<dyn Error>` from trait boundaries to typed `BalancerError`.
//!
//! The traits in `balancer_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `balancer_hardware::HwError` downcasting.

use crate::error::BalancerError;

/// Map a trait-boundary error to a typed `BalancerError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> BalancerError {
    #[cfg(feature = "hardware-errors")]
    {
        use balancer_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::DataReadyTimeout => BalancerError::Timeout,
                HwError::Disconnected => BalancerError::LinkClosed,
                HwError::Calibration(msg) => BalancerError::Calibration(msg.clone()),
                other => BalancerError::HardwareFault(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") {
        BalancerError::Timeout
    } else if lower.contains("disconnected") {
        BalancerError::LinkClosed
    } else {
        BalancerError::Hardware(s)
    }
}
