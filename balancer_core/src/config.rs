//! Runtime configuration structs for the balancing core.
//!
//! These are separate from the TOML-deserialized config in `balancer_config`;
//! `conversions` maps one onto the other.

use std::time::Duration;

/// How received bytes reach the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxMode {
    #[default]
    Drained,
    Polled,
}

#[derive(Debug, Clone)]
pub struct LinkCfg {
    pub rx_mode: RxMode,
    pub rx_capacity: usize,
    pub tx_capacity: usize,
    /// Period of the receive drain task.
    pub drain_period: Duration,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            rx_mode: RxMode::Drained,
            rx_capacity: 1500,
            tx_capacity: 1500,
            drain_period: Duration::from_micros(1280),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SensorCfg {
    pub counts_per_rev: u32,
    pub mm_per_rev: f64,
    /// Rate limits; 0 = every cycle.
    pub encoder_hz: u32,
    pub imu_hz: u32,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            counts_per_rev: 180,
            mm_per_rev: 130.0,
            encoder_hz: 0,
            imu_hz: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActuatorCfg {
    /// Fixed factor applied to the control voltage before clamping.
    pub voltage_factor: f64,
    /// Clamp bound in volts; maps to `pwm_max`.
    pub saturation_v: f64,
    pub pwm_max: u8,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            voltage_factor: 1.0,
            saturation_v: 12.0,
            pwm_max: 255,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopCfg {
    pub sensors: SensorCfg,
    pub actuator: ActuatorCfg,
    /// Period while the host has not set `h_ms`.
    pub default_cycle_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunnerCfg {
    pub idle_sleep: Duration,
    pub max_cycles: Option<u64>,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_micros(200),
            max_cycles: None,
        }
    }
}
