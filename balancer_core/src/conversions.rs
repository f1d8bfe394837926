//! `From` implementations bridging `balancer_config` types to `balancer_core` types.

use std::time::Duration;

use crate::config::{ActuatorCfg, LinkCfg, LoopCfg, RunnerCfg, RxMode, SensorCfg};

// ── LinkCfg ──────────────────────────────────────────────────────────────────

impl From<&balancer_config::Link> for LinkCfg {
    fn from(c: &balancer_config::Link) -> Self {
        Self {
            rx_mode: match c.rx_mode {
                balancer_config::RxMode::Interrupt => RxMode::Drained,
                balancer_config::RxMode::Polled => RxMode::Polled,
            },
            rx_capacity: c.rx_buffer_size,
            tx_capacity: c.tx_buffer_size,
            drain_period: Duration::from_micros(c.drain_period_us.max(1)),
        }
    }
}

// ── LoopCfg ──────────────────────────────────────────────────────────────────

impl From<&balancer_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &balancer_config::ActuatorCfg) -> Self {
        Self {
            voltage_factor: c.voltage_factor,
            saturation_v: c.saturation_v,
            pwm_max: c.pwm_max,
        }
    }
}

impl From<&balancer_config::Config> for LoopCfg {
    fn from(c: &balancer_config::Config) -> Self {
        Self {
            sensors: SensorCfg {
                counts_per_rev: c.encoder.counts_per_rev,
                mm_per_rev: c.encoder.mm_per_rev,
                encoder_hz: c.sensors.encoder_hz,
                imu_hz: c.sensors.imu_hz,
            },
            actuator: (&c.actuator).into(),
            default_cycle_ms: c.control.default_cycle_ms,
        }
    }
}

// ── RunnerCfg ────────────────────────────────────────────────────────────────

impl From<&balancer_config::RunnerCfg> for RunnerCfg {
    fn from(c: &balancer_config::RunnerCfg) -> Self {
        Self {
            idle_sleep: Duration::from_micros(c.idle_sleep_us),
            max_cycles: c.max_cycles,
        }
    }
}
