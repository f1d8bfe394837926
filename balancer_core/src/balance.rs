//! The fixed-rate balancing cycle (`BalanceLoop`).
//!
//! Owns the sensors, the motor and the controller. Each call to
//! [`BalanceLoop::cycle`] performs one full period: pending resets, sensor
//! reads, estimation, control, actuation and the telemetry update.

use std::sync::Arc;
use std::time::{Duration, Instant};

use balancer_traits::clock::Clock;
use balancer_traits::{Encoder, Imu, Motor};
use eyre::WrapErr;

use crate::config::LoopCfg;
use crate::control::{ControlOutput, ControlParams, Controller, Measurements, MotorCommand};
use crate::error::{BalancerError, Result};
use crate::hw_error::map_hw_error;
use crate::protocol::interface::{AngleRate, ControlBlock, WheelReading};
use crate::protocol::{Command, Telemetry};
use crate::sensor::{CycleCounter, CycleStamp, Sensor, SensorBus, SensorKind};
use crate::util::{clamp_u32, cycle_period};

/// Remembers enable and reset-request edges seen between cycles.
///
/// The receive path may flip `control_state` at any time; the reset it
/// implies is applied once, at the start of the next cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResetLatch {
    prev_enabled: bool,
    prev_reset_pos: bool,
    pending: bool,
}

impl ResetLatch {
    pub fn observe(&mut self, cmd: &Command) {
        if cmd.control_state && !self.prev_enabled {
            self.pending = true;
        }
        if cmd.reset_pos && !self.prev_reset_pos {
            self.pending = true;
        }
        self.prev_enabled = cmd.control_state;
        self.prev_reset_pos = cmd.reset_pos;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending reset, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

pub struct BalanceLoop<E: Encoder, I: Imu, M: Motor> {
    bus: SensorBus<E, I>,
    wheel: Sensor,
    tilt: Sensor,
    tilt_rate: Sensor,
    motor: M,
    controller: Controller,
    latch: ResetLatch,
    cycles: CycleCounter,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    last_start: Option<Instant>,
    default_cycle_ms: u64,
}

impl<E: Encoder, I: Imu, M: Motor> core::fmt::Debug for BalanceLoop<E, I, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BalanceLoop")
            .field("cycles", &self.cycles.get())
            .field("reset_pending", &self.latch.is_pending())
            .field("integral", &self.controller.integral())
            .finish()
    }
}

impl<E: Encoder, I: Imu, M: Motor> BalanceLoop<E, I, M> {
    pub fn new(
        encoder: E,
        imu: I,
        motor: M,
        cfg: &LoopCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        if cfg.sensors.counts_per_rev == 0 {
            eyre::bail!("encoder.counts_per_rev must be > 0");
        }
        if !(cfg.sensors.mm_per_rev.is_finite() && cfg.sensors.mm_per_rev > 0.0) {
            eyre::bail!("encoder.mm_per_rev must be finite and > 0");
        }
        if !(cfg.actuator.saturation_v.is_finite() && cfg.actuator.saturation_v > 0.0) {
            eyre::bail!("actuator.saturation_v must be finite and > 0");
        }
        let epoch = clock.now();
        Ok(Self {
            bus: SensorBus::new(encoder, imu, cfg.sensors.counts_per_rev),
            wheel: Sensor::new(SensorKind::WheelAngle, cfg.sensors.encoder_hz),
            tilt: Sensor::new(SensorKind::TiltAngle, cfg.sensors.imu_hz),
            tilt_rate: Sensor::new(SensorKind::TiltRate, cfg.sensors.imu_hz),
            motor,
            controller: Controller::new(cfg.actuator, cfg.sensors.mm_per_rev),
            latch: ResetLatch::default(),
            cycles: CycleCounter::default(),
            clock,
            epoch,
            last_start: None,
            default_cycle_ms: cfg.default_cycle_ms,
        })
    }

    /// Note the command as it stands now. Call after every received packet
    /// so short enable pulses between cycles are not missed.
    pub fn observe(&mut self, cmd: &Command) {
        self.latch.observe(cmd);
    }

    pub fn period(&self, cmd: &Command) -> Duration {
        cycle_period(cmd.parameters.variable.general.h_ms, self.default_cycle_ms)
    }

    /// True once a full period has passed since the last cycle started.
    pub fn cycle_due(&self, cmd: &Command) -> bool {
        match self.last_start {
            None => true,
            Some(t) => self.clock.now().saturating_duration_since(t) >= self.period(cmd),
        }
    }

    /// Time left until [`cycle_due`](Self::cycle_due) turns true.
    pub fn time_until_due(&self, cmd: &Command) -> Duration {
        match self.last_start {
            None => Duration::ZERO,
            Some(t) => self
                .period(cmd)
                .saturating_sub(self.clock.now().saturating_duration_since(t)),
        }
    }

    /// Run one control period and write its telemetry.
    pub fn cycle(&mut self, cmd: &Command, telemetry: &mut Telemetry) -> Result<ControlOutput> {
        let start = self.clock.now();
        let cycle_us = self.last_start.map_or(0, |t| {
            clamp_u32(u64::try_from(start.saturating_duration_since(t).as_micros()).unwrap_or(u64::MAX))
        });
        self.last_start = Some(start);

        self.latch.observe(cmd);
        if self.latch.take() {
            self.reset_tracking();
        }

        self.bus
            .refresh()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading imu")?;
        let stamp = CycleStamp {
            cycle: self.cycles.get(),
            now_us: self.clock.us_since(self.epoch),
        };
        let m = Measurements {
            wheel_angle: self.wheel.read(&self.bus, stamp),
            tilt_angle: self.tilt.read(&self.bus, stamp),
            tilt_rate: self.tilt_rate.read(&self.bus, stamp),
        };

        let params = ControlParams::snapshot(cmd, self.default_cycle_ms);
        let out = self.controller.step(&params, m);
        self.drive(out.motor)?;

        self.write_telemetry(telemetry, m, &out, cycle_us);
        self.cycles.advance();
        tracing::trace!(
            cycle = stamp.cycle,
            u = out.u,
            motor = out.motor.signed(),
            "control cycle"
        );
        Ok(out)
    }

    /// Run both IMU calibration routines. Blocks for as long as they take;
    /// the motor is stopped first.
    pub fn calibrate(&mut self) -> Result<()> {
        self.motor_stop()?;
        tracing::info!("imu calibration start");
        self.bus
            .imu_mut()
            .calibrate_accel_gyro()
            .map_err(|e| eyre::Report::new(calibration_error(&*e)))
            .wrap_err("calibrating accelerometer and gyro")?;
        self.bus
            .imu_mut()
            .calibrate_mag()
            .map_err(|e| eyre::Report::new(calibration_error(&*e)))
            .wrap_err("calibrating magnetometer")?;
        self.tilt.reset();
        self.tilt_rate.reset();
        // the pause is not a control period
        self.last_start = None;
        tracing::info!("imu calibration done");
        Ok(())
    }

    /// Stop the motor (best-effort callers log the error).
    pub fn motor_stop(&mut self) -> Result<()> {
        self.motor
            .stop()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("motor_stop")
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn encoder(&self) -> &E {
        self.bus.encoder()
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    fn reset_tracking(&mut self) {
        self.bus.encoder_mut().reset();
        self.wheel.reset();
        self.controller.reset_tracking();
        tracing::debug!(cycle = self.cycles.get(), "tracking origin reset");
    }

    fn drive(&mut self, cmd: MotorCommand) -> Result<()> {
        self.motor
            .drive(cmd.forward, cmd.backward)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("driving motor")
    }

    fn write_telemetry(
        &self,
        t: &mut Telemetry,
        m: Measurements,
        out: &ControlOutput,
        cycle_us: u32,
    ) {
        t.sensor.wheel = WheelReading {
            angle_rad: m.wheel_angle,
            angle_deriv_rad_s: self.wheel.derivative(),
        };
        t.sensor.tilt = AngleRate {
            angle_rad: m.tilt_angle,
            vel_rad_s: m.tilt_rate,
        };
        t.observer.wheel = AngleRate {
            angle_rad: out.x_hat[0],
            vel_rad_s: out.x_hat[1],
        };
        t.observer.tilt = AngleRate {
            angle_rad: out.x_hat[2],
            vel_rad_s: out.x_hat[3],
        };
        t.observer.position.s_mm = self.controller.to_mm(out.x_hat[0]);
        t.feedforward.wheel = AngleRate {
            angle_rad: out.x_ff[0],
            vel_rad_s: out.x_ff[1],
        };
        t.feedforward.tilt = AngleRate {
            angle_rad: out.x_ff[2],
            vel_rad_s: out.x_ff[3],
        };
        t.control = ControlBlock {
            cycle_us,
            u: out.u,
            u_bal: out.u_bal,
            u_pos: out.u_pos,
            u_ff: out.u_ff,
            motor: out.motor.signed(),
        };
    }
}

/// Calibration failures keep their own variant unless the hardware said more.
fn calibration_error(e: &(dyn std::error::Error + 'static)) -> BalancerError {
    match map_hw_error(e) {
        BalancerError::Hardware(msg) => BalancerError::Calibration(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_catches_enable_edge_once() {
        let mut latch = ResetLatch::default();
        let mut cmd = Command::default();
        latch.observe(&cmd);
        assert!(!latch.is_pending());
        cmd.control_state = true;
        latch.observe(&cmd);
        latch.observe(&cmd);
        assert!(latch.take());
        latch.observe(&cmd);
        assert!(!latch.take());
    }

    #[test]
    fn latch_keeps_pulse_seen_between_cycles() {
        let mut latch = ResetLatch::default();
        let mut cmd = Command::default();
        cmd.control_state = true;
        latch.observe(&cmd);
        cmd.control_state = false;
        latch.observe(&cmd);
        assert!(latch.take());
    }

    #[test]
    fn reset_pos_is_edge_triggered() {
        let mut latch = ResetLatch::default();
        let mut cmd = Command::default();
        cmd.reset_pos = true;
        latch.observe(&cmd);
        assert!(latch.take());
        latch.observe(&cmd);
        assert!(!latch.take());
    }
}
