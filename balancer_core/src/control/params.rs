//! Per-cycle parameter snapshot.
//!
//! The host may replace the command document between any two cycles. The
//! controller only ever sees a by-value copy taken at cycle start, so a
//! packet landing mid-cycle cannot change gains halfway through a step.

use std::time::Duration;

use nalgebra::{Matrix4, Matrix4x3, Vector4};

use crate::protocol::Command;
use crate::util::cycle_period;

#[derive(Debug, Clone, PartialEq)]
pub struct ObserverMatrices {
    /// Prediction gain L.
    pub l: Matrix4x3<f64>,
    pub phi: Matrix4<f64>,
    pub gamma: Vector4<f64>,
    /// Innovation gain Mx.
    pub mx: Matrix4x3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedforwardMatrices {
    pub phi: Matrix4<f64>,
    pub gamma: Vector4<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub ki: f64,
    pub kr: f64,
}

impl Gains {
    /// State-feedback row for the feedforward model, in state order.
    pub fn feedback_row(&self) -> Vector4<f64> {
        Vector4::new(self.k4, self.k1, self.k2, self.k3)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlParams {
    pub period: Duration,
    pub enabled: bool,
    pub pos_setpoint_mm: f64,
    pub alpha_off: f64,
    pub r_stop: u8,
    pub r_start: u8,
    pub gains: Gains,
    pub observer: ObserverMatrices,
    pub feedforward: FeedforwardMatrices,
}

fn mat4(rows: &[[f64; 4]; 4]) -> Matrix4<f64> {
    Matrix4::from_fn(|r, c| rows[r][c])
}

fn mat4x3(rows: &[[f64; 3]; 4]) -> Matrix4x3<f64> {
    Matrix4x3::from_fn(|r, c| rows[r][c])
}

impl ControlParams {
    pub fn snapshot(cmd: &Command, default_cycle_ms: u64) -> Self {
        let var = &cmd.parameters.variable;
        let inf = &cmd.parameters.inferred;
        Self {
            period: cycle_period(var.general.h_ms, default_cycle_ms),
            enabled: cmd.control_state,
            pos_setpoint_mm: cmd.pos_setpoint_mm,
            alpha_off: var.general.alpha_off,
            r_stop: var.general.r_stop,
            r_start: var.general.r_start,
            gains: Gains {
                k1: var.balance.k1,
                k2: var.balance.k2,
                k3: var.balance.k3,
                k4: var.position.k4,
                ki: var.position.ki,
                kr: var.position.kr,
            },
            observer: ObserverMatrices {
                l: mat4x3(&inf.observer.gain),
                phi: mat4(&inf.observer.phi),
                gamma: Vector4::from(inf.observer.gamma),
                mx: mat4x3(&inf.observer.inno_gain),
            },
            feedforward: FeedforwardMatrices {
                phi: mat4(&inf.feedforward.phi),
                gamma: Vector4::from(inf.feedforward.gamma),
            },
        }
    }

    /// Period in seconds, as used by the integrator.
    pub fn h(&self) -> f64 {
        self.period.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrices_are_row_major() {
        let mut cmd = Command::default();
        cmd.parameters.inferred.observer.phi[0][3] = 7.0;
        cmd.parameters.inferred.observer.inno_gain[3][1] = 2.5;
        let p = ControlParams::snapshot(&cmd, 10);
        assert_eq!(p.observer.phi[(0, 3)], 7.0);
        assert_eq!(p.observer.phi[(3, 0)], 0.0);
        assert_eq!(p.observer.mx[(3, 1)], 2.5);
    }

    #[test]
    fn zero_period_uses_default() {
        let cmd = Command::default();
        let p = ControlParams::snapshot(&cmd, 10);
        assert_eq!(p.period, Duration::from_millis(10));
        assert!((p.h() - 0.01).abs() < 1e-12);
    }
}
