//! Estimator and controller for one control period.
//!
//! Order within [`Controller::step`]:
//! correct, propagate feedforward, control law, actuate, predict, integrate.
//! The predicted and corrected estimates are kept apart: the corrected one
//! drives this cycle's decision, the predicted one is next cycle's prior.

pub mod actuator;
pub mod feedforward;
pub mod observer;
pub mod params;

use std::f64::consts::TAU;

use nalgebra::{Vector3, Vector4};

use crate::config::ActuatorCfg;
pub use actuator::{MotorCommand, deadzone, quantize};
pub use feedforward::Feedforward;
pub use observer::Observer;
pub use params::{ControlParams, FeedforwardMatrices, Gains, ObserverMatrices};

/// Sensor values for one cycle, in radians and rad/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurements {
    pub wheel_angle: f64,
    pub tilt_angle: f64,
    pub tilt_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlOutput {
    /// Corrected estimate.
    pub x_hat: Vector4<f64>,
    /// Feedforward model state.
    pub x_ff: Vector4<f64>,
    pub u: f64,
    pub u_bal: f64,
    pub u_pos: f64,
    pub u_ff: f64,
    /// Stop while control is disabled.
    pub motor: MotorCommand,
}

#[derive(Debug, Clone)]
pub struct Controller {
    observer: Observer,
    feedforward: Feedforward,
    integral: f64,
    actuator: ActuatorCfg,
    rad_per_mm: f64,
}

impl Controller {
    pub fn new(actuator: ActuatorCfg, mm_per_rev: f64) -> Self {
        let rad_per_mm = if mm_per_rev > 0.0 {
            TAU / mm_per_rev
        } else {
            0.0
        };
        Self {
            observer: Observer::new(),
            feedforward: Feedforward::new(),
            integral: 0.0,
            actuator,
            rad_per_mm,
        }
    }

    /// Wheel-angle reference for a setpoint in millimetres.
    pub fn reference(&self, pos_setpoint_mm: f64) -> f64 {
        pos_setpoint_mm * self.rad_per_mm
    }

    /// Travelled distance for a wheel angle.
    pub fn to_mm(&self, wheel_angle: f64) -> f64 {
        if self.rad_per_mm == 0.0 {
            0.0
        } else {
            wheel_angle / self.rad_per_mm
        }
    }

    pub fn step(&mut self, p: &ControlParams, m: Measurements) -> ControlOutput {
        let y = Vector3::new(m.wheel_angle, m.tilt_angle - p.alpha_off, m.tilt_rate);
        let x_hat = self.observer.correct(&y, &p.observer);
        let x_ff = self.feedforward.propagate(&p.feedforward);

        let r = self.reference(p.pos_setpoint_mm);
        let g = &p.gains;
        let u_ff = g.kr * r - g.feedback_row().dot(&x_ff);
        let e = x_ff - x_hat;
        let u_bal = g.k1 * e[1] + g.k2 * e[2] + g.k3 * e[3];
        let u_pos = g.k4 * e[0] + g.ki * self.integral;
        let u = u_ff + u_bal + u_pos;

        let (applied, motor) = if p.enabled {
            (u, quantize(u, &self.actuator, p.r_stop, p.r_start))
        } else {
            (0.0, MotorCommand::STOP)
        };

        self.observer.predict(applied, &p.observer);
        self.feedforward.record(u_ff);
        self.integral += (r - m.wheel_angle) * p.h();

        ControlOutput {
            x_hat,
            x_ff,
            u,
            u_bal,
            u_pos,
            u_ff,
            motor,
        }
    }

    /// New tracking origin: feedforward model, integral, and the wheel-angle estimate.
    pub fn reset_tracking(&mut self) {
        self.feedforward.reset();
        self.integral = 0.0;
        self.observer.zero_wheel_angle();
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn feedforward_state(&self) -> &Vector4<f64> {
        self.feedforward.state()
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }
}
