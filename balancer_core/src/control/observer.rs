//! Predict/correct state observer.
//!
//! State order: wheel angle, wheel rate, tilt angle, tilt rate. The
//! measurement picks wheel angle, tilt angle and tilt rate.

use nalgebra::{Matrix3x4, Vector3, Vector4};

use super::params::ObserverMatrices;

/// Measurement matrix C.
pub fn measurement_matrix() -> Matrix3x4<f64> {
    Matrix3x4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

#[derive(Debug, Clone, Default)]
pub struct Observer {
    x_pred: Vector4<f64>,
    innovation: Vector3<f64>,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corrected estimate for the current instant.
    pub fn correct(&mut self, y: &Vector3<f64>, m: &ObserverMatrices) -> Vector4<f64> {
        self.innovation = y - measurement_matrix() * self.x_pred;
        self.x_pred + m.mx * self.innovation
    }

    /// Advance the persistent estimate by one period with the input actually applied.
    pub fn predict(&mut self, applied: f64, m: &ObserverMatrices) {
        self.x_pred = m.phi * self.x_pred + m.gamma * applied + m.l * self.innovation;
    }

    /// The encoder origin moved; the wheel-angle estimate follows it.
    pub fn zero_wheel_angle(&mut self) {
        self.x_pred[0] = 0.0;
    }

    #[cfg(test)]
    fn predicted(&self) -> &Vector4<f64> {
        &self.x_pred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix4, Matrix4x3};

    fn identity_model() -> ObserverMatrices {
        ObserverMatrices {
            l: Matrix4x3::zeros(),
            phi: Matrix4::identity(),
            gamma: Vector4::zeros(),
            mx: measurement_matrix().transpose(),
        }
    }

    #[test]
    fn full_innovation_gain_tracks_measured_states() {
        let m = identity_model();
        let mut obs = Observer::new();
        let x = obs.correct(&Vector3::new(1.0, 0.2, -0.5), &m);
        assert_eq!(x, Vector4::new(1.0, 0.0, 0.2, -0.5));
        assert_eq!(obs.predicted(), &Vector4::zeros());
    }

    #[test]
    fn predict_applies_input_and_innovation() {
        let mut m = identity_model();
        m.gamma = Vector4::new(0.0, 1.0, 0.0, 0.0);
        m.l = measurement_matrix().transpose() * 0.5;
        let mut obs = Observer::new();
        obs.correct(&Vector3::new(2.0, 0.0, 0.0), &m);
        obs.predict(3.0, &m);
        assert_eq!(obs.predicted(), &Vector4::new(1.0, 3.0, 0.0, 0.0));
        obs.zero_wheel_angle();
        assert_eq!(obs.predicted()[0], 0.0);
    }
}
