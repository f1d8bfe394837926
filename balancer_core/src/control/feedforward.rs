//! Reference model driven only by the controller's own feedforward output.

use nalgebra::Vector4;

use super::params::FeedforwardMatrices;

#[derive(Debug, Clone, Default)]
pub struct Feedforward {
    x: Vector4<f64>,
    u_prev: f64,
}

impl Feedforward {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one period with last cycle's feedforward output.
    pub fn propagate(&mut self, m: &FeedforwardMatrices) -> Vector4<f64> {
        self.x = m.phi * self.x + m.gamma * self.u_prev;
        self.x
    }

    pub fn record(&mut self, u_ff: f64) {
        self.u_prev = u_ff;
    }

    pub fn state(&self) -> &Vector4<f64> {
        &self.x
    }

    pub fn reset(&mut self) {
        self.x = Vector4::zeros();
        self.u_prev = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix4;

    #[test]
    fn input_enters_one_cycle_late() {
        let m = FeedforwardMatrices {
            phi: Matrix4::identity(),
            gamma: Vector4::new(1.0, 0.0, 0.0, 0.0),
        };
        let mut ff = Feedforward::new();
        ff.record(2.0);
        assert_eq!(ff.propagate(&m)[0], 2.0);
        ff.reset();
        assert_eq!(ff.propagate(&m), Vector4::zeros());
    }
}
