//! Hardware backends: simulated devices for tests and the desktop simulator,
//! and Raspberry Pi drivers behind the `hardware` feature.
pub mod error;
pub mod quadrature;
pub mod serial_sim;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;

use balancer_traits::{BoxError, Encoder, Imu, ImuSample, Motor};
use std::sync::{Arc, Mutex};

pub use quadrature::{EncoderCounter, QuadratureDecoder};
pub use serial_sim::{SimHost, SimRx, SimTx, sim_serial};

/// Simulated wheel encoder driven through the same decoder as the GPIO path.
pub struct SimulatedEncoder {
    decoder: QuadratureDecoder,
    a: bool,
}

impl Default for SimulatedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEncoder {
    pub fn new() -> Self {
        Self {
            decoder: QuadratureDecoder::new(EncoderCounter::new(), false),
            a: false,
        }
    }

    /// Handle observing (and able to reset) the same count.
    pub fn counter(&self) -> EncoderCounter {
        self.decoder.counter().clone()
    }

    /// Emit `steps` full A cycles; B leads or lags A depending on direction.
    pub fn rotate(&mut self, steps: i32) {
        let forward = steps >= 0;
        for _ in 0..steps.unsigned_abs() {
            self.a = !self.a;
            let b = if forward { self.a } else { !self.a };
            self.decoder.on_edge(self.a, b);
            self.a = !self.a;
            self.decoder.on_edge(self.a, b);
        }
    }
}

impl Encoder for SimulatedEncoder {
    fn count(&self) -> i32 {
        self.decoder.counter().get()
    }

    fn reset(&mut self) {
        self.decoder.counter().set(0);
    }
}

#[derive(Debug, Default)]
struct ImuState {
    sample: ImuSample,
    accel_gyro_calibrations: u32,
    mag_calibrations: u32,
    fail_calibration: bool,
}

/// Simulated IMU. Clones share state so a test can steer the reading.
#[derive(Debug, Clone, Default)]
pub struct SimulatedImu {
    state: Arc<Mutex<ImuState>>,
}

impl SimulatedImu {
    /// Standing still and upright: gravity on -Y.
    pub fn upright() -> Self {
        let imu = Self::default();
        imu.set_sample(ImuSample {
            accel: [0.0, -1.0, 0.0],
            gyro_dps: [0.0; 3],
        });
        imu
    }

    pub fn set_sample(&self, sample: ImuSample) {
        if let Ok(mut s) = self.state.lock() {
            s.sample = sample;
        }
    }

    pub fn fail_calibration(&self, fail: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_calibration = fail;
        }
    }

    /// (accel/gyro, magnetometer) calibration run counts.
    pub fn calibrations(&self) -> (u32, u32) {
        self.state
            .lock()
            .map(|s| (s.accel_gyro_calibrations, s.mag_calibrations))
            .unwrap_or_default()
    }
}

impl Imu for SimulatedImu {
    fn update(&mut self) -> Result<bool, BoxError> {
        Ok(true)
    }

    fn sample(&self) -> ImuSample {
        self.state.lock().map(|s| s.sample).unwrap_or_default()
    }

    fn calibrate_accel_gyro(&mut self) -> Result<(), BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| error::HwError::Calibration("imu state poisoned".into()))?;
        if s.fail_calibration {
            return Err(error::HwError::Calibration("device moved during calibration".into()).into());
        }
        s.accel_gyro_calibrations += 1;
        tracing::debug!("accel/gyro calibrated (simulated)");
        Ok(())
    }

    fn calibrate_mag(&mut self) -> Result<(), BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| error::HwError::Calibration("imu state poisoned".into()))?;
        s.mag_calibrations += 1;
        tracing::debug!("magnetometer calibrated (simulated)");
        Ok(())
    }
}

/// Simulated motor that remembers the last command. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMotor {
    last: Arc<Mutex<(u8, u8)>>,
}

impl SimulatedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last (forward, backward) duty pair.
    pub fn last_command(&self) -> (u8, u8) {
        self.last.lock().map(|g| *g).unwrap_or_default()
    }
}

impl Motor for SimulatedMotor {
    fn drive(&mut self, forward: u8, backward: u8) -> Result<(), BoxError> {
        if let Ok(mut g) = self.last.lock() {
            *g = (forward, backward);
        }
        tracing::trace!(forward, backward, "motor drive (simulated)");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.drive(0, 0)
    }
}
