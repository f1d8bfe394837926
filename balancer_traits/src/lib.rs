//! Hardware seams for the balancing robot.
//!
//! Everything the core touches on the outside world goes through one of these
//! traits: the serial link halves, the wheel encoder, the IMU and the motor
//! driver. Errors cross the boundary boxed so backends can bring their own types.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Receive half of a byte stream with a small fixed hardware buffer (UART FIFO).
pub trait ByteSource {
    /// Bytes that can be read right now without blocking.
    fn available(&self) -> usize;

    /// Size of the hardware receive buffer.
    fn capacity(&self) -> usize;

    /// Read up to `buf.len()` bytes without blocking; returns the count read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError>;
}

/// Transmit half of a byte stream.
pub trait ByteSink {
    /// Bytes the transport accepts right now without blocking.
    fn available_for_write(&self) -> usize;

    /// Write without blocking; returns the count accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, BoxError>;

    /// Blocking write of the whole slice.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError>;
}

/// Quadrature-decoded wheel position in counts.
pub trait Encoder {
    fn count(&self) -> i32;
    fn reset(&mut self);
}

/// One raw inertial sample: acceleration in g and angular rate in deg/s.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub accel: [f32; 3],
    pub gyro_dps: [f32; 3],
}

pub trait Imu {
    /// Poll the device; `Ok(true)` when a new sample was latched.
    fn update(&mut self) -> Result<bool, BoxError>;

    /// Most recently latched sample.
    fn sample(&self) -> ImuSample;

    /// Blocking accelerometer/gyro bias calibration. The robot must be still.
    fn calibrate_accel_gyro(&mut self) -> Result<(), BoxError>;

    /// Blocking magnetometer calibration.
    fn calibrate_mag(&mut self) -> Result<(), BoxError>;
}

/// Two-input H-bridge motor driver.
pub trait Motor {
    /// Drive with PWM duty on the forward and backward inputs.
    /// At most one of the two is non-zero.
    fn drive(&mut self, forward: u8, backward: u8) -> Result<(), BoxError>;
    fn stop(&mut self) -> Result<(), BoxError>;
}
