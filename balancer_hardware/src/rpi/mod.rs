//! Raspberry Pi drivers (rppal): UART link, GPIO quadrature encoder,
//! MPU-9250 over I2C and a two-pin PWM H-bridge.
pub mod encoder;
pub mod motor;
pub mod mpu9250;
pub mod uart;

pub use encoder::GpioEncoder;
pub use motor::PwmMotor;
pub use mpu9250::Mpu9250;
pub use uart::{UartRx, UartTx, open_uart};
