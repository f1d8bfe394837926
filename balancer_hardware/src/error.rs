use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("uart error: {0}")]
    Uart(String),
    #[error("imu data-ready timeout")]
    DataReadyTimeout,
    #[error("calibration failed: {0}")]
    Calibration(String),
    #[error("serial link disconnected")]
    Disconnected,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
