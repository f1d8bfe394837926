#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the balancing robot.
//!
//! `Config` and its sections are deserialized from TOML and checked by
//! `Config::validate`. Only `[pins]` is mandatory; every other section
//! falls back to defaults that match the reference robot.
use serde::Deserialize;
use std::path::Path;

/// Worst-case encoded status frame: header, `{"msg":""}` and a fully
/// escaped 128-byte message.
pub const MIN_LINK_BUFFER_BYTES: usize = 3 + 10 + 128 * 6;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Serial {
    pub device: String,
    pub baud_rate: u32,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            device: "/dev/serial0".to_string(),
            baud_rate: 115_200,
        }
    }
}

/// How received bytes reach the packet parser.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RxMode {
    /// A periodic drain task moves bytes from the UART into the local buffer.
    #[default]
    Interrupt,
    /// The parser pulls bytes straight from the UART when it runs.
    Polled,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Link {
    pub rx_mode: RxMode,
    pub rx_buffer_size: usize,
    pub tx_buffer_size: usize,
    /// Period of the receive drain task (interrupt mode only)
    pub drain_period_us: u64,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            rx_mode: RxMode::Interrupt,
            rx_buffer_size: 1500,
            tx_buffer_size: 1500,
            drain_period_us: 1280,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub motor_forward: u8,
    pub motor_backward: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImuCfg {
    pub i2c_address: u16,
    /// Samples averaged per calibration pass
    pub calibration_samples: u32,
}

impl Default for ImuCfg {
    fn default() -> Self {
        Self {
            i2c_address: 0x68,
            calibration_samples: 200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EncoderCfg {
    pub counts_per_rev: u32,
    /// Wheel travel per revolution
    pub mm_per_rev: f64,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            counts_per_rev: 180,
            mm_per_rev: 130.0,
        }
    }
}

/// Sensor refresh limits; 0 means "every control cycle".
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SensorsCfg {
    pub encoder_hz: u32,
    pub imu_hz: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorCfg {
    pub voltage_factor: f64,
    pub saturation_v: f64,
    pub pwm_max: u8,
    pub pwm_frequency_hz: f64,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            voltage_factor: 1.0,
            saturation_v: 12.0,
            pwm_max: 255,
            pwm_frequency_hz: 20_000.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Cycle period used until the host sends `h_ms`
    pub default_cycle_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            default_cycle_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Sleep between main-loop iterations when nothing is due
    pub idle_sleep_us: u64,
    /// Stop after this many control cycles (unbounded when absent)
    pub max_cycles: Option<u64>,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            idle_sleep_us: 200,
            max_cycles: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub serial: Serial,
    #[serde(default)]
    pub link: Link,
    #[serde(default)]
    pub imu: ImuCfg,
    #[serde(default)]
    pub encoder: EncoderCfg,
    #[serde(default)]
    pub sensors: SensorsCfg,
    #[serde(default)]
    pub actuator: ActuatorCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.device.trim().is_empty() {
            eyre::bail!("serial.device must not be empty");
        }
        if self.serial.baud_rate == 0 {
            eyre::bail!("serial.baud_rate must be > 0");
        }

        // Link
        if self.link.rx_buffer_size < MIN_LINK_BUFFER_BYTES {
            eyre::bail!("link.rx_buffer_size must be >= {MIN_LINK_BUFFER_BYTES}");
        }
        if self.link.tx_buffer_size < MIN_LINK_BUFFER_BYTES {
            eyre::bail!("link.tx_buffer_size must be >= {MIN_LINK_BUFFER_BYTES}");
        }
        if self.link.rx_buffer_size > usize::from(u16::MAX) + 3 {
            eyre::bail!("link.rx_buffer_size must fit a 16-bit frame length");
        }
        if self.link.rx_mode == RxMode::Interrupt && self.link.drain_period_us == 0 {
            eyre::bail!("link.drain_period_us must be > 0");
        }

        // Pins
        if self.pins.encoder_a == self.pins.encoder_b {
            eyre::bail!("pins.encoder_a and pins.encoder_b must differ");
        }
        if self.pins.motor_forward == self.pins.motor_backward {
            eyre::bail!("pins.motor_forward and pins.motor_backward must differ");
        }

        // Sensors
        if self.encoder.counts_per_rev == 0 {
            eyre::bail!("encoder.counts_per_rev must be > 0");
        }
        if !(self.encoder.mm_per_rev.is_finite() && self.encoder.mm_per_rev > 0.0) {
            eyre::bail!("encoder.mm_per_rev must be > 0");
        }
        if self.imu.calibration_samples == 0 {
            eyre::bail!("imu.calibration_samples must be >= 1");
        }

        // Actuator
        if !(self.actuator.saturation_v.is_finite() && self.actuator.saturation_v > 0.0) {
            eyre::bail!("actuator.saturation_v must be > 0");
        }
        if !(self.actuator.voltage_factor.is_finite() && self.actuator.voltage_factor > 0.0) {
            eyre::bail!("actuator.voltage_factor must be > 0");
        }
        if self.actuator.pwm_max == 0 {
            eyre::bail!("actuator.pwm_max must be > 0");
        }
        if self.actuator.pwm_frequency_hz <= 0.0 {
            eyre::bail!("actuator.pwm_frequency_hz must be > 0");
        }

        // Control
        if self.control.default_cycle_ms == 0 {
            eyre::bail!("control.default_cycle_ms must be >= 1");
        }
        if self.control.default_cycle_ms > 1000 {
            eyre::bail!("control.default_cycle_ms is unreasonably large (>1s)");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
