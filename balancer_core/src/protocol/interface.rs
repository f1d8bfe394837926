//! Wire schemas. Inbound: the host's command and tuning parameters.
//! Outbound: one telemetry document per control cycle.
//!
//! Key names are fixed by the host tool, including the capitalized section
//! names under `parameters.variable` and `innoGain`.

use serde::{Deserialize, Serialize};

use super::message::StatusMessage;

/// Everything the host can set. Missing keys keep their zero default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    pub calibration: bool,
    pub control_state: bool,
    pub pos_setpoint_mm: f64,
    pub reset_pos: bool,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub variable: Variable,
    pub inferred: Inferred,
}

/// Hand-tuned values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    #[serde(rename = "General")]
    pub general: General,
    #[serde(rename = "BalanceControl")]
    pub balance: BalanceGains,
    #[serde(rename = "PositionControl")]
    pub position: PositionGains,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    /// Control period in milliseconds; 0 keeps the configured default.
    pub h_ms: u16,
    /// Tilt reading of the upright robot, subtracted before estimation.
    pub alpha_off: f64,
    /// Raw PWM below which the motor is not driven at all.
    pub r_stop: u8,
    /// First PWM value that actually turns the wheel.
    pub r_start: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceGains {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionGains {
    pub k4: f64,
    pub ki: f64,
    /// Reference-tracking gain on the position setpoint.
    pub kr: f64,
}

/// Values derived offline from the plant model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inferred {
    pub observer: ObserverParams,
    pub feedforward: FeedforwardParams,
}

/// State order: wheel angle, wheel rate, tilt angle, tilt rate.
/// Measurement order: wheel angle, tilt angle, tilt rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverParams {
    /// Prediction gain L (4x3).
    pub gain: [[f64; 3]; 4],
    /// State transition Phi (4x4).
    pub phi: [[f64; 4]; 4],
    /// Input vector Gamma (4).
    pub gamma: [f64; 4],
    /// Innovation gain Mx (4x3).
    #[serde(rename = "innoGain")]
    pub inno_gain: [[f64; 3]; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedforwardParams {
    pub phi: [[f64; 4]; 4],
    pub gamma: [f64; 4],
}

/// Per-cycle telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    pub sensor: SensorBlock,
    pub observer: ObserverBlock,
    pub feedforward: FeedforwardBlock,
    pub control: ControlBlock,
    pub calibrated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorBlock {
    pub wheel: WheelReading,
    pub tilt: AngleRate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelReading {
    pub angle_rad: f64,
    pub angle_deriv_rad_s: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleRate {
    pub angle_rad: f64,
    pub vel_rad_s: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverBlock {
    pub wheel: AngleRate,
    pub tilt: AngleRate,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub s_mm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedforwardBlock {
    pub wheel: AngleRate,
    pub tilt: AngleRate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlBlock {
    /// Duration of the previous control cycle.
    pub cycle_us: u32,
    pub u: f64,
    pub u_bal: f64,
    pub u_pos: f64,
    pub u_ff: f64,
    /// Signed PWM command actually sent to the motor.
    pub motor: i16,
}

/// Outbound telemetry frame: the cycle's telemetry plus any pending diagnostic.
#[derive(Debug, Serialize)]
pub struct TelemetryPacket<'a> {
    #[serde(skip_serializing_if = "message_is_empty")]
    pub msg: &'a StatusMessage,
    #[serde(flatten)]
    pub telemetry: &'a Telemetry,
}

/// Outbound diagnostic-only frame.
#[derive(Debug, Serialize)]
pub struct StatusPacket<'a> {
    pub msg: &'a StatusMessage,
}

fn message_is_empty(msg: &&StatusMessage) -> bool {
    msg.is_empty()
}
