#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::many_single_char_names
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Self-balancing robot core (hardware-agnostic).
//!
//! All hardware goes through the `balancer_traits` interfaces: a byte source
//! and sink for the serial link, `Encoder`, `Imu` and `Motor` for the plant.
//!
//! ## Architecture
//!
//! - **Protocol**: `$` + big-endian u16 length + JSON framing, a resumable
//!   receive state machine and a bounded transmit queue (`protocol`)
//! - **Sensors**: rate-limited readings with a backward-difference derivative (`sensor`)
//! - **Control**: predict/correct observer, feedforward model, state feedback
//!   with integral action and deadzone-compensated PWM output (`control`)
//! - **Loop**: one fixed-rate cycle with edge-triggered tracking resets (`balance`)
//! - **Runner**: the cooperative main loop tying link and cycle together (`runner`)

pub mod balance;
pub mod config;
pub mod control;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod protocol;
pub mod runner;
pub mod sensor;
pub mod status;
pub mod util;

pub use balance::{BalanceLoop, ResetLatch};
pub use config::{ActuatorCfg, LinkCfg, LoopCfg, RunnerCfg, RxMode, SensorCfg};
pub use control::{ControlOutput, ControlParams, Controller, Measurements, MotorCommand};
pub use error::{BalancerError, CodecError, Result, TransmitError};
pub use protocol::{Command, Link, StatusMessage, Telemetry};
pub use runner::{RunStats, run};
pub use status::ReceiveCode;
