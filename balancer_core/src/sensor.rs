//! Sensor adapter: rate-limited, memoized scalar readings with a
//! backward-difference derivative.
//!
//! The three measured quantities share one implementation; only the
//! sampling step differs per [`SensorKind`].

use balancer_traits::{BoxError, Encoder, Imu};
use std::f64::consts::TAU;

use crate::util::period_us;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Encoder count converted to radians.
    WheelAngle,
    /// `atan2(acc_z, -acc_y)`, zero with the robot upright.
    TiltAngle,
    /// Gyro X in rad/s.
    TiltRate,
}

/// The physical devices behind the sensors.
pub struct SensorBus<E, I> {
    encoder: E,
    imu: I,
    rad_per_count: f64,
}

impl<E: Encoder, I: Imu> SensorBus<E, I> {
    pub fn new(encoder: E, imu: I, counts_per_rev: u32) -> Self {
        Self {
            encoder,
            imu,
            rad_per_count: TAU / f64::from(counts_per_rev.max(1)),
        }
    }

    /// Latch a new IMU sample if the device has one.
    pub fn refresh(&mut self) -> Result<bool, BoxError> {
        self.imu.update()
    }

    pub fn sample(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::WheelAngle => f64::from(self.encoder.count()) * self.rad_per_count,
            SensorKind::TiltAngle => {
                let s = self.imu.sample();
                f64::from(s.accel[2]).atan2(-f64::from(s.accel[1]))
            }
            SensorKind::TiltRate => f64::from(self.imu.sample().gyro_dps[0]).to_radians(),
        }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn encoder_mut(&mut self) -> &mut E {
        &mut self.encoder
    }

    pub fn imu_mut(&mut self) -> &mut I {
        &mut self.imu
    }
}

/// Monotonic count of completed control cycles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleCounter(u64);

impl CycleCounter {
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// When a reading is requested: which cycle, and the time in microseconds.
#[derive(Debug, Clone, Copy)]
pub struct CycleStamp {
    pub cycle: u64,
    pub now_us: u64,
}

#[derive(Debug, Clone)]
pub struct Sensor {
    kind: SensorKind,
    window_us: Option<u64>,
    value: f64,
    prev_value: f64,
    ts_us: Option<u64>,
    prev_ts_us: Option<u64>,
    last_cycle: Option<u64>,
}

impl Sensor {
    /// `freq_hz == 0` samples once per cycle with no time limit.
    pub fn new(kind: SensorKind, freq_hz: u32) -> Self {
        Self {
            kind,
            window_us: (freq_hz > 0).then(|| period_us(freq_hz)),
            value: 0.0,
            prev_value: 0.0,
            ts_us: None,
            prev_ts_us: None,
            last_cycle: None,
        }
    }

    /// Current value, sampling at most once per cycle and once per rate window.
    pub fn read<E: Encoder, I: Imu>(&mut self, bus: &SensorBus<E, I>, stamp: CycleStamp) -> f64 {
        let new_cycle = self.last_cycle != Some(stamp.cycle);
        let window_open = match (self.window_us, self.ts_us) {
            (Some(window), Some(ts)) => stamp.now_us.saturating_sub(ts) >= window,
            _ => true,
        };
        if new_cycle && window_open {
            self.prev_value = self.value;
            self.prev_ts_us = self.ts_us;
            self.value = bus.sample(self.kind);
            self.ts_us = Some(stamp.now_us);
            self.last_cycle = Some(stamp.cycle);
        }
        self.value
    }

    /// Last value without sampling.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Per-second change between the last two updates; 0 until there are two.
    pub fn derivative(&self) -> f64 {
        match (self.ts_us, self.prev_ts_us) {
            (Some(ts), Some(prev)) if ts > prev => {
                (self.value - self.prev_value) / (ts - prev) as f64 * 1e6
            }
            _ => 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.prev_value = 0.0;
        self.ts_us = None;
        self.prev_ts_us = None;
        self.last_cycle = None;
    }
}
