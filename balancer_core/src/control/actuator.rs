//! Voltage to PWM quantization with deadzone compensation.

use crate::config::ActuatorCfg;

/// Duty cycles for the two H-bridge inputs. At most one is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorCommand {
    pub forward: u8,
    pub backward: u8,
}

impl MotorCommand {
    pub const STOP: Self = Self {
        forward: 0,
        backward: 0,
    };

    /// Forward positive, backward negative.
    pub fn signed(self) -> i16 {
        i16::from(self.forward) - i16::from(self.backward)
    }

    pub fn is_stopped(self) -> bool {
        self.forward == 0 && self.backward == 0
    }
}

/// Dead-band remap of a raw magnitude in `0..=max`.
///
/// Below `r_stop` the wheel would not turn, so nothing is driven. From
/// `r_stop` up, the range is stretched to start at `r_start` instead.
pub fn deadzone(raw: u8, r_stop: u8, r_start: u8, max: u8) -> u8 {
    if raw == 0 || raw < r_stop {
        return 0;
    }
    if r_stop >= max {
        return max;
    }
    let (raw, stop, start, max) = (
        u32::from(raw.min(max)),
        u32::from(r_stop),
        u32::from(r_start.min(max)),
        u32::from(max),
    );
    let out = start + (raw - stop) * (max - start) / (max - stop);
    // out <= max since raw <= max
    u8::try_from(out.min(max)).unwrap_or(u8::MAX)
}

/// Quantize a control voltage into a motor command.
pub fn quantize(u: f64, cfg: &ActuatorCfg, r_stop: u8, r_start: u8) -> MotorCommand {
    if cfg.saturation_v.is_nan() || cfg.saturation_v <= 0.0 || cfg.pwm_max == 0 {
        return MotorCommand::STOP;
    }
    let v = if u.is_nan() {
        0.0
    } else {
        (u * cfg.voltage_factor).clamp(-cfg.saturation_v, cfg.saturation_v)
    };
    let scaled = (v.abs() / cfg.saturation_v * f64::from(cfg.pwm_max)).round();
    let raw = scaled.clamp(0.0, f64::from(cfg.pwm_max)) as u8;
    let duty = deadzone(raw, r_stop, r_start, cfg.pwm_max);
    if v >= 0.0 {
        MotorCommand {
            forward: duty,
            backward: 0,
        }
    } else {
        MotorCommand {
            forward: 0,
            backward: duty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 20, 40, 0)]
    #[case(19, 20, 40, 0)]
    #[case(20, 20, 40, 40)]
    #[case(255, 20, 40, 255)]
    #[case(100, 0, 0, 100)]
    #[case(5, 255, 40, 0)]
    #[case(255, 255, 40, 255)]
    fn deadzone_cases(#[case] raw: u8, #[case] stop: u8, #[case] start: u8, #[case] out: u8) {
        assert_eq!(deadzone(raw, stop, start, 255), out);
    }

    #[test]
    fn sign_selects_direction() {
        let cfg = ActuatorCfg::default();
        let fwd = quantize(6.0, &cfg, 0, 0);
        assert_eq!(fwd.backward, 0);
        assert_eq!(fwd.forward, 128);
        let back = quantize(-6.0, &cfg, 0, 0);
        assert_eq!(back.forward, 0);
        assert_eq!(back.signed(), -128);
    }

    #[test]
    fn saturates_and_ignores_nan() {
        let cfg = ActuatorCfg::default();
        assert_eq!(quantize(1e9, &cfg, 0, 0).forward, 255);
        assert_eq!(quantize(-1e9, &cfg, 0, 0).backward, 255);
        assert!(quantize(f64::NAN, &cfg, 0, 0).is_stopped());
    }
}
