use balancer_traits::{BoxError, Motor};
use rppal::gpio::{Gpio, OutputPin};

use crate::error::HwError;

/// H-bridge driven by software PWM on its forward and backward inputs.
pub struct PwmMotor {
    forward: OutputPin,
    backward: OutputPin,
    frequency_hz: f64,
}

impl PwmMotor {
    pub fn new(forward_pin: u8, backward_pin: u8, frequency_hz: f64) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut forward = gpio
            .get(forward_pin)
            .map_err(|e| HwError::Gpio(format!("motor forward pin {forward_pin}: {e}")))?
            .into_output();
        let mut backward = gpio
            .get(backward_pin)
            .map_err(|e| HwError::Gpio(format!("motor backward pin {backward_pin}: {e}")))?
            .into_output();
        forward.set_low();
        backward.set_low();
        Ok(Self {
            forward,
            backward,
            frequency_hz,
        })
    }

    fn apply(pin: &mut OutputPin, duty: u8, frequency_hz: f64) -> Result<(), HwError> {
        if duty == 0 {
            pin.clear_pwm().map_err(|e| HwError::Gpio(e.to_string()))?;
            pin.set_low();
            return Ok(());
        }
        pin.set_pwm_frequency(frequency_hz, f64::from(duty) / 255.0)
            .map_err(|e| HwError::Gpio(e.to_string()))
    }
}

impl Motor for PwmMotor {
    fn drive(&mut self, forward: u8, backward: u8) -> Result<(), BoxError> {
        // Release the idle side first so both inputs are never high together.
        if forward > 0 {
            Self::apply(&mut self.backward, 0, self.frequency_hz)?;
            Self::apply(&mut self.forward, forward, self.frequency_hz)?;
        } else {
            Self::apply(&mut self.forward, 0, self.frequency_hz)?;
            Self::apply(&mut self.backward, backward, self.frequency_hz)?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.drive(0, 0)
    }
}

impl Drop for PwmMotor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "failed to stop motor on drop");
        }
    }
}
