use balancer_traits::Encoder;
use rppal::gpio::{Gpio, InputPin, Level, Trigger};

use crate::error::HwError;
use crate::quadrature::{EncoderCounter, QuadratureDecoder};

/// Wheel encoder decoded from a GPIO edge interrupt on channel A.
///
/// The interrupt callback runs on rppal's poll thread and only touches the
/// decoder it owns plus the shared atomic counter.
pub struct GpioEncoder {
    counter: EncoderCounter,
    // Held so the async interrupt stays registered.
    _channel_a: InputPin,
}

impl GpioEncoder {
    pub fn attach(pin_a: u8, pin_b: u8) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut channel_a = gpio
            .get(pin_a)
            .map_err(|e| HwError::Gpio(format!("encoder A pin {pin_a}: {e}")))?
            .into_input_pullup();
        let channel_b = gpio
            .get(pin_b)
            .map_err(|e| HwError::Gpio(format!("encoder B pin {pin_b}: {e}")))?
            .into_input_pullup();

        let counter = EncoderCounter::new();
        let mut decoder = QuadratureDecoder::new(counter.clone(), channel_a.is_high());
        channel_a
            .set_async_interrupt(Trigger::Both, move |level: Level| {
                decoder.on_edge(level == Level::High, channel_b.is_high());
            })
            .map_err(|e| HwError::Gpio(format!("encoder interrupt: {e}")))?;
        tracing::info!(pin_a, pin_b, "encoder attached");

        Ok(Self {
            counter,
            _channel_a: channel_a,
        })
    }
}

impl Encoder for GpioEncoder {
    fn count(&self) -> i32 {
        self.counter.get()
    }

    fn reset(&mut self) {
        self.counter.set(0);
    }
}
