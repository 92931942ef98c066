use rppal::gpio::{Gpio, OutputPin};

use crate::error::HardwareError;

/// A digital output such as a buzzer or an LED.
pub trait OutputLine: Send {
    fn set(&mut self, high: bool);
}

/// A Raspberry Pi GPIO pin (BCM numbering) driven as output, starting low.
pub struct GpioOutput {
    pin: OutputPin,
}

impl GpioOutput {
    pub fn open(gpio: &Gpio, bcm: u8) -> Result<Self, HardwareError> {
        let pin = gpio.get(bcm)?.into_output_low();
        Ok(Self { pin })
    }
}

impl OutputLine for GpioOutput {
    fn set(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
