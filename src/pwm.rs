use log::info;
use rppal::gpio::{Gpio, OutputPin};

use crate::error::PwmError;

/// Contract over a PWM-capable output pin. One driver instance owns one pin.
///
/// Implemented by `SoftPwm` for real hardware and by a recording double in
/// tests.
pub trait PwmDriver: Send {
    /// Claims the pin and fixes the signal frequency. Failure here is fatal
    /// to controller initialization and is not retried.
    fn configure(&mut self, pin: u8, frequency: u32) -> Result<(), PwmError>;

    /// Applies a duty cycle, given in percent of the period.
    fn write(&mut self, duty_percent: f32) -> Result<(), PwmError>;

    /// Stops the PWM signal, leaving the pin level undefined.
    fn stop(&mut self) -> Result<(), PwmError>;

    /// Parks the pin at a low level.
    fn set_low(&mut self) -> Result<(), PwmError>;
}

/// Software PWM on a Raspberry Pi GPIO pin.
pub struct SoftPwm {
    pin: Option<OutputPin>,
    frequency: f64,
}

impl SoftPwm {
    pub fn new() -> Self {
        SoftPwm {
            pin: None,
            frequency: 0.0,
        }
    }
}

impl Default for SoftPwm {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmDriver for SoftPwm {
    fn configure(&mut self, pin: u8, frequency: u32) -> Result<(), PwmError> {
        let gpio = Gpio::new().map_err(|e| PwmError::Gpio(e.to_string()))?;
        let output = gpio
            .get(pin)
            .map_err(|e| PwmError::Gpio(e.to_string()))?
            .into_output_low();
        self.pin = Some(output);
        self.frequency = f64::from(frequency);
        info!("GPIO {} configured for software PWM at {}Hz", pin, frequency);
        Ok(())
    }

    fn write(&mut self, duty_percent: f32) -> Result<(), PwmError> {
        let pin = self.pin.as_mut().ok_or(PwmError::Unconfigured)?;
        pin.set_pwm_frequency(self.frequency, f64::from(duty_percent) / 100.0)
            .map_err(|e| PwmError::Gpio(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), PwmError> {
        let pin = self.pin.as_mut().ok_or(PwmError::Unconfigured)?;
        pin.clear_pwm().map_err(|e| PwmError::Gpio(e.to_string()))
    }

    fn set_low(&mut self) -> Result<(), PwmError> {
        let pin = self.pin.as_mut().ok_or(PwmError::Unconfigured)?;
        pin.set_low();
        Ok(())
    }
}
