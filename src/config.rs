use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FREQUENCY_HZ, DEFAULT_GPIO_PIN, DEFAULT_MAX_PULSE_US, DEFAULT_MIN_PULSE_US,
    DEFAULT_POSITION_CLOSED, DEFAULT_POSITION_OPEN, DEFAULT_POSITION_REST,
    DEFAULT_UPDATE_RATE_HZ, MAX_ANGLE, MIN_ANGLE,
};
use crate::error::ConfigError;

/// Physical servo parameters. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub gpio_pin: u8,
    /// PWM signal frequency in Hz.
    pub frequency: u32,
    /// Pulse width at 0°, in microseconds.
    pub min_pulse_width: u32,
    /// Pulse width at 180°, in microseconds.
    pub max_pulse_width: u32,
    pub position_closed: f32,
    pub position_open: f32,
    /// Rest position taken on initialize and shutdown.
    pub default_position: f32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        ServoConfig {
            gpio_pin: DEFAULT_GPIO_PIN,
            frequency: DEFAULT_FREQUENCY_HZ,
            min_pulse_width: DEFAULT_MIN_PULSE_US,
            max_pulse_width: DEFAULT_MAX_PULSE_US,
            position_closed: DEFAULT_POSITION_CLOSED,
            position_open: DEFAULT_POSITION_OPEN,
            default_position: DEFAULT_POSITION_REST,
        }
    }
}

/// Identity of the payload and its toggle widget in the ground-control app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PsdkConfig {
    pub app_name: String,
    pub app_version: String,
    pub button_id: String,
    pub button_name: String,
    pub button_description: String,
}

impl Default for PsdkConfig {
    fn default() -> Self {
        PsdkConfig {
            app_name: "Servo Controller".to_string(),
            app_version: "1.0.0".to_string(),
            button_id: "servo_toggle".to_string(),
            button_name: "Servo Toggle".to_string(),
            button_description: "Toggles the servo position".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
    /// Status republish rate in Hz.
    pub update_rate: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            log_level: "INFO".to_string(),
            update_rate: DEFAULT_UPDATE_RATE_HZ,
        }
    }
}

impl SystemConfig {
    pub fn update_period(&self) -> Duration {
        Duration::from_millis(u64::from(1000 / self.update_rate.max(1)).max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub servo: ServoConfig,
    pub psdk: PsdkConfig,
    pub system: SystemConfig,
}

impl Config {
    /// Loads and validates a JSON configuration file. Missing sections and
    /// fields fall back to their defaults; a missing or malformed file is a
    /// hard error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let servo = &self.servo;
        if servo.frequency == 0 {
            return Err(ConfigError::Invalid(
                "servo.frequency must be greater than zero".to_string(),
            ));
        }
        if servo.min_pulse_width >= servo.max_pulse_width {
            return Err(ConfigError::Invalid(format!(
                "servo.min_pulse_width ({}) must be below servo.max_pulse_width ({})",
                servo.min_pulse_width, servo.max_pulse_width
            )));
        }
        for (name, angle) in [
            ("servo.position_closed", servo.position_closed),
            ("servo.position_open", servo.position_open),
            ("servo.default_position", servo.default_position),
        ] {
            if !(MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within {}..{} degrees, got {}",
                    name, MIN_ANGLE, MAX_ANGLE, angle
                )));
            }
        }
        if self.system.update_rate == 0 {
            return Err(ConfigError::Invalid(
                "system.update_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
