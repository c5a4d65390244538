use strum_macros::{Display, EnumIter};

use crate::config::ServoConfig;
use crate::constants::{MAX_ANGLE, MIN_ANGLE};

/// Logical position of the actuated mechanism.
#[derive(Debug, Display, EnumIter, Clone, Copy, Eq, PartialEq)]
pub enum GateState {
    #[strum(serialize = "OPEN")]
    Open,
    #[strum(serialize = "CLOSED")]
    Closed,
}

impl GateState {
    pub fn is_open(self) -> bool {
        matches!(self, GateState::Open)
    }
}

/// Point-in-time view of the actuator, read lock-free from the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub current_angle: f32,
    pub state: GateState,
    pub gpio_pin: u8,
    pub frequency: u32,
}

impl StatusSnapshot {
    pub fn render(&self) -> String {
        format!(
            "Servo: {} (position: {:.1}°) | GPIO: {} | frequency: {}Hz",
            self.state, self.current_angle, self.gpio_pin, self.frequency
        )
    }
}

pub(crate) fn clamp_angle(angle: f32) -> f32 {
    angle.max(MIN_ANGLE).min(MAX_ANGLE)
}

/// Maps a servo angle to a software-PWM duty cycle percentage.
///
/// The angle is interpolated into the configured pulse-width band and the
/// pulse is expressed as a fraction of the period derived from the configured
/// frequency. Always returns a finite value in `[0, 100]`.
pub fn angle_to_duty_cycle(angle: f32, servo: &ServoConfig) -> f32 {
    let angle = clamp_angle(angle);
    let span = (servo.max_pulse_width - servo.min_pulse_width) as f32;
    let pulse_width = servo.min_pulse_width as f32 + (angle / MAX_ANGLE) * span;
    let period_us = 1_000_000.0 / servo.frequency as f32;
    (pulse_width / period_us * 100.0).max(0.0).min(100.0)
}
