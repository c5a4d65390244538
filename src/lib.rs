mod config;
mod constants;
mod controller;
mod error;
mod psdk;
mod pwm;
mod types;

pub use config::{Config, PsdkConfig, ServoConfig, SystemConfig};
pub use controller::ServoController;
pub use error::{ConfigError, PsdkError, PwmError, ServoError, ServoResult};
pub use psdk::{ButtonHandler, ConsolePayload, StatusSink, WidgetBackend};
pub use pwm::{PwmDriver, SoftPwm};
pub use types::{angle_to_duty_cycle, GateState, StatusSnapshot};

// Re-export commonly used items
pub use constants::{MAX_ANGLE, MIN_ANGLE};
