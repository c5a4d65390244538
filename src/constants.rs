// Servo travel limits
pub const MIN_ANGLE: f32 = 0.0;
pub const MAX_ANGLE: f32 = 180.0;

// Defaults for an SG90-class servo on software PWM
pub const DEFAULT_GPIO_PIN: u8 = 18;
pub const DEFAULT_FREQUENCY_HZ: u32 = 50;
pub const DEFAULT_MIN_PULSE_US: u32 = 500;
pub const DEFAULT_MAX_PULSE_US: u32 = 2500;
pub const DEFAULT_POSITION_CLOSED: f32 = 0.0;
pub const DEFAULT_POSITION_OPEN: f32 = 180.0;
pub const DEFAULT_POSITION_REST: f32 = 0.0;

// Status loop
pub const DEFAULT_UPDATE_RATE_HZ: u32 = 50;

// Loop periods the shutdown path waits for the status task before aborting it
pub const SHUTDOWN_JOIN_PERIODS: u32 = 4;
