use thiserror::Error;

pub type ServoResult<T> = Result<T, ServoError>;

/// Failures while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures at the GPIO/PWM boundary.
#[derive(Debug, Error)]
pub enum PwmError {
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("PWM channel is not configured")]
    Unconfigured,
}

/// Errors surfaced by the servo controller's public operations.
#[derive(Debug, Error)]
pub enum ServoError {
    #[error("hardware initialization failed: {0}")]
    HardwareInit(#[from] PwmError),
    #[error("actuation failed: {0}")]
    Actuation(PwmError),
    #[error("controller is not initialized")]
    NotInitialized,
}

/// Failures at the payload SDK boundary.
#[derive(Debug, Error)]
pub enum PsdkError {
    #[error("widget registration failed: {0}")]
    Registration(String),
    #[error("status sink unavailable: {0}")]
    SinkUnavailable(String),
}
