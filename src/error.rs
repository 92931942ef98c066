use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the PWM driver. Never retried internally.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("bus write to register 0x{register:02X} failed: {cause}")]
    BusWriteFailed {
        register: u8,
        #[source]
        cause: io::Error,
    },

    #[error("bus read from register 0x{register:02X} failed: {cause}")]
    BusReadFailed {
        register: u8,
        #[source]
        cause: io::Error,
    },

    #[error("PWM channel {0} does not exist (0-15)")]
    InvalidChannel(u8),

    #[error("PWM frequency {0} Hz cannot be generated")]
    InvalidFrequency(f64),
}

/// Startup configuration problems. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{axis} axis: range min={min} max={max} center={center:?} is invalid")]
    InvalidRange {
        axis: String,
        min: u16,
        max: u16,
        center: Option<u16>,
    },

    #[error("{axis} axis: scale {scale} must lie in (0, 1]")]
    InvalidScale { axis: String, scale: f64 },

    #[error("{axis} axis: channel {channel} does not exist (0-15)")]
    InvalidChannel { axis: String, channel: u8 },

    #[error("X and Y axes are both bound to channel {0}")]
    SharedChannel(u8),

    #[error("invalid timing: {0}")]
    InvalidTiming(&'static str),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// Opening the Raspberry Pi peripherals failed.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("GPIO unavailable: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("I2C unavailable: {0}")]
    I2c(#[from] rppal::i2c::Error),
}

/// A best-effort action failed. Reported and logged, never propagated.
#[derive(Debug, Error)]
#[error("{context}: centering failed: {error}")]
pub struct Fault {
    pub context: &'static str,
    #[source]
    pub error: DriverError,
}
