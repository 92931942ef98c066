use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::alert::AlertPattern;
use crate::detector::WatcherTiming;
use crate::error::ConfigError;
use crate::gpio_input::{PolaritySetting, Pull, SensorKind};
use crate::servo::{PwmChannelConfig, ServoEndpoint};

// ** PWM CONFIGURATION ** //

/// Default PCA9685 I2C address and bus (/dev/i2c-1)
pub const PCA_ADDRESS: u16 = 0x40;
pub const I2C_BUS: u8 = 1;
/// Standard servo PWM frequency (Hz)
pub const SERVO_FREQUENCY_HZ: f64 = 50.0;

//  ** GIMBAL CONFIGURATION ** //

/// Ticks are 0~4095 per 20 ms period. Tune with the `calibrate` binary.
pub const X_AXIS: PwmChannelConfig = PwmChannelConfig {
    channel: 0,
    min: 180,
    max: 480,
    center: Some(380),
    scale: 0.55,
};
pub const Y_AXIS: PwmChannelConfig = PwmChannelConfig {
    channel: 2,
    min: 190,
    max: 560,
    center: Some(430),
    scale: 0.75,
};

// ** GPIO CONFIGURATION (BCM numbering) ** //

/// Goal switch: GPIO17 <-> switch <-> GND, internal pull-up
pub const GOAL_GPIO: u8 = 17;
pub const WIN_GPIO: u8 = 23;
pub const LED_GPIO: u8 = 24;
pub const BUZZER_GPIO: u8 = 22;

// ** TIMING CONFIGURATION ** //

pub const POLL_INTERVAL_MS: u64 = 20;
pub const STABLE_SAMPLES: u32 = 50;
/// How long an `auto` polarity line is watched at startup
pub const POLARITY_PROBE_MS: u64 = 1200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pwm: PwmSection,
    pub gimbal: GimbalSection,
    pub goal: TriggerSection,
    /// Optional IR "win" sensor checked after every tilt.
    pub win: Option<TriggerSection>,
    pub alert: AlertSection,
    pub detector: DetectorSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmSection {
    pub bus: u8,
    pub address: u16,
    pub frequency_hz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GimbalSection {
    pub x: PwmChannelConfig,
    pub y: PwmChannelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSection {
    pub sensor: SensorKind,
    pub pin: u8,
    pub pull: Pull,
    pub polarity: PolaritySetting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSection {
    pub buzzer_pin: u8,
    pub led_pin: Option<u8>,
    /// Played by the goal watcher.
    pub goal: AlertPattern,
    /// Played once when the win sensor trips.
    pub celebration: AlertPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSection {
    pub poll_interval_ms: u64,
    pub stable_samples: u32,
    pub polarity_probe_ms: u64,
}

impl Default for PwmSection {
    fn default() -> Self {
        Self {
            bus: I2C_BUS,
            address: PCA_ADDRESS,
            frequency_hz: SERVO_FREQUENCY_HZ,
        }
    }
}

impl Default for GimbalSection {
    fn default() -> Self {
        Self {
            x: X_AXIS,
            y: Y_AXIS,
        }
    }
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            sensor: SensorKind::Button,
            pin: GOAL_GPIO,
            pull: Pull::Up,
            polarity: PolaritySetting::ActiveLow,
        }
    }
}

impl TriggerSection {
    /// The IR break-beam receiver, polarity detected at startup.
    pub fn ir_beam() -> Self {
        Self {
            sensor: SensorKind::IrBeam,
            pin: WIN_GPIO,
            pull: Pull::Up,
            polarity: PolaritySetting::Auto,
        }
    }
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            buzzer_pin: BUZZER_GPIO,
            led_pin: Some(LED_GPIO),
            goal: AlertPattern::Beep { on_ms: 800 },
            celebration: AlertPattern::Pulses {
                count: 2,
                on_ms: 120,
                off_ms: 100,
            },
        }
    }
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL_MS,
            stable_samples: STABLE_SAMPLES,
            polarity_probe_ms: POLARITY_PROBE_MS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pwm: PwmSection::default(),
            gimbal: GimbalSection::default(),
            goal: TriggerSection::default(),
            win: None,
            alert: AlertSection::default(),
            detector: DetectorSection::default(),
        }
    }
}

impl Config {
    /// Load and validate a TOML file. A missing file means all defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("{} not found, using built-in defaults", path.display());
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        config.validate()?;

        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.axes()?;
        if self.detector.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidTiming("poll_interval_ms must be positive"));
        }
        if self.detector.stable_samples == 0 {
            return Err(ConfigError::InvalidTiming("stable_samples must be positive"));
        }
        if !(self.pwm.frequency_hz.is_finite() && self.pwm.frequency_hz > 0.0) {
            return Err(ConfigError::InvalidTiming("frequency_hz must be positive"));
        }
        if self.gimbal.x.channel == self.gimbal.y.channel {
            return Err(ConfigError::SharedChannel(self.gimbal.x.channel));
        }
        Ok(())
    }

    /// Validated X and Y endpoints.
    pub fn axes(&self) -> Result<(ServoEndpoint, ServoEndpoint), ConfigError> {
        Ok((
            ServoEndpoint::new("X", self.gimbal.x)?,
            ServoEndpoint::new("Y", self.gimbal.y)?,
        ))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.detector.poll_interval_ms)
    }

    pub fn polarity_probe(&self) -> Duration {
        Duration::from_millis(self.detector.polarity_probe_ms)
    }

    pub fn watcher_timing(&self) -> WatcherTiming {
        WatcherTiming {
            poll_interval: self.poll_interval(),
            stable_samples: self.detector.stable_samples,
        }
    }
}
