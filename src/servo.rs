use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pca9685::{CHANNEL_COUNT, MAX_TICK};

/// Calibration of one servo axis, in PWM ticks (0-4095 per 20 ms at 50 Hz).
/// Typical usable range for an SG90 is roughly 150-600.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PwmChannelConfig {
    pub channel: u8,
    pub min: u16,
    pub max: u16,
    /// Tick at which the horn sits level; midpoint of min/max when absent.
    #[serde(default)]
    pub center: Option<u16>,
    /// Fraction of the travel on each side of center that tilt may use.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// A validated servo axis: maps a normalized tilt to a safe pulse width.
#[derive(Debug, Clone, PartialEq)]
pub struct ServoEndpoint {
    config: PwmChannelConfig,
}

impl ServoEndpoint {
    /// Validate a calibration. `axis` only labels errors.
    pub fn new(axis: impl Into<String>, config: PwmChannelConfig) -> Result<Self, ConfigError> {
        let axis = axis.into();

        if config.channel >= CHANNEL_COUNT {
            return Err(ConfigError::InvalidChannel {
                axis,
                channel: config.channel,
            });
        }

        let center_ok = config
            .center
            .is_none_or(|c| (config.min..=config.max).contains(&c));
        if config.min >= config.max || config.max > MAX_TICK || !center_ok {
            return Err(ConfigError::InvalidRange {
                axis,
                min: config.min,
                max: config.max,
                center: config.center,
            });
        }

        // Scales above 1 would push every deflection into the clamp.
        if !(config.scale > 0.0 && config.scale <= 1.0) {
            return Err(ConfigError::InvalidScale {
                axis,
                scale: config.scale,
            });
        }

        Ok(Self { config })
    }

    pub fn channel(&self) -> u8 {
        self.config.channel
    }

    pub fn config(&self) -> &PwmChannelConfig {
        &self.config
    }

    pub fn center_tick(&self) -> u16 {
        self.config
            .center
            .unwrap_or((self.config.min + self.config.max) / 2)
    }

    /// Clamp a raw tick into the calibrated travel.
    pub fn clamp_tick(&self, tick: u16) -> u16 {
        tick.clamp(self.config.min, self.config.max)
    }

    /// Map a normalized tilt in [-1, 1] to a tick.
    ///
    /// Each side of center is scaled against its own travel, so an off-center
    /// horn still uses its full range. Out-of-range input is clamped, NaN
    /// means center, and the result never leaves [min, max].
    pub fn map(&self, v: f64) -> u16 {
        let v = if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };

        let c = f64::from(self.center_tick());
        let min = f64::from(self.config.min);
        let max = f64::from(self.config.max);

        let tick = if v >= 0.0 {
            c + v * (max - c) * self.config.scale
        } else {
            c + v * (c - min) * self.config.scale
        };

        // f64::round rounds half away from zero; the cast saturates
        self.clamp_tick(tick.round() as u16)
    }
}
