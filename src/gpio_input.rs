use std::thread;
use std::time::Duration;

use log::info;
use rppal::gpio::{Gpio, InputPin, Level};
use serde::{Deserialize, Serialize};

use crate::error::HardwareError;

/// A digital input sampled by polling.
pub trait InputLine: Send {
    fn is_high(&mut self) -> bool;
}

/// Which physical sensor drives a trigger line. Only used for logging
/// and for picking defaults; all of them are plain digital lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorKind {
    /// Micro switch between the pin and GND.
    Button,
    /// Reed switch closed by a magnet in the ball.
    Reed,
    /// Break-beam IR receiver.
    IrBeam,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Button => write!(f, "button"),
            SensorKind::Reed => write!(f, "reed switch"),
            SensorKind::IrBeam => write!(f, "IR beam"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pull {
    Up,
    Down,
    None,
}

/// Level at which a line reports "activated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    pub fn is_active(self, high: bool) -> bool {
        match self {
            Polarity::ActiveLow => !high,
            Polarity::ActiveHigh => high,
        }
    }
}

/// Configured polarity; `Auto` is resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolaritySetting {
    ActiveLow,
    ActiveHigh,
    Auto,
}

/// A Raspberry Pi GPIO pin (BCM numbering) configured as input.
pub struct GpioLine {
    pin: InputPin,
}

impl GpioLine {
    pub fn open(gpio: &Gpio, bcm: u8, pull: Pull) -> Result<Self, HardwareError> {
        let pin = gpio.get(bcm)?;
        let pin = match pull {
            Pull::Up => pin.into_input_pullup(),
            Pull::Down => pin.into_input_pulldown(),
            Pull::None => pin.into_input(),
        };
        Ok(Self { pin })
    }
}

impl InputLine for GpioLine {
    fn is_high(&mut self) -> bool {
        self.pin.read() == Level::High
    }
}

/// A sensor line together with the level that means "activated".
pub struct TriggerLine {
    line: Box<dyn InputLine>,
    polarity: Polarity,
    kind: SensorKind,
}

impl TriggerLine {
    pub fn new(line: impl InputLine + 'static, polarity: Polarity, kind: SensorKind) -> Self {
        Self {
            line: Box::new(line),
            polarity,
            kind,
        }
    }

    /// Resolve `Auto` polarity by watching the line first, then wrap it.
    pub fn with_setting(
        mut line: impl InputLine + 'static,
        setting: PolaritySetting,
        kind: SensorKind,
        probe: Duration,
        interval: Duration,
    ) -> Self {
        let polarity = match setting {
            PolaritySetting::ActiveLow => Polarity::ActiveLow,
            PolaritySetting::ActiveHigh => Polarity::ActiveHigh,
            PolaritySetting::Auto => {
                let polarity = detect_polarity(&mut line, probe, interval);
                info!("{} polarity detected: {:?}", kind, polarity);
                polarity
            }
        };
        Self::new(line, polarity, kind)
    }

    pub fn is_active(&mut self) -> bool {
        let high = self.line.is_high();
        self.polarity.is_active(high)
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }
}

/// Guess the active level of a line assumed idle right now.
///
/// Samples for `probe` and takes the majority level as idle; a tie counts
/// as idle-low.
pub fn detect_polarity(line: &mut dyn InputLine, probe: Duration, interval: Duration) -> Polarity {
    let total = if interval.is_zero() {
        1
    } else {
        (probe.as_nanos() / interval.as_nanos()).max(1) as usize
    };

    let mut highs = 0;
    for i in 0..total {
        if line.is_high() {
            highs += 1;
        }
        if i + 1 < total {
            thread::sleep(interval);
        }
    }

    if highs > total / 2 {
        Polarity::ActiveLow
    } else {
        Polarity::ActiveHigh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::mock_gpio::ScriptedLine;

    const PROBE: Duration = Duration::from_millis(10);
    const TICK: Duration = Duration::from_millis(1);

    // region: UNIT_TESTS
    #[test]
    fn test_polarity_levels() {
        assert!(Polarity::ActiveLow.is_active(false));
        assert!(!Polarity::ActiveLow.is_active(true));
        assert!(Polarity::ActiveHigh.is_active(true));
        assert!(!Polarity::ActiveHigh.is_active(false));
    }
    // endregion: UNIT_TESTS

    // region MOCK: Mocking GPIO Functionality.

    #[test]
    fn test_detects_idle_high_line() {
        let mut line = ScriptedLine::new(true);
        // a couple of glitches do not flip the vote
        line.push_levels([true, false, true, false, true]);
        assert_eq!(detect_polarity(&mut line, PROBE, TICK), Polarity::ActiveLow);
        assert_eq!(line.reads(), 10);
    }

    #[test]
    fn test_sub_millisecond_interval_covers_whole_probe() {
        let mut line = ScriptedLine::new(true);
        let probe = Duration::from_millis(1);
        let interval = Duration::from_micros(100);
        assert_eq!(detect_polarity(&mut line, probe, interval), Polarity::ActiveLow);
        assert_eq!(line.reads(), 10);
    }

    #[test]
    fn test_detects_idle_low_line() {
        let mut line = ScriptedLine::new(false);
        assert_eq!(detect_polarity(&mut line, PROBE, TICK), Polarity::ActiveHigh);
    }

    #[test]
    fn test_tie_counts_as_idle_low() {
        let mut line = ScriptedLine::new(false);
        line.push_levels([true; 5]);
        line.push_levels([false; 5]);
        assert_eq!(detect_polarity(&mut line, PROBE, TICK), Polarity::ActiveHigh);
    }

    #[test]
    fn test_trigger_line_resolves_auto() {
        let line = ScriptedLine::new(true);
        let mut trigger = TriggerLine::with_setting(
            line.clone(),
            PolaritySetting::Auto,
            SensorKind::IrBeam,
            PROBE,
            TICK,
        );
        assert_eq!(trigger.polarity(), Polarity::ActiveLow);
        assert!(!trigger.is_active());

        line.set_level(false);
        assert!(trigger.is_active());
    }

    #[test]
    fn test_trigger_line_fixed_polarity_does_not_probe() {
        let line = ScriptedLine::new(false);
        let mut trigger = TriggerLine::with_setting(
            line.clone(),
            PolaritySetting::ActiveHigh,
            SensorKind::Reed,
            PROBE,
            TICK,
        );
        assert_eq!(line.reads(), 0);
        assert!(!trigger.is_active());
        assert_eq!(trigger.kind(), SensorKind::Reed);
    }
    // endregion: MOCK: Mocking GPIO Functionality.
}
