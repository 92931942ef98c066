use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::gpio_output::OutputLine;

/// Buzzer timing for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AlertPattern {
    /// One continuous tone.
    Beep { on_ms: u64 },
    /// `count` repetitions of on-for-`on_ms`, off-for-`off_ms`.
    Pulses { count: u32, on_ms: u64, off_ms: u64 },
}

impl AlertPattern {
    /// Buzzer levels and how long each is held.
    pub fn steps(&self) -> Vec<(bool, Duration)> {
        match *self {
            AlertPattern::Beep { on_ms } => vec![(true, Duration::from_millis(on_ms))],
            AlertPattern::Pulses {
                count,
                on_ms,
                off_ms,
            } => (0..count)
                .flat_map(|_| {
                    [
                        (true, Duration::from_millis(on_ms)),
                        (false, Duration::from_millis(off_ms)),
                    ]
                })
                .collect(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.steps().iter().map(|(_, hold)| *hold).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertState {
    pub active: bool,
}

struct Outputs {
    state: AlertState,
    buzzer: Box<dyn OutputLine>,
    led: Option<Box<dyn OutputLine>>,
}

/// Buzzer and celebration LED.
///
/// Level changes and the alert flag share one lock, so a silence request
/// either lands before an alert starts or sees it active and leaves the
/// buzzer alone. Sequences never run while the PWM bus is locked.
pub struct Alarm {
    outputs: Mutex<Outputs>,
    // serializes whole sequences; held across their delays
    sequence: Mutex<()>,
}

impl Alarm {
    pub fn new(buzzer: impl OutputLine + 'static) -> Self {
        Self {
            outputs: Mutex::new(Outputs {
                state: AlertState::default(),
                buzzer: Box::new(buzzer),
                led: None,
            }),
            sequence: Mutex::new(()),
        }
    }

    pub fn with_led(self, led: impl OutputLine + 'static) -> Self {
        crate::lock(&self.outputs).led = Some(Box::new(led));
        self
    }

    pub fn state(&self) -> AlertState {
        crate::lock(&self.outputs).state
    }

    pub fn is_active(&self) -> bool {
        self.state().active
    }

    /// Play a pattern on the buzzer, blocking until it is done.
    ///
    /// Concurrent calls queue up behind each other. The buzzer is released
    /// and the alert flag cleared even if the sequence unwinds.
    pub fn sound(&self, pattern: &AlertPattern) {
        let _sequence = crate::lock(&self.sequence);
        let _active = ActiveGuard::start(self);
        debug!("alert {:?} started", pattern);

        for (high, hold) in pattern.steps() {
            crate::lock(&self.outputs).buzzer.set(high);
            thread::sleep(hold);
        }
    }

    /// Light the LED and play a pattern. The LED stays lit until [`silence`](Self::silence).
    pub fn celebrate(&self, pattern: &AlertPattern) {
        if let Some(led) = crate::lock(&self.outputs).led.as_mut() {
            led.set(true);
        }
        info!("celebrating");
        self.sound(pattern);
    }

    /// Turn the LED off, and the buzzer too unless an alert is playing.
    /// Returns whether the buzzer was released.
    pub fn silence(&self) -> bool {
        let mut outputs = crate::lock(&self.outputs);
        if let Some(led) = outputs.led.as_mut() {
            led.set(false);
        }
        if outputs.state.active {
            debug!("silence requested during alert, buzzer left on");
            return false;
        }
        outputs.buzzer.set(false);
        true
    }
}

struct ActiveGuard<'a> {
    alarm: &'a Alarm,
}

impl<'a> ActiveGuard<'a> {
    fn start(alarm: &'a Alarm) -> Self {
        crate::lock(&alarm.outputs).state.active = true;
        Self { alarm }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut outputs = crate::lock(&self.alarm.outputs);
        outputs.buzzer.set(false);
        outputs.state.active = false;
    }
}
