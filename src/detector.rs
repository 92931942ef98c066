use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};

use crate::alert::{AlertPattern, Alarm};
use crate::gimbal::Gimbal;
use crate::goal::Goal;
use crate::gpio_input::TriggerLine;

/// Default sampling period of the trigger line.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Consecutive idle samples required before edges are trusted (1 s at 20 ms).
pub const STABLE_SAMPLES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Counting consecutive idle samples since the last active one.
    AwaitingStableIdle { run: u32 },
    /// Watching for idle -> active steps.
    Idle { last_active: bool },
}

/// Debounced edge detector over a stream of activation samples.
///
/// At startup the line may be bouncing or held, so nothing fires until it
/// has been idle for `stable_samples` in a row. After that, any single
/// idle -> active step counts; level holds never do.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    state: DetectorState,
    stable_samples: u32,
}

impl EdgeDetector {
    pub fn new(stable_samples: u32) -> Self {
        Self {
            state: DetectorState::AwaitingStableIdle { run: 0 },
            stable_samples: stable_samples.max(1),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, DetectorState::Idle { .. })
    }

    /// Feed one sample. Returns true on an idle -> active step.
    pub fn observe(&mut self, active: bool) -> bool {
        match self.state {
            DetectorState::AwaitingStableIdle { run } => {
                let run = if active { 0 } else { run + 1 };
                self.state = if run >= self.stable_samples {
                    debug!("trigger line stable after {} idle samples", run);
                    DetectorState::Idle { last_active: false }
                } else {
                    DetectorState::AwaitingStableIdle { run }
                };
                false
            }
            DetectorState::Idle { last_active } => {
                self.state = DetectorState::Idle {
                    last_active: active,
                };
                !last_active && active
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherTiming {
    pub poll_interval: Duration,
    pub stable_samples: u32,
}

impl Default for WatcherTiming {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            stable_samples: STABLE_SAMPLES,
        }
    }
}

/// Polls a trigger line and turns its first edge into a goal.
///
/// On a goal the gimbal is centered (best effort) and the alert pattern
/// plays. While the goal stays latched, edges are tracked but ignored; a
/// reset from elsewhere lets the next edge trigger again.
pub struct GoalWatcher {
    trigger: TriggerLine,
    detector: EdgeDetector,
    poll_interval: Duration,
    alert: AlertPattern,
    goal: Arc<Goal>,
    gimbal: Arc<Gimbal>,
    alarm: Arc<Alarm>,
}

impl GoalWatcher {
    pub fn new(
        trigger: TriggerLine,
        timing: WatcherTiming,
        alert: AlertPattern,
        goal: Arc<Goal>,
        gimbal: Arc<Gimbal>,
        alarm: Arc<Alarm>,
    ) -> Self {
        Self {
            trigger,
            detector: EdgeDetector::new(timing.stable_samples),
            poll_interval: timing.poll_interval,
            alert,
            goal,
            gimbal,
            alarm,
        }
    }

    /// Take one sample. Returns true if it latched the goal.
    pub fn poll_once(&mut self) -> bool {
        let active = self.trigger.is_active();
        if !self.detector.observe(active) {
            return false;
        }
        if self.goal.is_triggered() {
            debug!("{} edge ignored, goal already latched", self.trigger.kind());
            return false;
        }
        self.on_edge()
    }

    fn on_edge(&self) -> bool {
        let Some(triggered) = self.goal.trigger(&self.gimbal) else {
            return false;
        };
        if let Ok((x, y)) = triggered.centered {
            info!("gimbal locked at center X={} Y={}", x, y);
        }

        info!("{} edge detected -> alert", self.trigger.kind());
        self.alarm.sound(&self.alert);
        info!("alert done");
        true
    }

    /// Poll until `stop` is raised.
    pub fn run(mut self, stop: &AtomicBool) {
        info!(
            "watching {} ({:?}) every {:?}",
            self.trigger.kind(),
            self.trigger.polarity(),
            self.poll_interval
        );
        while !stop.load(Ordering::Acquire) {
            self.poll_once();
            thread::sleep(self.poll_interval);
        }
        info!("{} watcher stopped", self.trigger.kind());
    }

    /// Run on a named background thread.
    pub fn spawn(self) -> io::Result<WatcherHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("goal-watcher".into())
            .spawn(move || self.run(&flag))?;
        Ok(WatcherHandle { stop, thread })
    }
}

pub struct WatcherHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Stop polling and wait for the thread. An alert in flight completes first.
    pub fn stop(self) -> thread::Result<()> {
        self.stop.store(true, Ordering::Release);
        self.thread.join()
    }
}
