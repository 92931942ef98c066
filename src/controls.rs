use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use serde::Serialize;

use crate::alert::{AlertPattern, AlertState, Alarm};
use crate::error::DriverError;
use crate::gimbal::Gimbal;
use crate::goal::{Goal, GoalState};
use crate::gpio_input::TriggerLine;
use crate::pca9685;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum TiltOutcome {
    /// A goal is latched; the gimbal stays centered until reset.
    Locked,
    Moved {
        x_tick: u16,
        y_tick: u16,
        /// Win sensor reads active right now.
        sensor_active: bool,
        /// A win has been seen since the last center request.
        won: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Status {
    pub goal: GoalState,
    pub alert: AlertState,
    pub won: bool,
    pub last_ticks: Option<(u16, u16)>,
}

/// The operations offered to a request layer (HTTP handlers, the console).
///
/// Every method is safe to call from any thread while a goal watcher runs.
pub struct Controls {
    gimbal: Arc<Gimbal>,
    goal: Arc<Goal>,
    alarm: Arc<Alarm>,
    win_sensor: Option<Mutex<TriggerLine>>,
    celebration: AlertPattern,
    won: AtomicBool,
}

impl Controls {
    pub fn new(gimbal: Arc<Gimbal>, goal: Arc<Goal>, alarm: Arc<Alarm>, celebration: AlertPattern) -> Self {
        Self {
            gimbal,
            goal,
            alarm,
            win_sensor: None,
            celebration,
            won: AtomicBool::new(false),
        }
    }

    /// Sensor checked after every tilt; its first activation celebrates.
    pub fn with_win_sensor(mut self, sensor: TriggerLine) -> Self {
        self.win_sensor = Some(Mutex::new(sensor));
        self
    }

    pub fn gimbal(&self) -> &Arc<Gimbal> {
        &self.gimbal
    }

    pub fn configure_pwm(&self, frequency_hz: f64) -> Result<(), DriverError> {
        pca9685::configure_pwm(self.gimbal.driver(), frequency_hz)
    }

    /// Move the gimbal unless a goal is latched.
    pub fn tilt(&self, x: f64, y: f64) -> Result<TiltOutcome, DriverError> {
        let Some(ticks) = self.goal.while_clear(|| self.gimbal.set_position(x, y)) else {
            return Ok(TiltOutcome::Locked);
        };
        let (x_tick, y_tick) = ticks?;

        let sensor_active = self
            .win_sensor
            .as_ref()
            .is_some_and(|sensor| crate::lock(sensor).is_active());
        if sensor_active && !self.won.swap(true, Ordering::AcqRel) {
            info!("win sensor tripped");
            self.alarm.celebrate(&self.celebration);
        }

        Ok(TiltOutcome::Moved {
            x_tick,
            y_tick,
            sensor_active,
            won: self.won.load(Ordering::Acquire),
        })
    }

    /// Clear the win, silence the outputs (an alert in flight keeps
    /// sounding) and re-center.
    pub fn center(&self) -> Result<(u16, u16), DriverError> {
        self.won.store(false, Ordering::Release);
        self.alarm.silence();
        self.gimbal.center()
    }

    pub fn goal_status(&self) -> GoalState {
        self.goal.status()
    }

    /// Clear the goal and re-center; a centering failure is only logged.
    pub fn reset_goal(&self) {
        if let Err(fault) = self.goal.reset(&self.gimbal) {
            warn!("goal cleared but gimbal not centered ({})", fault.error);
        }
    }

    pub fn status(&self) -> Status {
        Status {
            goal: self.goal.status(),
            alert: self.alarm.state(),
            won: self.won.load(Ordering::Acquire),
            last_ticks: self.gimbal.last_position(),
        }
    }
}
