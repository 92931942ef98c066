use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use serde::Serialize;

use crate::error::Fault;
use crate::gimbal::Gimbal;

/// Whether a goal has been scored, and when.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GoalState {
    pub triggered: bool,
    pub triggered_at: Option<SystemTime>,
}

impl GoalState {
    /// Trigger time as fractional seconds since the Unix epoch.
    pub fn triggered_at_unix(&self) -> Option<f64> {
        self.triggered_at
            .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
            .map(|since| since.as_secs_f64())
    }
}

/// Outcome of the first trigger since the last reset.
#[derive(Debug)]
pub struct Triggered {
    pub at: SystemTime,
    pub centered: Result<(u16, u16), Fault>,
}

/// Process-wide goal flag. Set by the goal watcher, cleared by reset.
///
/// Trigger and reset both hold the lock across their flag update and the
/// centering write, so neither can observe the other half done. Tilt
/// requests go through [`while_clear`](Self::while_clear) and therefore
/// cannot move the gimbal after a trigger has centered it.
#[derive(Debug, Default)]
pub struct Goal {
    state: Mutex<GoalState>,
}

impl Goal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> GoalState {
        *crate::lock(&self.state)
    }

    pub fn is_triggered(&self) -> bool {
        self.status().triggered
    }

    /// Latch the goal and center the gimbal. Returns `None` when the goal
    /// was already latched. A centering failure never stops the latch.
    pub fn trigger(&self, gimbal: &Gimbal) -> Option<Triggered> {
        let mut state = crate::lock(&self.state);
        if state.triggered {
            return None;
        }

        let at = SystemTime::now();
        *state = GoalState {
            triggered: true,
            triggered_at: Some(at),
        };
        info!("GOAL");

        let centered = center_best_effort(gimbal, "goal");
        Some(Triggered { at, centered })
    }

    /// Clear the goal and re-center the gimbal.
    pub fn reset(&self, gimbal: &Gimbal) -> Result<(u16, u16), Fault> {
        let mut state = crate::lock(&self.state);
        *state = GoalState::default();
        info!("goal reset");
        center_best_effort(gimbal, "goal reset")
    }

    /// Run `f` only if no goal is latched, holding the goal lock meanwhile.
    pub fn while_clear<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let state = crate::lock(&self.state);
        if state.triggered {
            return None;
        }
        let result = f();
        drop(state);
        Some(result)
    }
}

/// Center the gimbal as a safety action: the error is logged and handed
/// back as a [`Fault`] for the caller to report, never propagated.
pub fn center_best_effort(gimbal: &Gimbal, context: &'static str) -> Result<(u16, u16), Fault> {
    gimbal.center().map_err(|error| {
        let fault = Fault { context, error };
        warn!("{}", fault);
        fault
    })
}
