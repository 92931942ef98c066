use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod alert;
pub mod bus;
pub mod config;
pub mod controls;
pub mod detector;
pub mod error;
pub mod gimbal;
pub mod goal;
pub mod gpio_input;
pub mod gpio_output;
pub mod pca9685;
pub mod servo;

// Re-export commonly used types
pub use alert::{AlertPattern, Alarm};
pub use config::Config;
pub use controls::{Controls, TiltOutcome};
pub use detector::{GoalWatcher, WatcherHandle};
pub use error::{ConfigError, DriverError, Fault};
pub use gimbal::Gimbal;
pub use goal::{Goal, GoalState};
pub use pca9685::{Pca9685, SharedDriver};
pub use servo::{PwmChannelConfig, ServoEndpoint};

#[cfg(test)]
pub(crate) mod mocks;

/// Lock a mutex, carrying on if another thread panicked while holding it.
/// Guarded state is only ever written whole, so a poisoned lock is still consistent.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
