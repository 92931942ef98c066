use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::bus::RegisterBus;
use crate::error::DriverError;

// PCA9685 register addresses
pub const MODE1: u8 = 0x00;
pub const PRESCALE: u8 = 0xFE;
pub const LED0_ON_L: u8 = 0x06;

const MODE1_RESTART: u8 = 0x80;
const MODE1_SLEEP: u8 = 0x10;

/// Internal oscillator frequency (Hz)
pub const OSCILLATOR_HZ: f64 = 25_000_000.0;
/// Counter resolution: 12 bits per PWM period
pub const TICKS_PER_PERIOD: u16 = 4096;
pub const MAX_TICK: u16 = TICKS_PER_PERIOD - 1;
pub const CHANNEL_COUNT: u8 = 16;

/// The chip ignores prescale values below 3.
const PRESCALE_MIN: u8 = 3;
const OSCILLATOR_SETTLE: Duration = Duration::from_millis(5);

/// A driver shared between the gimbal, the goal watcher and calibration tooling.
/// Hold the lock for exactly one logical multi-register operation.
pub type SharedDriver = Arc<Mutex<Pca9685>>;

/// Prescale divisor for a target output frequency, clamped to what the chip accepts.
pub fn prescale_for(frequency_hz: f64) -> Result<u8, DriverError> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(DriverError::InvalidFrequency(frequency_hz));
    }
    let raw = (OSCILLATOR_HZ / (f64::from(TICKS_PER_PERIOD) * frequency_hz)).round() - 1.0;
    Ok(raw.clamp(f64::from(PRESCALE_MIN), f64::from(u8::MAX)) as u8)
}

/// Register-level driver for a 16-channel PCA9685 PWM controller.
///
/// The driver keeps no state besides the bus handle, and it is not safe to
/// interleave calls from several threads: wrap it in a [`SharedDriver`].
pub struct Pca9685 {
    bus: Box<dyn RegisterBus>,
}

impl Pca9685 {
    pub fn new(bus: impl RegisterBus + 'static) -> Self {
        Self { bus: Box::new(bus) }
    }

    pub fn into_shared(self) -> SharedDriver {
        Arc::new(Mutex::new(self))
    }

    /// Set the PWM output frequency. Returns the prescale value written.
    ///
    /// The prescale register only latches while the oscillator sleeps, so the
    /// sequence is: sleep, write prescale, restore mode, settle, restart, settle.
    pub fn configure(&mut self, frequency_hz: f64) -> Result<u8, DriverError> {
        let prescale = prescale_for(frequency_hz)?;

        let old_mode = self.read(MODE1)?;
        let sleep_mode = (old_mode & !MODE1_RESTART) | MODE1_SLEEP;
        self.write(MODE1, sleep_mode)?;
        self.write(PRESCALE, prescale)?;
        self.write(MODE1, old_mode)?;
        thread::sleep(OSCILLATOR_SETTLE);
        self.write(MODE1, old_mode | MODE1_RESTART)?;
        thread::sleep(OSCILLATOR_SETTLE);

        debug!(
            "PWM frequency set to {} Hz (prescale {})",
            frequency_hz, prescale
        );
        Ok(prescale)
    }

    /// Write the on/off ticks (12-bit) of one channel.
    pub fn set_channel(&mut self, channel: u8, on_tick: u16, off_tick: u16) -> Result<(), DriverError> {
        if channel >= CHANNEL_COUNT {
            return Err(DriverError::InvalidChannel(channel));
        }
        let on = on_tick & MAX_TICK;
        let off = off_tick & MAX_TICK;
        let base = LED0_ON_L + 4 * channel;

        let [on_low, on_high] = on.to_le_bytes();
        let [off_low, off_high] = off.to_le_bytes();
        self.write(base, on_low)?;
        self.write(base + 1, on_high)?;
        self.write(base + 2, off_low)?;
        self.write(base + 3, off_high)?;
        Ok(())
    }

    /// Pulse from the start of the period until `off_tick`.
    pub fn set_channel_off(&mut self, channel: u8, off_tick: u16) -> Result<(), DriverError> {
        self.set_channel(channel, 0, off_tick)
    }

    fn read(&mut self, register: u8) -> Result<u8, DriverError> {
        self.bus
            .read_register(register)
            .map_err(|cause| DriverError::BusReadFailed { register, cause })
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), DriverError> {
        self.bus
            .write_register(register, value)
            .map_err(|cause| DriverError::BusWriteFailed { register, cause })
    }
}

/// Lock a shared driver for one operation.
pub fn lock(driver: &SharedDriver) -> MutexGuard<'_, Pca9685> {
    crate::lock(driver)
}

/// Configure the output frequency of a shared driver.
pub fn configure_pwm(driver: &SharedDriver, frequency_hz: f64) -> Result<(), DriverError> {
    lock(driver).configure(frequency_hz).map(|_| ())
}
