use std::sync::Mutex;

use log::debug;

use crate::error::{ConfigError, DriverError};
use crate::pca9685::{self, SharedDriver};
use crate::servo::ServoEndpoint;

/// Two servo axes on one shared PWM driver.
///
/// Both channel writes of a call happen under a single driver lock, so two
/// callers can never leave X from one call and Y from the other.
pub struct Gimbal {
    driver: SharedDriver,
    x: ServoEndpoint,
    y: ServoEndpoint,
    last: Mutex<Option<(u16, u16)>>,
}

impl Gimbal {
    pub fn new(driver: SharedDriver, x: ServoEndpoint, y: ServoEndpoint) -> Result<Self, ConfigError> {
        if x.channel() == y.channel() {
            return Err(ConfigError::SharedChannel(x.channel()));
        }
        Ok(Self {
            driver,
            x,
            y,
            last: Mutex::new(None),
        })
    }

    /// Tilt both axes. Inputs outside [-1, 1] are clamped.
    pub fn set_position(&self, x: f64, y: f64) -> Result<(u16, u16), DriverError> {
        self.write(self.x.map(x), self.y.map(y))
    }

    /// Drive both axes to their calibrated center.
    pub fn center(&self) -> Result<(u16, u16), DriverError> {
        self.write(self.x.center_tick(), self.y.center_tick())
    }

    /// Ticks of the last call that wrote both channels.
    pub fn last_position(&self) -> Option<(u16, u16)> {
        *crate::lock(&self.last)
    }

    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }

    // If Y fails, X has already moved; the servo is not rolled back.
    fn write(&self, tick_x: u16, tick_y: u16) -> Result<(u16, u16), DriverError> {
        let mut driver = pca9685::lock(&self.driver);
        driver.set_channel_off(self.x.channel(), tick_x)?;
        driver.set_channel_off(self.y.channel(), tick_y)?;
        *crate::lock(&self.last) = Some((tick_x, tick_y));
        drop(driver);

        debug!("gimbal -> X={} Y={}", tick_x, tick_y);
        Ok((tick_x, tick_y))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::mocks::mock_bus::MockBus;
    use crate::pca9685::{LED0_ON_L, Pca9685};
    use crate::servo::PwmChannelConfig;

    fn endpoints() -> Result<(ServoEndpoint, ServoEndpoint), ConfigError> {
        let x = ServoEndpoint::new(
            "X",
            PwmChannelConfig {
                channel: 0,
                min: 180,
                max: 480,
                center: Some(380),
                scale: 0.55,
            },
        )?;
        let y = ServoEndpoint::new(
            "Y",
            PwmChannelConfig {
                channel: 2,
                min: 190,
                max: 560,
                center: Some(430),
                scale: 0.75,
            },
        )?;
        Ok((x, y))
    }

    fn gimbal(bus: &MockBus) -> Result<Gimbal, ConfigError> {
        let (x, y) = endpoints()?;
        Gimbal::new(Pca9685::new(bus.clone()).into_shared(), x, y)
    }

    // region MOCK: Mocking the PWM bus.
    #[test]
    fn test_set_position_writes_both_channels() -> Result<(), Box<dyn Error>> {
        let bus = MockBus::new();
        let gimbal = gimbal(&bus)?;

        // Y: 430 + 130 * 0.75 = 527.5 -> 528
        assert_eq!(gimbal.set_position(1.0, 1.0)?, (435, 528));
        assert_eq!(bus.channel(0), (0, 435));
        assert_eq!(bus.channel(2), (0, 528));
        assert_eq!(gimbal.last_position(), Some((435, 528)));

        Ok(())
    }

    #[test]
    fn test_center_is_idempotent() -> Result<(), Box<dyn Error>> {
        let bus = MockBus::new();
        let gimbal = gimbal(&bus)?;

        gimbal.set_position(-0.3, 0.8)?;
        let first = gimbal.center()?;
        let second = gimbal.center()?;
        assert_eq!(first, (380, 430));
        assert_eq!(first, second);
        assert_eq!(bus.channel(0), (0, 380));
        assert_eq!(bus.channel(2), (0, 430));

        Ok(())
    }

    #[test]
    fn test_same_channel_rejected() -> Result<(), Box<dyn Error>> {
        let bus = MockBus::new();
        let (x, y) = endpoints()?;
        let y = ServoEndpoint::new(
            "Y",
            PwmChannelConfig {
                channel: x.channel(),
                ..*y.config()
            },
        )?;
        let result = Gimbal::new(Pca9685::new(bus).into_shared(), x, y);
        assert!(matches!(result, Err(ConfigError::SharedChannel(0))));

        Ok(())
    }

    #[test]
    fn test_failure_on_second_axis_is_returned() -> Result<(), Box<dyn Error>> {
        let bus = MockBus::new();
        let gimbal = gimbal(&bus)?;
        gimbal.center()?;

        // off-low register of channel 2
        bus.fail_writes_to(Some(LED0_ON_L + 8 + 2));
        let result = gimbal.set_position(1.0, 1.0);
        assert!(matches!(result, Err(DriverError::BusWriteFailed { register: 0x10, .. })));

        // X moved and stays moved, the recorded position is the last full write
        assert_eq!(bus.channel(0), (0, 435));
        assert_eq!(gimbal.last_position(), Some((380, 430)));

        Ok(())
    }

    #[test]
    fn test_concurrent_calls_never_mix_axes() -> Result<(), Box<dyn Error>> {
        let bus = MockBus::new();
        let gimbal = Arc::new(gimbal(&bus)?);

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let gimbal = Arc::clone(&gimbal);
                thread::spawn(move || -> Result<(), DriverError> {
                    for _ in 0..200 {
                        if i % 2 == 0 {
                            gimbal.center()?;
                        } else {
                            gimbal.set_position(1.0, 1.0)?;
                        }
                    }
                    Ok(())
                })
            })
            .collect();
        for worker in workers {
            worker.join().map_err(|_| "worker panicked")??;
        }

        // Every write pair on the bus belongs to one call
        let offs: Vec<u16> = bus
            .writes()
            .chunks(8)
            .map(|call| {
                assert_eq!(call[0].0, LED0_ON_L);
                assert_eq!(call[4].0, LED0_ON_L + 8);
                let x = u16::from_le_bytes([call[2].1, call[3].1]);
                let y = u16::from_le_bytes([call[6].1, call[7].1]);
                assert!(matches!((x, y), (380, 430) | (435, 528)), "mixed {x}/{y}");
                x
            })
            .collect();
        assert_eq!(offs.len(), 800);

        Ok(())
    }
    // endregion: MOCK: Mocking the PWM bus.
}
