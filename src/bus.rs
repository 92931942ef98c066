use std::io;

use rppal::i2c::I2c;

use crate::error::HardwareError;

/// Byte-wide register access to a single device on a shared bus.
pub trait RegisterBus: Send {
    fn read_register(&mut self, register: u8) -> io::Result<u8>;
    fn write_register(&mut self, register: u8, value: u8) -> io::Result<()>;
}

/// SMBus register access to one I2C slave through `/dev/i2c-N`.
pub struct I2cBus {
    i2c: I2c,
}

impl I2cBus {
    pub fn open(bus: u8, address: u16) -> Result<Self, HardwareError> {
        let mut i2c = I2c::with_bus(bus)?;
        i2c.set_slave_address(address)?;
        log::info!("I2C bus {} open, slave address 0x{:02X}", bus, address);
        Ok(Self { i2c })
    }
}

impl RegisterBus for I2cBus {
    fn read_register(&mut self, register: u8) -> io::Result<u8> {
        self.i2c.smbus_read_byte(register).map_err(into_io)
    }

    fn write_register(&mut self, register: u8, value: u8) -> io::Result<()> {
        self.i2c.smbus_write_byte(register, value).map_err(into_io)
    }
}

fn into_io(err: rppal::i2c::Error) -> io::Error {
    match err {
        rppal::i2c::Error::Io(e) => e,
        other => io::Error::other(other),
    }
}
