// This file is only compiled during tests

use std::io;
use std::sync::{Arc, Mutex};

use crate::bus::RegisterBus;
use crate::pca9685::LED0_ON_L;

struct BusState {
    registers: [u8; 256],
    writes: Vec<(u8, u8)>,
    reads: Vec<u8>,
    fail_on: Option<u8>,
    failed_attempts: usize,
}

/// In-memory PCA9685 register file. Clones share the same registers.
#[derive(Clone)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                registers: [0; 256],
                writes: Vec::new(),
                reads: Vec::new(),
                fail_on: None,
                failed_attempts: 0,
            })),
        }
    }

    pub fn set_register(&self, register: u8, value: u8) {
        self.state.lock().unwrap().registers[register as usize] = value;
    }

    pub fn register(&self, register: u8) -> u8 {
        self.state.lock().unwrap().registers[register as usize]
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn reads(&self) -> Vec<u8> {
        self.state.lock().unwrap().reads.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock().unwrap();
        state.writes.clear();
        state.reads.clear();
    }

    // test helper to make every write to `register` fail
    pub fn fail_writes_to(&self, register: Option<u8>) {
        self.state.lock().unwrap().fail_on = register;
    }

    pub fn failed_attempts(&self) -> usize {
        self.state.lock().unwrap().failed_attempts
    }

    /// (on, off) ticks currently held by a channel.
    pub fn channel(&self, channel: u8) -> (u16, u16) {
        let state = self.state.lock().unwrap();
        let base = (LED0_ON_L + 4 * channel) as usize;
        let r = &state.registers;
        (
            u16::from_le_bytes([r[base], r[base + 1]]),
            u16::from_le_bytes([r[base + 2], r[base + 3]]),
        )
    }
}

impl RegisterBus for MockBus {
    fn read_register(&mut self, register: u8) -> io::Result<u8> {
        let mut state = self.state.lock().unwrap();
        state.reads.push(register);
        Ok(state.registers[register as usize])
    }

    fn write_register(&mut self, register: u8, value: u8) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on == Some(register) {
            state.failed_attempts += 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock NACK"));
        }
        state.registers[register as usize] = value;
        state.writes.push((register, value));
        Ok(())
    }
}
