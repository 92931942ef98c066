// This file is only compiled during tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::gpio_input::InputLine;
use crate::gpio_output::OutputLine;

struct Script {
    queued: VecDeque<bool>,
    level: bool,
    reads: usize,
}

/// Input line fed from a queue of levels; holds the last level once drained.
#[derive(Clone)]
pub struct ScriptedLine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedLine {
    pub fn new(high: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                queued: VecDeque::new(),
                level: high,
                reads: 0,
            })),
        }
    }

    pub fn push_levels(&self, levels: impl IntoIterator<Item = bool>) {
        self.script.lock().unwrap().queued.extend(levels);
    }

    // test helper to hold a level from now on
    pub fn set_level(&self, high: bool) {
        let mut script = self.script.lock().unwrap();
        script.queued.clear();
        script.level = high;
    }

    pub fn reads(&self) -> usize {
        self.script.lock().unwrap().reads
    }
}

impl InputLine for ScriptedLine {
    fn is_high(&mut self) -> bool {
        let mut script = self.script.lock().unwrap();
        script.reads += 1;
        if let Some(level) = script.queued.pop_front() {
            script.level = level;
        }
        script.level
    }
}

/// Output line that records every level written to it.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<bool> {
        self.levels.lock().unwrap().clone()
    }

    /// Current level (low if never driven).
    pub fn level(&self) -> bool {
        self.levels.lock().unwrap().last().copied().unwrap_or(false)
    }
}

impl OutputLine for RecordingOutput {
    fn set(&mut self, high: bool) {
        self.levels.lock().unwrap().push(high);
    }
}

/// Output line that panics on one chosen write, counting every write.
#[derive(Clone)]
pub struct PanickingOutput {
    panic_on: usize,
    sets: Arc<Mutex<usize>>,
}

impl PanickingOutput {
    /// Panic on the `panic_on`-th write (1-based); all other writes succeed.
    pub fn new(panic_on: usize) -> Self {
        Self {
            panic_on,
            sets: Arc::new(Mutex::new(0)),
        }
    }

    pub fn sets(&self) -> usize {
        *self.sets.lock().unwrap()
    }
}

impl OutputLine for PanickingOutput {
    fn set(&mut self, _high: bool) {
        let count = {
            let mut sets = self.sets.lock().unwrap();
            *sets += 1;
            *sets
        };
        if count == self.panic_on {
            panic!("output line failed on write {}", count);
        }
    }
}
