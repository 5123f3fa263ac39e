//! Mock collaborators for host-side tests: scripted pulse counter, PWM
//! handles that record what was written to them, and a loopback serial
//! port implementing the `embedded_io` traits.

use core::cell::Cell;
use core::convert::Infallible;

use crate::hal::{PulseCounter, PwmControl, PwmDuty};

/// Scripted pulse-counter state. The test drives it through this struct
/// while the control loop owns a [`MockCounter`] handle onto it.
pub struct CounterScript {
    count: Cell<i32>,
    pending_overflow: Cell<i32>,
}

impl CounterScript {
    pub const fn new() -> Self {
        Self {
            count: Cell::new(0),
            pending_overflow: Cell::new(0),
        }
    }

    pub fn set_count(&self, count: i32) {
        self.count.set(count);
    }

    /// Simulates `pulses` more encoder edges since the last tick.
    pub fn advance(&self, pulses: i32) {
        self.count.set(self.count.get() + pulses);
    }

    pub fn count(&self) -> i32 {
        self.count.get()
    }

    /// Queues a watch-point crossing of the given signed magnitude.
    pub fn push_overflow(&self, magnitude: i32) {
        self.pending_overflow
            .set(self.pending_overflow.get() + magnitude);
    }

    pub fn handle(&self) -> MockCounter<'_> {
        MockCounter { script: self }
    }
}

impl Default for CounterScript {
    fn default() -> Self {
        Self::new()
    }
}

/// [`PulseCounter`] view of a [`CounterScript`].
pub struct MockCounter<'a> {
    script: &'a CounterScript,
}

impl PulseCounter for MockCounter<'_> {
    fn count(&mut self) -> i32 {
        self.script.count.get()
    }

    fn clear(&mut self) {
        self.script.count.set(0);
    }

    fn take_overflow(&mut self) -> i32 {
        self.script.pending_overflow.replace(0)
    }
}

/// Duty handle recording the last compare value.
pub struct MockPwm {
    pub compare: u32,
}

impl MockPwm {
    pub fn new() -> Self {
        Self { compare: 0 }
    }
}

impl Default for MockPwm {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmDuty for MockPwm {
    fn set_compare(&mut self, ticks: u32) {
        self.compare = ticks;
    }
}

/// Gate/polarity handle recording the configured output state.
pub struct MockPwmControl {
    pub phase_a_high: bool,
    pub phase_b_high: bool,
    pub running: bool,
    pub forced_low: bool,
}

impl MockPwmControl {
    pub fn new() -> Self {
        Self {
            phase_a_high: false,
            phase_b_high: false,
            running: false,
            forced_low: true,
        }
    }
}

impl Default for MockPwmControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmControl for MockPwmControl {
    fn set_phase_outputs(&mut self, phase_a_high: bool, phase_b_high: bool) {
        self.phase_a_high = phase_a_high;
        self.phase_b_high = phase_b_high;
        self.forced_low = false;
    }

    fn force_outputs_low(&mut self) {
        self.forced_low = true;
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

/// Serial port fed by the test on one side and drained on the other.
pub struct LoopbackSerial {
    rx: heapless::Deque<u8, 512>,
    tx: heapless::Vec<u8, 512>,
}

impl LoopbackSerial {
    pub fn new() -> Self {
        Self {
            rx: heapless::Deque::new(),
            tx: heapless::Vec::new(),
        }
    }

    /// Queues bytes for the device to read.
    pub fn feed(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.rx.push_back(*b).expect("rx buffer full");
        }
    }

    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    /// Drains everything the device wrote so far.
    pub fn take_tx(&mut self) -> heapless::Vec<u8, 512> {
        core::mem::take(&mut self.tx)
    }
}

impl Default for LoopbackSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl embedded_io::ErrorType for LoopbackSerial {
    type Error = Infallible;
}

impl embedded_io::Read for LoopbackSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.rx.pop_front() {
            Some(b) => {
                buf[0] = b;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

impl embedded_io::Write for LoopbackSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf).expect("tx buffer full");
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
