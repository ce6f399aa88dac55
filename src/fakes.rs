//! Test doubles for the bus, the chip-select pin and the timer.
//!
//! The bus and pin share one [`Log`] so tests can check how packet writes
//! interleave with chip-select edges.

extern crate std;

use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, ErrorKind, SpiBus};

use crate::device::Deinit;
use crate::packet::{Packet, PACKET_LEN};
use crate::timer::{PeriodicTimer, TimerConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Select,
    Deselect,
    Write(Vec<u8>),
    Flush,
}

#[derive(Debug, Clone, Default)]
pub struct Log(Rc<RefCell<Vec<Event>>>);

impl Log {
    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Write(bytes) => {
                    let bytes: [u8; PACKET_LEN] = bytes.as_slice().try_into().ok()?;
                    Some(Packet::from_bytes(bytes))
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

impl spi::Error for BusFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFault;

impl digital::Error for PinFault {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

#[derive(Debug)]
pub struct FakeBus {
    log: Log,
    writes: usize,
    fail_at: Option<usize>,
    pub deinited: bool,
}

impl FakeBus {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            writes: 0,
            fail_at: None,
            deinited: false,
        }
    }

    /// The write with this zero-based number fails.
    pub fn failing_at(mut self, write: usize) -> Self {
        self.fail_at = Some(write);
        self
    }
}

impl spi::ErrorType for FakeBus {
    type Error = BusFault;
}

impl SpiBus<u8> for FakeBus {
    fn read(&mut self, words: &mut [u8]) -> Result<(), BusFault> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), BusFault> {
        let write = self.writes;
        self.writes += 1;
        if self.fail_at == Some(write) {
            return Err(BusFault);
        }
        self.log.push(Event::Write(words.to_vec()));
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), BusFault> {
        read.fill(0);
        self.write(write)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), BusFault> {
        self.write(words)?;
        words.fill(0);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BusFault> {
        self.log.push(Event::Flush);
        Ok(())
    }
}

impl Deinit for FakeBus {
    fn is_deinited(&self) -> bool {
        self.deinited
    }
}

#[derive(Debug)]
pub struct FakePin {
    log: Log,
    lows: usize,
    highs: usize,
    fail_low_at: Option<usize>,
    fail_high_at: Option<usize>,
    pub deinited: bool,
}

impl FakePin {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            lows: 0,
            highs: 0,
            fail_low_at: None,
            fail_high_at: None,
            deinited: false,
        }
    }

    /// The `set_low` call with this zero-based number fails.
    pub fn failing_low_at(mut self, call: usize) -> Self {
        self.fail_low_at = Some(call);
        self
    }

    /// The `set_high` call with this zero-based number fails.
    pub fn failing_high_at(mut self, call: usize) -> Self {
        self.fail_high_at = Some(call);
        self
    }
}

impl digital::ErrorType for FakePin {
    type Error = PinFault;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), PinFault> {
        let call = self.lows;
        self.lows += 1;
        if self.fail_low_at == Some(call) {
            return Err(PinFault);
        }
        self.log.push(Event::Select);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), PinFault> {
        let call = self.highs;
        self.highs += 1;
        if self.fail_high_at == Some(call) {
            return Err(PinFault);
        }
        self.log.push(Event::Deselect);
        Ok(())
    }
}

impl Deinit for FakePin {
    fn is_deinited(&self) -> bool {
        self.deinited
    }
}

#[derive(Debug)]
pub struct FakeTimer {
    index: u8,
    pending: Cell<bool>,
    running: bool,
    listening: bool,
    resets: u32,
    config: Option<TimerConfig>,
}

impl FakeTimer {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            pending: Cell::new(false),
            running: false,
            listening: false,
            resets: 0,
            config: None,
        }
    }

    /// Sets the match flag, as the hardware would on expiry.
    pub fn raise(&self) {
        self.pending.set(true);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn config(&self) -> Option<TimerConfig> {
        self.config
    }
}

impl PeriodicTimer for FakeTimer {
    fn index(&self) -> u8 {
        self.index
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.running = false;
        self.listening = false;
        self.pending.set(false);
        self.config = None;
    }

    fn configure(&mut self, config: &TimerConfig) {
        self.config = Some(*config);
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn enable_interrupt(&mut self) {
        self.listening = true;
    }

    fn is_interrupt_pending(&self) -> bool {
        self.pending.get()
    }

    fn clear_interrupt(&mut self) {
        self.pending.set(false);
    }
}
