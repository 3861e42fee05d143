//! In-memory receiver and bus lines for tests

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};
use embedded_hal::digital::v2::OutputPin;

use super::bus::{BusLines, TransactionTimeout};
use super::receiver::reg;
use crate::core::{BusPins, RECEIVER_I2C_ADDR};

pub(crate) type Shared = Rc<RefCell<MockState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockError {
    Unpowered,
    Nack,
    Timeout,
}

/// Simulated receiver, enable line and bus lines sharing one state
#[derive(Debug)]
pub(crate) struct MockState {
    pub registers: [u8; 16],
    pub enabled: bool,
    pub enable_history: Vec<bool>,
    /// SDA held low until this many SCL rising edges, `None` for a free bus
    pub sda_stuck_for: Option<u32>,
    pub scl_rising_edges: u32,
    pub stop_conditions: u32,
    pub reinit_pins: Vec<BusPins>,
    /// Every (register, value) pair written
    pub writes: Vec<(u8, u8)>,
    pub nack: bool,
    /// How long each transaction takes before the controller deadline
    pub transaction_delay: Option<Duration>,
    /// Deadline last set on the controller
    pub transaction_timeout: Option<Duration>,
    /// Controller aborts at its deadline; cleared to model one that cannot
    pub honors_timeout: bool,
    pub delay_ms_total: u64,
    scl_high: bool,
    sda_driven_low: bool,
}

impl MockState {
    pub fn new() -> Self {
        let mut registers = [0u8; 16];
        registers[reg::DEVICE_ID as usize] = reg::EXPECTED_DEVICE_ID;
        MockState {
            registers,
            enabled: false,
            enable_history: Vec::new(),
            sda_stuck_for: None,
            scl_rising_edges: 0,
            stop_conditions: 0,
            reinit_pins: Vec::new(),
            writes: Vec::new(),
            nack: false,
            transaction_delay: None,
            transaction_timeout: None,
            honors_timeout: true,
            delay_ms_total: 0,
            scl_high: true,
            sda_driven_low: false,
        }
    }

    pub fn shared() -> Shared {
        Rc::new(RefCell::new(MockState::new()))
    }

    /// Loads a decoded frame (BCD fields) and flags reception
    pub fn load_frame(&mut self, fields: [u8; 6], status: u8) {
        let start = reg::YEAR as usize;
        self.registers[start..start + 6].copy_from_slice(&fields);
        self.registers[reg::STATUS0 as usize] = status;
        self.registers[reg::IRQ_STATUS as usize] |= reg::IRQ_RX_COMPLETE;
    }

    fn check(&self, address: u8) -> Result<(), MockError> {
        if let Some(delay) = self.transaction_delay {
            match self.transaction_timeout {
                Some(limit) if self.honors_timeout && delay > limit => {
                    std::thread::sleep(limit);
                    return Err(MockError::Timeout);
                }
                _ => std::thread::sleep(delay),
            }
        }
        if !self.enabled {
            return Err(MockError::Unpowered);
        }
        if self.nack || address != RECEIVER_I2C_ADDR {
            return Err(MockError::Nack);
        }
        Ok(())
    }
}

pub(crate) struct MockI2c(pub Shared);

impl Write for MockI2c {
    type Error = MockError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.check(address)?;
        if let Some((&start, values)) = bytes.split_first() {
            for (i, &value) in values.iter().enumerate() {
                let register = start + i as u8;
                state.registers[register as usize % 16] = value;
                state.writes.push((register, value));
            }
        }
        Ok(())
    }
}

impl WriteRead for MockI2c {
    type Error = MockError;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.check(address)?;
        let start = bytes.first().copied().unwrap_or(0);
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = state.registers[(start as usize + i) % 16];
        }
        // Interrupt flags clear on read
        if start == reg::IRQ_STATUS {
            state.registers[reg::IRQ_STATUS as usize] = 0;
        }
        Ok(())
    }
}

impl TransactionTimeout for MockI2c {
    type Error = MockError;

    fn set_transaction_timeout(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        self.0.borrow_mut().transaction_timeout = Some(timeout);
        Ok(())
    }

    fn is_timeout(error: &Self::Error) -> bool {
        *error == MockError::Timeout
    }
}

pub(crate) struct MockEnable(pub Shared);

impl OutputPin for MockEnable {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.enabled = false;
        state.enable_history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.enabled = true;
        state.enable_history.push(true);
        Ok(())
    }
}

pub(crate) struct MockLines(pub Shared);

impl BusLines for MockLines {
    type Error = Infallible;

    fn sda_is_high(&mut self) -> Result<bool, Self::Error> {
        let state = self.0.borrow();
        if state.sda_driven_low {
            return Ok(false);
        }
        Ok(match state.sda_stuck_for {
            None => true,
            Some(edges) => state.scl_rising_edges >= edges,
        })
    }

    fn set_scl(&mut self, high: bool) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if high && !state.scl_high {
            state.scl_rising_edges += 1;
        }
        state.scl_high = high;
        Ok(())
    }

    fn set_sda(&mut self, high: bool) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if high && state.sda_driven_low && state.scl_high {
            state.stop_conditions += 1;
        }
        state.sda_driven_low = !high;
        Ok(())
    }

    fn reinit(&mut self, pins: BusPins) -> Result<(), Self::Error> {
        self.0.borrow_mut().reinit_pins.push(pins);
        Ok(())
    }
}

pub(crate) struct MockDelay(pub Shared);

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().delay_ms_total += ms as u64;
    }
}

impl DelayUs<u32> for MockDelay {
    fn delay_us(&mut self, _us: u32) {}
}
