//! WWVB receiver driver
//!
//! The receiver decodes the 60 kHz time code itself and exposes the result
//! through a small register file. The driver owns the bus handle, the enable
//! line and the recovery pins for the lifetime of a session, and keeps the
//! receiver powered off whenever no operation is in progress.

use std::fmt::Debug;
use std::time::Instant;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};
use embedded_hal::digital::v2::OutputPin;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::bus::{recover_bus, BusLines, BusRecovery, TransactionTimeout};
use super::calendar::ClockInstant;
use crate::core::{Error, ReceiverConfig, ReceptionMode, Result};
use crate::util::bcd_to_dec;

/// Register map and bit definitions
pub mod reg {
    pub const CONTROL0: u8 = 0x00;
    pub const CONTROL1: u8 = 0x01;
    pub const IRQ_STATUS: u8 = 0x02;
    pub const STATUS0: u8 = 0x03;
    pub const YEAR: u8 = 0x04;
    pub const MONTH: u8 = 0x05;
    pub const DAY: u8 = 0x06;
    pub const HOUR: u8 = 0x07;
    pub const MINUTE: u8 = 0x08;
    pub const SECOND: u8 = 0x09;
    pub const NEXT_DST_MONTH: u8 = 0x0A;
    pub const NEXT_DST_DAY: u8 = 0x0B;
    pub const NEXT_DST_HOUR: u8 = 0x0C;
    pub const DEVICE_ID: u8 = 0x0D;

    pub const EXPECTED_DEVICE_ID: u8 = 0x10;

    pub const IRQ_RX_COMPLETE: u8 = 0x01;
    pub const IRQ_CYCLE_COMPLETE: u8 = 0x04;

    pub const STATUS_RX_OK: u8 = 0x01;
    pub const STATUS_ANTENNA2: u8 = 0x02;
    pub const STATUS_LSW_MASK: u8 = 0x18;
    pub const STATUS_DST_MASK: u8 = 0x60;
    pub const STATUS_TRACKING: u8 = 0x80;

    pub const MONTH_MASK: u8 = 0x1F;
    pub const DAY_MASK: u8 = 0x3F;
    pub const HOUR_MASK: u8 = 0x3F;
    pub const MINUTE_MASK: u8 = 0x7F;
    pub const SECOND_MASK: u8 = 0x7F;
}

/// Settle time with the enable line low before powering up
const POWER_CYCLE_SETTLE_MS: u32 = 10;

/// Extra margin after the wakeup delay before identification
const IDENTIFY_MARGIN_MS: u32 = 10;

/// Daylight saving state broadcast with the time code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DstStatus {
    NotInEffect,
    EndsToday,
    BeginsToday,
    InEffect,
}

impl DstStatus {
    /// Decodes the two DST bits of the status register
    pub fn from_status(status: u8) -> Self {
        match (status & reg::STATUS_DST_MASK) >> 5 {
            0 => DstStatus::NotInEffect,
            1 => DstStatus::EndsToday,
            2 => DstStatus::BeginsToday,
            _ => DstStatus::InEffect,
        }
    }

    /// Whether local time should carry the DST hour
    ///
    /// DST is still in force on the morning it ends.
    pub fn is_active(&self) -> bool {
        matches!(self, DstStatus::InEffect | DstStatus::EndsToday)
    }
}

impl Default for DstStatus {
    fn default() -> Self {
        DstStatus::NotInEffect
    }
}

/// Pending leap second announced at the end of the month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeapSecondWarning {
    None,
    Negative,
    Positive,
}

impl LeapSecondWarning {
    /// Decodes the leap second bits of the status register
    pub fn from_status(status: u8) -> Self {
        match (status & reg::STATUS_LSW_MASK) >> 3 {
            0b10 => LeapSecondWarning::Negative,
            0b11 => LeapSecondWarning::Positive,
            _ => LeapSecondWarning::None,
        }
    }
}

/// Antenna that produced the decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Antenna {
    One,
    Two,
}

/// Interrupt status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrqStatus(pub u8);

impl IrqStatus {
    /// A time frame was decoded
    pub fn rx_complete(&self) -> bool {
        self.0 & reg::IRQ_RX_COMPLETE != 0
    }

    /// A reception cycle ended without a frame
    pub fn cycle_complete(&self) -> bool {
        self.0 & reg::IRQ_CYCLE_COMPLETE != 0
    }
}

/// A decoded time frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedTime {
    /// UTC instant of the frame
    pub utc: ClockInstant,
    pub dst: DstStatus,
    pub leap_warning: LeapSecondWarning,
    pub antenna: Antenna,
    /// Receiver was in tracking mode (second marker only)
    pub tracking: bool,
}

impl ReceivedTime {
    /// Decodes the status register and the six BCD date-time registers
    pub fn decode(status: u8, raw: &[u8; 6], century_base: u16) -> Self {
        let year = century_base + bcd_to_dec(raw[0]) as u16;
        let utc = ClockInstant::new(
            year,
            bcd_to_dec(raw[1] & reg::MONTH_MASK),
            bcd_to_dec(raw[2] & reg::DAY_MASK),
            bcd_to_dec(raw[3] & reg::HOUR_MASK),
            bcd_to_dec(raw[4] & reg::MINUTE_MASK),
            bcd_to_dec(raw[5] & reg::SECOND_MASK),
        );

        ReceivedTime {
            utc,
            dst: DstStatus::from_status(status),
            leap_warning: LeapSecondWarning::from_status(status),
            antenna: if status & reg::STATUS_ANTENNA2 != 0 {
                Antenna::Two
            } else {
                Antenna::One
            },
            tracking: status & reg::STATUS_TRACKING != 0,
        }
    }
}

/// Next scheduled DST transition as broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextDst {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
}

/// Operations the control loop needs from a time-code receiver
pub trait TimeReceiver {
    /// Starts a reception cycle
    fn start_reception(&mut self, mode: ReceptionMode) -> Result<()>;

    /// Stops reception and powers down
    fn stop_reception(&mut self) -> Result<()>;

    /// Polls the interrupt status
    fn read_irq_status(&mut self) -> Result<IrqStatus>;

    /// Reads the decoded frame
    fn read_date_time(&mut self) -> Result<ReceivedTime>;

    /// Whether a reception cycle is in progress
    fn is_receiving(&self) -> bool;
}

/// Driver for the receiver over a register bus
pub struct ReceiverDriver<I2C, EN, L, D> {
    i2c: I2C,
    enable: EN,
    lines: L,
    delay: D,
    config: ReceiverConfig,
    powered: bool,
    initialized: bool,
    receiving: bool,
    last_recovery: Option<BusRecovery>,
}

impl<I2C, EN, L, D, E> ReceiverDriver<I2C, EN, L, D>
where
    I2C: Write<Error = E> + WriteRead<Error = E> + TransactionTimeout<Error = E>,
    E: Debug,
    EN: OutputPin,
    EN::Error: Debug,
    L: BusLines,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Creates a new driver; the receiver is not touched until `begin`
    pub fn new(i2c: I2C, enable: EN, lines: L, delay: D, config: ReceiverConfig) -> Self {
        ReceiverDriver {
            i2c,
            enable,
            lines,
            delay,
            config,
            powered: false,
            initialized: false,
            receiving: false,
            last_recovery: None,
        }
    }

    /// Power cycles the receiver and checks its identification register
    ///
    /// The receiver is powered off on return whatever the outcome.
    pub fn begin(&mut self) -> Result<()> {
        self.initialized = false;
        self.set_enable(false)?;
        self.powered = false;
        self.receiving = false;
        self.delay.delay_ms(POWER_CYCLE_SETTLE_MS);

        let identified = self.identify();
        let off = self.power_off();
        let device_id = identified?;
        off?;

        if device_id != reg::EXPECTED_DEVICE_ID {
            warn!(device_id = %format!("0x{:02X}", device_id), "Receiver not responding");
            return Err(Error::HardwareNotResponding { device_id });
        }

        self.initialized = true;
        info!(address = %format!("0x{:02X}", self.config.address), "Receiver identified");
        Ok(())
    }

    fn identify(&mut self) -> Result<u8> {
        self.power_on()?;
        self.delay.delay_ms(wakeup_ms(&self.config) + IDENTIFY_MARGIN_MS);

        // A floating bus reads as 0xFF
        match self.read_register(reg::DEVICE_ID) {
            Ok(id) => Ok(id),
            Err(Error::BusTimeout { .. }) | Err(Error::Bus(_)) => Ok(0xFF),
            Err(e) => Err(e),
        }
    }

    /// Raises the enable line, waits for wakeup and recovers the bus
    pub fn power_on(&mut self) -> Result<()> {
        self.set_enable(true)?;
        self.powered = true;
        self.delay.delay_ms(wakeup_ms(&self.config));

        let recovery = recover_bus(&mut self.lines, &mut self.delay, self.config.pins)?;
        self.last_recovery = Some(recovery);
        debug!(?recovery, "Receiver powered on");
        Ok(())
    }

    /// Lowers the enable line
    pub fn power_off(&mut self) -> Result<()> {
        self.powered = false;
        self.receiving = false;
        self.set_enable(false)?;
        debug!("Receiver powered off");
        Ok(())
    }

    /// Starts a reception cycle in the given antenna mode
    pub fn start_reception(&mut self, mode: ReceptionMode) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if !self.powered {
            self.power_on()?;
        }

        if let Err(e) = self.write_register(reg::CONTROL0, mode.control_byte()) {
            self.power_off()?;
            return Err(e);
        }
        self.receiving = true;
        info!(?mode, "Reception started");
        Ok(())
    }

    /// Stops reception and powers the receiver off
    pub fn stop_reception(&mut self) -> Result<()> {
        if self.initialized && self.powered {
            if let Err(e) = self.write_register(reg::CONTROL0, 0x00) {
                warn!(error = %e, "Failed to write stop command");
            }
        }
        self.receiving = false;
        self.power_off()
    }

    /// Raw status register, 0 while powered off
    pub fn read_status(&mut self) -> Result<u8> {
        if !self.powered {
            return Ok(0);
        }
        self.read_register(reg::STATUS0)
    }

    /// Interrupt status, empty while powered off
    ///
    /// Reading the register deasserts the interrupt line.
    pub fn read_irq_status(&mut self) -> Result<IrqStatus> {
        if !self.powered {
            return Ok(IrqStatus::default());
        }
        self.read_register(reg::IRQ_STATUS).map(IrqStatus)
    }

    /// Reads the decoded time frame
    pub fn read_date_time(&mut self) -> Result<ReceivedTime> {
        if !self.powered {
            warn!("Date-time read while receiver powered off");
            return Err(Error::NotPowered);
        }

        let status = self.read_register(reg::STATUS0)?;
        if status & reg::STATUS_RX_OK == 0 {
            return Err(Error::ReceptionNotConfirmed { status });
        }

        let mut raw = [0u8; 6];
        self.read_registers(reg::YEAR, &mut raw)?;

        let time = ReceivedTime::decode(status, &raw, self.config.century_base);
        if bcd_to_dec(raw[0]) == 99 {
            warn!(year = time.utc.year, "Broadcast year at end of century window");
        }

        info!(utc = %time.utc, dst = ?time.dst, antenna = ?time.antenna, "Time frame decoded");
        Ok(time)
    }

    /// Reads the next DST transition
    pub fn read_next_dst(&mut self) -> Result<NextDst> {
        if !self.powered {
            return Err(Error::NotPowered);
        }

        let mut raw = [0u8; 3];
        self.read_registers(reg::NEXT_DST_MONTH, &mut raw)?;
        Ok(NextDst {
            month: bcd_to_dec(raw[0] & reg::MONTH_MASK),
            day: bcd_to_dec(raw[1] & reg::DAY_MASK),
            hour: bcd_to_dec(raw[2] & reg::HOUR_MASK),
        })
    }

    /// Reads the identification register
    ///
    /// A receiver that was off is powered for the read and off again after.
    pub fn read_device_id(&mut self) -> Result<u8> {
        if self.powered {
            return self.read_register(reg::DEVICE_ID);
        }

        self.power_on()?;
        let device_id = self.read_register(reg::DEVICE_ID);
        self.power_off()?;
        device_id
    }

    /// Reads a single register
    pub fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.read_registers(register, &mut value)?;
        Ok(value[0])
    }

    /// Writes a single register
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        let address = self.config.address;
        self.bounded("register write", |i2c| i2c.write(address, &[register, value]))
    }

    fn read_registers(&mut self, start: u8, buffer: &mut [u8]) -> Result<()> {
        let address = self.config.address;
        self.bounded("register read", |i2c| i2c.write_read(address, &[start], buffer))
    }

    /// Runs one transaction under the controller's deadline
    ///
    /// The deadline is set before every transaction since bus recovery
    /// reinitializes the controller.
    fn bounded<R>(
        &mut self,
        operation: &'static str,
        transaction: impl FnOnce(&mut I2C) -> std::result::Result<R, E>,
    ) -> Result<R> {
        let timeout = self.config.bus_timeout;
        self.i2c.set_transaction_timeout(timeout).map_err(Error::bus)?;

        let started = Instant::now();
        let result = transaction(&mut self.i2c);
        let elapsed = started.elapsed();

        match result {
            Ok(value) => {
                if elapsed > timeout {
                    warn!(operation, ?elapsed, "Bus transaction exceeded its deadline");
                }
                Ok(value)
            }
            Err(e) if <I2C as TransactionTimeout>::is_timeout(&e) => {
                warn!(operation, ?elapsed, "Bus transaction aborted at deadline");
                Err(Error::BusTimeout { operation, elapsed })
            }
            Err(e) => {
                debug!(operation, error = ?e, "Bus transaction failed");
                Err(Error::bus(e))
            }
        }
    }

    fn set_enable(&mut self, high: bool) -> Result<()> {
        if high {
            self.enable.set_high().map_err(Error::bus)
        } else {
            self.enable.set_low().map_err(Error::bus)
        }
    }

    /// Whether the enable line is raised
    pub fn is_powered_on(&self) -> bool {
        self.powered
    }

    /// Whether the receiver has been identified
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a reception cycle is in progress
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Outcome of the most recent bus recovery pass
    pub fn last_recovery(&self) -> Option<BusRecovery> {
        self.last_recovery
    }

    /// Receiver settings
    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Releases the hardware handles
    pub fn release(self) -> (I2C, EN, L, D) {
        (self.i2c, self.enable, self.lines, self.delay)
    }
}

impl<I2C, EN, L, D, E> TimeReceiver for ReceiverDriver<I2C, EN, L, D>
where
    I2C: Write<Error = E> + WriteRead<Error = E> + TransactionTimeout<Error = E>,
    E: Debug,
    EN: OutputPin,
    EN::Error: Debug,
    L: BusLines,
    D: DelayMs<u32> + DelayUs<u32>,
{
    fn start_reception(&mut self, mode: ReceptionMode) -> Result<()> {
        ReceiverDriver::start_reception(self, mode)
    }

    fn stop_reception(&mut self) -> Result<()> {
        ReceiverDriver::stop_reception(self)
    }

    fn read_irq_status(&mut self) -> Result<IrqStatus> {
        ReceiverDriver::read_irq_status(self)
    }

    fn read_date_time(&mut self) -> Result<ReceivedTime> {
        ReceiverDriver::read_date_time(self)
    }

    fn is_receiving(&self) -> bool {
        ReceiverDriver::is_receiving(self)
    }
}

fn wakeup_ms(config: &ReceiverConfig) -> u32 {
    config.wakeup_delay.as_millis().min(u32::MAX as u128) as u32
}
