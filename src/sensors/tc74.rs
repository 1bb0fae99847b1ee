//! Microchip TC74 serial digital thermal sensor.
//!
//! Two registers, selected by writing a one-byte command before a read:
//!
//! | Cmd  | Name | Contents                                   |
//! |------|------|--------------------------------------------|
//! | 0x00 | RTR  | temperature, two's complement, 1 °C/LSB    |
//! | 0x01 | RWCR | bit7 STANDBY (r/w), bit6 DATA_READY (r/o)  |
//!
//! Bits 5..0 of RWCR always read as zero on a genuine part.  After power-up
//! or after leaving standby, DATA_READY stays clear for up to 250 ms while
//! the first conversion runs.

use crate::error::Fault;

/// Temperature register select.
pub const REG_TEMPERATURE: u8 = 0x00;
/// Configuration / status register select.
pub const REG_CONFIG: u8 = 0x01;

/// RWCR: device is in low-power standby.
pub const STANDBY: u8 = 0b1000_0000;
/// RWCR: a conversion result is available.
pub const DATA_READY: u8 = 0b0100_0000;
/// RWCR: bits that must read as zero.
pub const RESERVED_MASK: u8 = 0b0011_1111;

/// What the poller should do after reading RWCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Awake with a valid conversion: read the temperature.
    Ready,
    /// In standby: clear STANDBY first.
    Standby,
    /// Awake but still converting: back off and ask again.
    Busy,
}

/// A raw RWCR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte(pub u8);

impl StatusByte {
    pub fn is_standby(self) -> bool {
        self.0 & STANDBY != 0
    }

    pub fn is_ready(self) -> bool {
        self.0 & DATA_READY != 0
    }

    pub fn reserved_bits(self) -> u8 {
        self.0 & RESERVED_MASK
    }

    /// Classify the status.  The checks run in a fixed priority order; the
    /// first match wins.
    pub fn classify(self) -> Result<StatusClass, Fault> {
        let status = self.0;
        if self.reserved_bits() != 0 {
            return Err(Fault::UnexpectedDevice { status });
        }
        if self.is_ready() && !self.is_standby() {
            return Ok(StatusClass::Ready);
        }
        if self.is_standby() {
            return Ok(StatusClass::Standby);
        }
        if !self.is_ready() && !self.is_standby() {
            return Ok(StatusClass::Busy);
        }
        Err(Fault::ContradictoryStatus { status })
    }

    /// The value to write back to RWCR to leave standby.
    pub fn woken(self) -> u8 {
        self.0 & !STANDBY
    }
}

/// RTR holds an 8-bit two's complement value in whole degrees Celsius.
pub fn raw_to_celsius(raw: u8) -> i8 {
    raw as i8
}
