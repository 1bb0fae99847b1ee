//! Simulated TC74 on an embedded-hal I2C bus.
//!
//! Models the two registers, the STANDBY/DATA_READY handshake and the
//! conversion latency after leaving standby (as a number of RWCR reads that
//! still report busy).  Transfers to any other address are NAKed, which is
//! what the poller sees when the sensor is missing.

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::sensors::tc74::{DATA_READY, REG_CONFIG, REG_TEMPERATURE, STANDBY};

/// Simulated TC74.
#[derive(Debug, Clone)]
pub struct SimTc74 {
    address: u8,
    present: bool,
    temperature: i8,
    pointer: u8,
    standby: bool,
    /// RWCR reads left that report "converting".
    busy_reads: u8,
    /// Busy reads to report after STANDBY is cleared.
    wake_busy_reads: u8,
    /// Raw RWCR override, for feeding the poller bytes a TC74 never sends.
    forced_status: Option<u8>,
}

impl SimTc74 {
    /// An awake sensor with a conversion already available.
    pub fn new(address: u8, temperature: i8) -> Self {
        Self {
            address,
            present: true,
            temperature,
            pointer: REG_TEMPERATURE,
            standby: false,
            busy_reads: 0,
            wake_busy_reads: 1,
            forced_status: None,
        }
    }

    /// Start in standby, as the part does when strapped for low power.
    #[must_use]
    pub fn in_standby(mut self) -> Self {
        self.standby = true;
        self
    }

    /// Report busy for the first `reads` RWCR reads (power-up conversion).
    #[must_use]
    pub fn powering_up(mut self, reads: u8) -> Self {
        self.busy_reads = reads;
        self
    }

    /// Busy reads reported after waking from standby.
    #[must_use]
    pub fn with_wake_latency(mut self, reads: u8) -> Self {
        self.wake_busy_reads = reads;
        self
    }

    /// Always answer RWCR reads with `status`.
    #[must_use]
    pub fn with_forced_status(mut self, status: u8) -> Self {
        self.forced_status = Some(status);
        self
    }

    /// Unplug (`false`) or replug (`true`) the sensor.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn is_standby(&self) -> bool {
        self.standby
    }

    fn status_byte(&mut self) -> u8 {
        if let Some(status) = self.forced_status {
            return status;
        }
        if self.standby {
            return STANDBY;
        }
        if self.busy_reads > 0 {
            self.busy_reads -= 1;
            return 0;
        }
        DATA_READY
    }

    fn read_register(&mut self) -> u8 {
        match self.pointer {
            REG_CONFIG => self.status_byte(),
            _ => self.temperature as u8,
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let Some((&command, value)) = bytes.split_first() else {
            return;
        };
        self.pointer = command;
        if let (REG_CONFIG, Some(&value)) = (command, value.first()) {
            let standby = value & STANDBY != 0;
            if self.standby && !standby {
                self.busy_reads = self.wake_busy_reads;
            }
            self.standby = standby;
        }
    }
}

impl ErrorType for SimTc74 {
    type Error = ErrorKind;
}

impl I2c for SimTc74 {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        if !self.present || address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => self.write_bytes(bytes),
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.read_register();
                    }
                }
            }
        }
        Ok(())
    }
}
