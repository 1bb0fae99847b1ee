//! One queued I2C transfer, executed against any embedded-hal 1.0 bus.
//!
//! Shared by the inline and the threaded bus adapters.  Buffers are
//! fixed-size: TC74 transfers are one or two bytes out, one byte in.

use embedded_hal::i2c::{Error as _, I2c};
use heapless::Vec;
use log::debug;

use crate::transfer::{RX_CAPACITY, TransferEvent};

/// Largest write the adapters accept (register select + value).
pub const TX_CAPACITY: usize = 2;

/// Request as queued by `TransferPort::issue_*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cOp {
    Read { len: usize },
    Write { tx: Vec<u8, TX_CAPACITY> },
    WriteRead { tx: Vec<u8, TX_CAPACITY>, rx_len: usize },
}

/// Bytes received by a finished [`I2cOp`].
#[derive(Debug, Clone, Copy)]
pub struct Received {
    buf: [u8; RX_CAPACITY],
    len: usize,
}

impl Received {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl I2cOp {
    /// `None` if `len` exceeds the receive buffer.
    pub fn read(len: usize) -> Option<Self> {
        (len <= RX_CAPACITY).then_some(Self::Read { len })
    }

    /// `None` if `tx` does not fit the transmit buffer.
    pub fn write(tx: &[u8]) -> Option<Self> {
        Some(Self::Write {
            tx: Vec::from_slice(tx).ok()?,
        })
    }

    pub fn write_read(tx: &[u8], rx_len: usize) -> Option<Self> {
        if rx_len > RX_CAPACITY {
            return None;
        }
        Some(Self::WriteRead {
            tx: Vec::from_slice(tx).ok()?,
            rx_len,
        })
    }

    /// Run the transfer to completion on `i2c`.
    pub fn execute<I: I2c>(&self, i2c: &mut I, address: u8) -> (TransferEvent, Received) {
        let mut received = Received {
            buf: [0; RX_CAPACITY],
            len: 0,
        };
        let result = match self {
            Self::Read { len } => {
                received.len = *len;
                i2c.read(address, &mut received.buf[..*len])
            }
            Self::Write { tx } => i2c.write(address, tx),
            Self::WriteRead { tx, rx_len } => {
                received.len = *rx_len;
                i2c.write_read(address, tx, &mut received.buf[..*rx_len])
            }
        };

        match result {
            Ok(()) => (TransferEvent::Complete, received),
            Err(e) => {
                debug!("i2c 0x{:02X} {:?} failed: {:?}", address, self, e.kind());
                received.len = 0;
                (TransferEvent::Error, received)
            }
        }
    }
}
