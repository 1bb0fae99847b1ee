//! Transfer completion flag shared with the bus driver.
//!
//! The bus driver finishes a transfer out-of-band (interrupt, driver task,
//! worker thread) and reports it through [`TransferCompletion::complete`].
//! The poll loop observes the result on a later tick.
//!
//! ```text
//!  driver context                        poll loop (tick)
//!  ──────────────                        ────────────────
//!  rx[i].store(Relaxed)
//!  outcome.store(Success, Release) ───▶  outcome.load(Acquire)
//!                                        rx[i].load(Relaxed)
//! ```
//!
//! The outcome byte is the only synchronisation point.  The received bytes
//! are written before the outcome is published and read only after a
//! terminal outcome has been observed, so no lock is needed.  At most one
//! transfer is ever in flight.

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Largest read the poller ever issues (the TC74 returns single bytes).
pub const RX_CAPACITY: usize = 1;

/// Identifier the driver assigns to a queued transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferHandle(pub u32);

impl TransferHandle {
    /// Sentinel meaning "no transfer".
    pub const INVALID: Self = Self(u32::MAX);
}

/// Event kind passed to the completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    Complete,
    Error,
}

/// Outcome of the most recently issued transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferOutcome {
    Idle = 0,
    InProgress = 1,
    Success = 2,
    Error = 3,
}

impl TransferOutcome {
    /// `true` once the driver has delivered a result.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::InProgress,
            2 => Self::Success,
            3 => Self::Error,
            _ => Self::Idle,
        }
    }
}

/// Completion context handed to the bus driver with the callback.
pub struct TransferCompletion {
    outcome: AtomicU8,
    last_handle: AtomicU32,
    rx: [AtomicU8; RX_CAPACITY],
}

impl Default for TransferCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferCompletion {
    pub const fn new() -> Self {
        Self {
            outcome: AtomicU8::new(TransferOutcome::Idle as u8),
            last_handle: AtomicU32::new(TransferHandle::INVALID.0),
            rx: [const { AtomicU8::new(0) }; RX_CAPACITY],
        }
    }

    /// Return to `Idle`.  Only valid while no transfer is in flight.
    pub fn reset(&self) {
        for byte in &self.rx {
            byte.store(0, Ordering::Relaxed);
        }
        self.last_handle
            .store(TransferHandle::INVALID.0, Ordering::Relaxed);
        self.outcome
            .store(TransferOutcome::Idle as u8, Ordering::Release);
    }

    /// Mark a transfer as in flight.  Must be called *before* the transfer
    /// is issued: a driver may complete inline, inside the issue call.
    pub fn arm(&self) {
        self.outcome
            .store(TransferOutcome::InProgress as u8, Ordering::Release);
    }

    /// Completion callback.  Called once per issued transfer from the
    /// driver's context, after the driver is done writing `rx`.
    pub fn complete(&self, event: TransferEvent, handle: TransferHandle, rx: &[u8]) {
        for (slot, byte) in self.rx.iter().zip(rx) {
            slot.store(*byte, Ordering::Relaxed);
        }
        self.last_handle.store(handle.0, Ordering::Relaxed);
        let outcome = match event {
            TransferEvent::Complete => TransferOutcome::Success,
            TransferEvent::Error => TransferOutcome::Error,
        };
        self.outcome.store(outcome as u8, Ordering::Release);
    }

    /// Current outcome.  Acquire pairs with the release in [`complete`](Self::complete).
    pub fn outcome(&self) -> TransferOutcome {
        TransferOutcome::from_u8(self.outcome.load(Ordering::Acquire))
    }

    /// Received byte `index`.  Meaningful only after `outcome()` returned
    /// `Success`.
    pub fn rx_byte(&self, index: usize) -> u8 {
        self.rx[index].load(Ordering::Relaxed)
    }

    /// Handle of the last transfer the driver reported on.
    pub fn last_handle(&self) -> TransferHandle {
        TransferHandle(self.last_handle.load(Ordering::Relaxed))
    }
}
