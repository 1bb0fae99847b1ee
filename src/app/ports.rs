//! Port traits: the boundary between the poll FSM and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SensorPoller (domain)
//! ```
//!
//! The bus driver, the timer service, the status LED and the event sink are
//! all external collaborators.  [`SensorPoller`](super::service::SensorPoller)
//! consumes them via generics, so the state machine never touches hardware
//! directly and the whole sequence runs on the host against mocks.

use core::fmt::Debug;
use std::sync::Arc;

use crate::transfer::{TransferCompletion, TransferHandle};

// ───────────────────────────────────────────────────────────────
// Bus-transfer driver
// ───────────────────────────────────────────────────────────────

/// Access intent requested when opening a bus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoIntent {
    Read,
    Write,
    ReadWrite,
}

/// Queued, callback-completed I2C transfers.
///
/// Every `issue_*` call returns immediately.  The driver later reports the
/// result by calling [`TransferCompletion::complete`] on the context passed
/// to [`set_completion_handler`](Self::set_completion_handler), possibly
/// from another execution context and possibly before `issue_*` returns.
/// `None` means the driver refused to queue the request.
pub trait TransferPort {
    /// Opened channel handle.
    type Channel: Copy + Debug;

    fn open(&mut self, index: u8, intent: IoIntent) -> Option<Self::Channel>;

    fn set_completion_handler(&mut self, channel: Self::Channel, completion: Arc<TransferCompletion>);

    /// Read `len` bytes from `address`.
    fn issue_read(&mut self, channel: Self::Channel, address: u8, len: usize) -> Option<TransferHandle>;

    /// Write `tx` to `address`.
    fn issue_write(&mut self, channel: Self::Channel, address: u8, tx: &[u8]) -> Option<TransferHandle>;

    /// Write `tx`, then read `rx_len` bytes in the same bus transaction.
    fn issue_write_read(
        &mut self,
        channel: Self::Channel,
        address: u8,
        tx: &[u8],
        rx_len: usize,
    ) -> Option<TransferHandle>;
}

// ───────────────────────────────────────────────────────────────
// Timer service
// ───────────────────────────────────────────────────────────────

/// Callback run by the timer service on every period.  Runs in the timer's
/// own context, so it must be `Send + Sync`.
pub type PeriodicCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Handle of a registered periodic callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(pub u32);

/// Monotonic timer service.
pub trait TimerPort {
    /// Handle of a pending one-shot delay.
    type Delay: Copy + Debug;

    /// Register a periodic callback.  `None` if no timer is available.
    fn register_periodic(
        &mut self,
        callback: PeriodicCallback,
        initial_delay_ms: u32,
        period_ms: u32,
    ) -> Option<TimerHandle>;

    /// Start a one-shot delay of `us` microseconds.
    fn request_delay(&mut self, us: u32) -> Result<Self::Delay, TimerError>;

    /// Non-blocking completion check.
    fn is_delay_complete(&mut self, delay: Self::Delay) -> bool;
}

/// Errors from [`TimerPort::request_delay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Every one-shot slot is in use.
    NoFreeSlot,
    /// The requested duration cannot be represented by the timer.
    OutOfRange,
}

impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoFreeSlot => write!(f, "no free timer slot"),
            Self::OutOfRange => write!(f, "delay out of range"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Status LED
// ───────────────────────────────────────────────────────────────

/// The single status LED.  Driven both from the poll loop and from the
/// heartbeat timer context, hence `&self` methods and `Send + Sync`.
pub trait StatusIndicator: Send + Sync + 'static {
    fn toggle(&self);

    fn set_on(&self);

    fn is_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// The poller emits structured [`PollEvent`](super::events::PollEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::PollEvent);
}
