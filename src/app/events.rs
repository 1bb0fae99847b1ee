//! Outbound poller events.
//!
//! The state handlers queue these in the poll context; the
//! [`SensorPoller`](super::service::SensorPoller) drains them into an
//! [`EventSink`](super::ports::EventSink) at the end of every tick.

use serde::Serialize;

use crate::error::Fault;
use crate::fsm::StateId;

/// One completed temperature read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemperatureSample {
    /// 1-based count of completed reads.
    pub iteration: u32,
    /// RTR byte exactly as received.
    pub raw: u8,
    /// `raw` reinterpreted as two's complement.
    pub celsius: i8,
}

/// Structured events emitted by the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// The poller left `Init` (carries the crate version).
    Started { version: &'static str },

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// RWCR differs from the previously observed value.
    StatusChanged { status: u8 },

    /// A temperature read completed.
    Sample(TemperatureSample),

    /// The poller entered `FatalError`.
    Fault { fault: Fault, state: StateId },
}
