//! Sensor poller, the hexagonal core.
//!
//! [`SensorPoller`] owns the poll FSM and its context.  The host loop calls
//! [`initialize`](SensorPoller::initialize) once and then
//! [`tick`](SensorPoller::tick) as often as it likes; neither ever blocks.
//!
//! ```text
//!  TransferPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                   │      SensorPoller      │
//!     TimerPort ◀──▶│  FSM · TC74 decoding   │ ──▶ StatusIndicator
//!                   └────────────────────────┘
//! ```

use std::sync::Arc;

use crate::config::PollerConfig;
use crate::error::Fault;
use crate::fsm::context::PollContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};

use super::ports::{EventSink, StatusIndicator, TimerPort, TransferPort};

// ───────────────────────────────────────────────────────────────
// SensorPoller
// ───────────────────────────────────────────────────────────────

/// The TC74 polling state machine.
pub struct SensorPoller<B: TransferPort, T: TimerPort, L: StatusIndicator> {
    fsm: Fsm<B, T, L>,
    ctx: PollContext<B, T, L>,
}

impl<B: TransferPort, T: TimerPort, L: StatusIndicator> SensorPoller<B, T, L> {
    /// Construct the poller around its ports.  Performs no I/O; the machine
    /// starts in `Init`.
    pub fn new(config: PollerConfig, bus: B, timer: T, led: Arc<L>) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Init),
            ctx: PollContext::new(config, bus, timer, led),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Reset every field to its power-on default and return to `Init`.
    /// Never fails and touches no port, so it is safe before the drivers
    /// are up.  A heartbeat registered by an earlier start keeps running and
    /// is reused by the next `Init`.
    pub fn initialize(&mut self) {
        self.ctx.reset();
        self.fsm.reset(StateId::Init);
    }

    /// Run at most one state action, then flush queued events to `sink`.
    pub fn tick(&mut self, sink: &mut impl EventSink) {
        self.fsm.tick(&mut self.ctx);
        while let Some(event) = self.ctx.pop_event() {
            sink.emit(&event);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Ticks spent in the current state.
    pub fn ticks_in_state(&self) -> u64 {
        self.fsm.ticks_in_current_state()
    }

    /// Completed temperature reads since start.
    pub fn sample_count(&self) -> u32 {
        self.ctx.iteration
    }

    /// Last RWCR value read from the sensor.
    pub fn last_status(&self) -> Option<u8> {
        self.ctx.last_status
    }

    /// The fault that halted the poller and the state it arose in.
    pub fn fault(&self) -> Option<(Fault, StateId)> {
        self.ctx.fault
    }

    /// `true` once the fatal line has been written to the log.
    pub fn fault_reported(&self) -> bool {
        self.ctx.fault_logged
    }

    /// `true` once the poller is parked in `FatalError`.
    pub fn is_halted(&self) -> bool {
        self.fsm.current_state() == StateId::FatalError
    }

    // ── Port access ───────────────────────────────────────────

    pub fn bus(&self) -> &B {
        &self.ctx.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.ctx.bus
    }

    pub fn timer(&self) -> &T {
        &self.ctx.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.ctx.timer
    }

    pub fn led(&self) -> &L {
        &self.ctx.led
    }
}
