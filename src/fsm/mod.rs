//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern in Rust:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────────┬───────────┬──────────────────────────┐ │
//! │  │ StateId          │ on_enter  │ on_update                │ │
//! │  ├──────────────────┼───────────┼──────────────────────────┤ │
//! │  │ Init             │ -         │ fn(ctx)->Result<Option>  │ │
//! │  │ OpenChannel      │ -         │ fn(ctx)->Result<Option>  │ │
//! │  │ ...              │           │                          │ │
//! │  │ FatalError       │ fn(ctx)   │ fn(ctx)->Result<Option>  │ │
//! │  └──────────────────┴───────────┴──────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! `Ok(Some(next))` moves to `next` and runs its `on_enter`; `Ok(None)`
//! stays put; `Err(fault)` records the fault against the current state and
//! moves to `FatalError`, which never exits.

pub mod context;
pub mod states;

use context::PollContext;
use log::debug;

use crate::app::events::PollEvent;
use crate::app::ports::{StatusIndicator, TimerPort, TransferPort};
use crate::error::Fault;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all poller states, in normal progression order.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Init = 0,
    OpenChannel = 1,
    ProbeDevice = 2,
    QueryStatus = 3,
    QueryStatusRead = 4,
    WakeUp = 5,
    WakeUpConfirm = 6,
    Busy = 7,
    QueryTemperature = 8,
    QueryTemperatureRead = 9,
    Pause = 10,
    PauseWait = 11,
    FatalError = 12,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 13;
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` actions.  Runs exactly once per transition.
pub type StateActionFn<B, T, L> = fn(&mut PollContext<B, T, L>);

/// Signature for the per-tick update handler.
pub type StateUpdateFn<B, T, L> = fn(&mut PollContext<B, T, L>) -> Result<Option<StateId>, Fault>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor<B: TransferPort, T: TimerPort, L: StatusIndicator> {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<B, T, L>>,
    pub on_update: StateUpdateFn<B, T, L>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and threads a [`PollContext`] through every
/// handler call.
pub struct Fsm<B: TransferPort, T: TimerPort, L: StatusIndicator> {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor<B, T, L>; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl<B: TransferPort, T: TimerPort, L: StatusIndicator> Fsm<B, T, L> {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor<B, T, L>; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Jump back to `initial` without running any handler.
    pub fn reset(&mut self, initial: StateId) {
        self.current = initial as usize;
        self.tick_count = 0;
        self.state_entry_tick = 0;
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. `Ok(Some(next))` → update pointer → `on_enter(next)`.
    /// 3. `Err(fault)` → record fault → transition to `FatalError`.
    pub fn tick(&mut self, ctx: &mut PollContext<B, T, L>) {
        self.tick_count = self.tick_count.wrapping_add(1);

        match (self.table[self.current].on_update)(ctx) {
            Ok(Some(next_id)) => self.transition(next_id, ctx),
            Ok(None) => {}
            Err(fault) => {
                ctx.raise(fault, self.current_state());
                self.transition(StateId::FatalError, ctx);
            }
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count.wrapping_sub(self.state_entry_tick)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut PollContext<B, T, L>) {
        let next_idx = next_id as usize;
        if next_idx == self.current {
            return;
        }

        debug!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );
        ctx.emit(PollEvent::StateChanged {
            from: self.current_state(),
            to: next_id,
        });

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
