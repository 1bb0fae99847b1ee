//! Mutable context threaded through every FSM handler.
//!
//! `PollContext` is the single owned struct that state handlers read from
//! and write to: the injected ports, the transfer completion shared with
//! the bus driver, the raw TX/RX buffers, the pending pause and the sample
//! counter.  No globals; the host owns exactly one of these through
//! [`SensorPoller`](crate::app::service::SensorPoller).

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use heapless::Deque;
use log::{info, warn};

use super::StateId;
use crate::app::events::PollEvent;
use crate::app::ports::{StatusIndicator, TimerHandle, TimerPort, TransferPort};
use crate::config::PollerConfig;
use crate::error::Fault;
use crate::sensors::tc74::StatusByte;
use crate::transfer::{TransferCompletion, TransferHandle, TransferOutcome};

/// Register select + optional value.
pub const TX_LEN: usize = 2;
/// Every TC74 read is a single byte.
pub const RX_LEN: usize = 1;

/// Events queued during one tick.  A tick produces at most a transition,
/// a status change and a sample or fault.
const OUTBOX_CAP: usize = 8;

/// The shared context passed to every state handler function.
pub struct PollContext<B: TransferPort, T: TimerPort, L: StatusIndicator> {
    // -- Ports --
    pub bus: B,
    pub timer: T,
    pub led: Arc<L>,

    // -- Configuration --
    pub config: PollerConfig,

    // -- Shared with other execution contexts --
    /// Outcome flag and RX bytes written by the driver's completion callback.
    pub completion: Arc<TransferCompletion>,
    /// Set on entry to `FatalError`; stops the heartbeat toggling.
    pub halted: Arc<AtomicBool>,

    // -- Handles --
    pub channel: Option<B::Channel>,
    pub heartbeat: Option<TimerHandle>,
    pub transfer: TransferHandle,
    pub delay: Option<T::Delay>,

    // -- Raw buffers --
    pub tx: [u8; TX_LEN],
    pub rx: [u8; RX_LEN],

    // -- Polling state --
    pub pause_us: u32,
    /// Completed temperature reads.
    pub iteration: u32,
    /// Last RWCR value, for change-only logging.
    pub last_status: Option<u8>,

    // -- Fault --
    pub fault: Option<(Fault, StateId)>,
    pub fault_logged: bool,

    outbox: Deque<PollEvent, OUTBOX_CAP>,
}

impl<B: TransferPort, T: TimerPort, L: StatusIndicator> PollContext<B, T, L> {
    pub fn new(config: PollerConfig, bus: B, timer: T, led: Arc<L>) -> Self {
        Self {
            bus,
            timer,
            led,
            config,
            completion: Arc::new(TransferCompletion::new()),
            halted: Arc::new(AtomicBool::new(false)),
            channel: None,
            heartbeat: None,
            transfer: TransferHandle::INVALID,
            delay: None,
            tx: [0; TX_LEN],
            rx: [0; RX_LEN],
            pause_us: 0,
            iteration: 0,
            last_status: None,
            fault: None,
            fault_logged: false,
            outbox: Deque::new(),
        }
    }

    /// Back to power-on defaults.  Ports, configuration and the heartbeat
    /// registration are kept; no I/O.
    pub fn reset(&mut self) {
        self.completion.reset();
        self.halted.store(false, Ordering::Release);
        self.channel = None;
        self.transfer = TransferHandle::INVALID;
        self.delay = None;
        self.tx = [0; TX_LEN];
        self.rx = [0; RX_LEN];
        self.pause_us = 0;
        self.iteration = 0;
        self.last_status = None;
        self.fault = None;
        self.fault_logged = false;
        self.outbox.clear();
    }

    // -- Events --

    /// Queue an event for the sink.
    pub fn emit(&mut self, event: PollEvent) {
        if let Err(dropped) = self.outbox.push_back(event) {
            warn!("event outbox full, dropping {:?}", dropped);
        }
    }

    pub fn pop_event(&mut self) -> Option<PollEvent> {
        self.outbox.pop_front()
    }

    /// Record the first fault and the state it arose in.
    pub fn raise(&mut self, fault: Fault, state: StateId) {
        if self.fault.is_none() {
            self.fault = Some((fault, state));
            self.emit(PollEvent::Fault { fault, state });
        }
    }

    // -- Transfers --

    fn open_channel(&self) -> Result<B::Channel, Fault> {
        self.channel.ok_or(Fault::Setup("open bus channel"))
    }

    /// Write `tx[..tx_len]` then read one byte.  The outcome flag is armed
    /// before the driver sees the request.
    pub fn issue_write_read(&mut self, tx_len: usize, op: &'static str) -> Result<(), Fault> {
        let channel = self.open_channel()?;
        self.completion.arm();
        self.transfer = self
            .bus
            .issue_write_read(channel, self.config.address, &self.tx[..tx_len], RX_LEN)
            .ok_or(Fault::TransferRejected(op))?;
        Ok(())
    }

    /// Write `tx[..tx_len]`.
    pub fn issue_write(&mut self, tx_len: usize, op: &'static str) -> Result<(), Fault> {
        let channel = self.open_channel()?;
        self.completion.arm();
        self.transfer = self
            .bus
            .issue_write(channel, self.config.address, &self.tx[..tx_len])
            .ok_or(Fault::TransferRejected(op))?;
        Ok(())
    }

    /// Non-blocking check of the in-flight transfer.
    ///
    /// `Ok(true)` once it succeeded (RX bytes copied into `rx`), `Ok(false)`
    /// while it is still pending, `Err` if the driver reported an error.
    pub fn poll_transfer(&mut self, op: &'static str) -> Result<bool, Fault> {
        match self.completion.outcome() {
            TransferOutcome::Success => {
                self.check_handle(op);
                for (i, byte) in self.rx.iter_mut().enumerate() {
                    *byte = self.completion.rx_byte(i);
                }
                Ok(true)
            }
            TransferOutcome::Error => {
                self.check_handle(op);
                Err(Fault::TransferFailed(op))
            }
            TransferOutcome::InProgress | TransferOutcome::Idle => Ok(false),
        }
    }

    fn check_handle(&self, op: &'static str) {
        let reported = self.completion.last_handle();
        if reported != self.transfer {
            warn!("{}: completion for {:?}, expected {:?}", op, reported, self.transfer);
        }
    }

    /// Log and emit RWCR only when it differs from the last observed value.
    pub fn note_status(&mut self, status: StatusByte) {
        if self.last_status == Some(status.0) {
            return;
        }
        info!(
            "TC74 status 0x{:02X} (standby={}, ready={})",
            status.0,
            status.is_standby(),
            status.is_ready()
        );
        self.last_status = Some(status.0);
        self.emit(PollEvent::StatusChanged { status: status.0 });
    }
}
