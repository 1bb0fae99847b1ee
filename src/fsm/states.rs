//! Concrete state handler functions and table builder.
//!
//! Every transfer-issuing state is paired with a poll state: the issue
//! state queues the transfer and moves on in the same tick, the poll state
//! waits (one tick at a time) for the completion callback to publish a
//! terminal outcome.
//!
//! ```text
//!  INIT ─▶ OPEN_CHANNEL ─▶ PROBE_DEVICE ─▶ QUERY_STATUS ─▶ QUERY_STATUS_READ
//!                                              ▲                 │
//!              ┌───────────[standby]───────────┼─────────────────┤
//!              ▼                               │      [busy]     │ [ready]
//!           WAKE_UP ─▶ WAKE_UP_CONFIRM         │        │        ▼
//!                            │                 │        ▼   QUERY_TEMPERATURE
//!                            │                 │      BUSY       │
//!                            ▼                 │        │        ▼
//!                          PAUSE ◀─────────────┼────────┴── QUERY_TEMPERATURE_READ
//!                            │                 │
//!                            ▼                 │
//!                        PAUSE_WAIT ───────────┘
//!
//!  Any state ──[fault]──▶ FATAL_ERROR (absorbing)
//! ```

use core::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, error, info};

use super::context::{PollContext, RX_LEN};
use super::{StateDescriptor, StateId};
use crate::app::events::{PollEvent, TemperatureSample};
use crate::app::ports::{IoIntent, StatusIndicator, TimerPort, TransferPort};
use crate::config::MIN_PAUSE_US;
use crate::error::Fault;
use crate::sensors::tc74::{self, StatusByte, StatusClass};

/// Firmware version reported in the start banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

type Step = Result<Option<StateId>, Fault>;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table.  Called once at construction.
pub fn build_state_table<B, T, L>() -> [StateDescriptor<B, T, L>; StateId::COUNT]
where
    B: TransferPort,
    T: TimerPort,
    L: StatusIndicator,
{
    [
        StateDescriptor {
            id: StateId::Init,
            name: "Init",
            on_enter: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: StateId::OpenChannel,
            name: "OpenChannel",
            on_enter: None,
            on_update: open_channel_update,
        },
        StateDescriptor {
            id: StateId::ProbeDevice,
            name: "ProbeDevice",
            on_enter: None,
            on_update: probe_device_update,
        },
        StateDescriptor {
            id: StateId::QueryStatus,
            name: "QueryStatus",
            on_enter: None,
            on_update: query_status_update,
        },
        StateDescriptor {
            id: StateId::QueryStatusRead,
            name: "QueryStatusRead",
            on_enter: None,
            on_update: query_status_read_update,
        },
        StateDescriptor {
            id: StateId::WakeUp,
            name: "WakeUp",
            on_enter: None,
            on_update: wake_up_update,
        },
        StateDescriptor {
            id: StateId::WakeUpConfirm,
            name: "WakeUpConfirm",
            on_enter: None,
            on_update: wake_up_confirm_update,
        },
        StateDescriptor {
            id: StateId::Busy,
            name: "Busy",
            on_enter: None,
            on_update: busy_update,
        },
        StateDescriptor {
            id: StateId::QueryTemperature,
            name: "QueryTemperature",
            on_enter: None,
            on_update: query_temperature_update,
        },
        StateDescriptor {
            id: StateId::QueryTemperatureRead,
            name: "QueryTemperatureRead",
            on_enter: None,
            on_update: query_temperature_read_update,
        },
        StateDescriptor {
            id: StateId::Pause,
            name: "Pause",
            on_enter: None,
            on_update: pause_update,
        },
        StateDescriptor {
            id: StateId::PauseWait,
            name: "PauseWait",
            on_enter: None,
            on_update: pause_wait_update,
        },
        StateDescriptor {
            id: StateId::FatalError,
            name: "FatalError",
            on_enter: Some(fatal_error_enter),
            on_update: fatal_error_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Setup
// ═══════════════════════════════════════════════════════════════════════════

fn init_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    info!("Starting tc74mon v{}", VERSION);

    // The timer port cannot cancel a periodic callback, so a heartbeat from
    // an earlier start keeps running and is reused.
    if let Some(handle) = ctx.heartbeat {
        debug!("heartbeat {:?} already running", handle);
        ctx.emit(PollEvent::Started { version: VERSION });
        return Ok(Some(StateId::OpenChannel));
    }

    let led = Arc::clone(&ctx.led);
    let halted = Arc::clone(&ctx.halted);
    let heartbeat = ctx
        .timer
        .register_periodic(
            Box::new(move || {
                if !halted.load(Ordering::Acquire) {
                    led.toggle();
                }
            }),
            ctx.config.heartbeat_initial_delay_ms,
            ctx.config.heartbeat_period_ms,
        )
        .ok_or(Fault::Setup("register heartbeat timer"))?;

    ctx.heartbeat = Some(heartbeat);
    ctx.emit(PollEvent::Started { version: VERSION });
    Ok(Some(StateId::OpenChannel))
}

fn open_channel_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    let channel = ctx
        .bus
        .open(ctx.config.bus_channel, IoIntent::ReadWrite)
        .ok_or(Fault::Setup("open bus channel"))?;
    info!("bus channel {} open: {:?}", ctx.config.bus_channel, channel);
    ctx.channel = Some(channel);
    ctx.bus
        .set_completion_handler(channel, Arc::clone(&ctx.completion));

    // Armed before issuing: the driver may complete inside `issue_read`.
    ctx.completion.arm();
    ctx.transfer = ctx
        .bus
        .issue_read(channel, ctx.config.address, RX_LEN)
        .ok_or(Fault::TransferRejected("probe read"))?;
    Ok(Some(StateId::ProbeDevice))
}

fn probe_device_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    let address = ctx.config.address;
    match ctx.poll_transfer("probe read") {
        Ok(true) => {
            info!("TC74 ACK at 0x{:02X}", address);
            Ok(Some(StateId::QueryStatus))
        }
        Ok(false) => Ok(None),
        Err(_) => Err(Fault::NoDevice { address }),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Status query
// ═══════════════════════════════════════════════════════════════════════════

fn query_status_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    ctx.tx[0] = tc74::REG_CONFIG;
    ctx.issue_write_read(1, "status query")?;
    Ok(Some(StateId::QueryStatusRead))
}

fn query_status_read_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    if !ctx.poll_transfer("status query")? {
        return Ok(None);
    }

    let status = StatusByte(ctx.rx[0]);
    ctx.note_status(status);

    let next = match status.classify()? {
        StatusClass::Ready => StateId::QueryTemperature,
        StatusClass::Standby => StateId::WakeUp,
        StatusClass::Busy => StateId::Busy,
    };
    Ok(Some(next))
}

// ═══════════════════════════════════════════════════════════════════════════
//  Wake-up and busy back-off
// ═══════════════════════════════════════════════════════════════════════════

fn wake_up_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    info!("TC74 in standby, waking");
    ctx.tx[0] = tc74::REG_CONFIG;
    ctx.tx[1] = StatusByte(ctx.rx[0]).woken();
    ctx.issue_write(2, "wake-up write")?;
    Ok(Some(StateId::WakeUpConfirm))
}

fn wake_up_confirm_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    if !ctx.poll_transfer("wake-up write")? {
        return Ok(None);
    }
    ctx.pause_us = ctx.config.wake_settle_us;
    Ok(Some(StateId::Pause))
}

fn busy_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    debug!("TC74 busy, retrying in {}us", ctx.config.busy_retry_us);
    ctx.pause_us = ctx.config.busy_retry_us;
    Ok(Some(StateId::Pause))
}

// ═══════════════════════════════════════════════════════════════════════════
//  Temperature read
// ═══════════════════════════════════════════════════════════════════════════

fn query_temperature_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    ctx.tx[0] = tc74::REG_TEMPERATURE;
    ctx.issue_write_read(1, "temperature query")?;
    Ok(Some(StateId::QueryTemperatureRead))
}

fn query_temperature_read_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    if !ctx.poll_transfer("temperature query")? {
        return Ok(None);
    }

    let raw = ctx.rx[0];
    ctx.iteration = ctx.iteration.wrapping_add(1);
    ctx.emit(PollEvent::Sample(TemperatureSample {
        iteration: ctx.iteration,
        raw,
        celsius: tc74::raw_to_celsius(raw),
    }));
    ctx.pause_us = ctx.config.sample_interval_us;
    Ok(Some(StateId::Pause))
}

// ═══════════════════════════════════════════════════════════════════════════
//  Pause
// ═══════════════════════════════════════════════════════════════════════════

fn pause_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    if ctx.pause_us < MIN_PAUSE_US {
        return Err(Fault::PauseTooShort { us: ctx.pause_us });
    }
    let delay = ctx
        .timer
        .request_delay(ctx.pause_us)
        .map_err(|_| Fault::DelayRequest)?;
    ctx.delay = Some(delay);
    Ok(Some(StateId::PauseWait))
}

fn pause_wait_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    let delay = ctx.delay.ok_or(Fault::DelayRequest)?;
    if !ctx.timer.is_delay_complete(delay) {
        return Ok(None);
    }
    ctx.delay = None;
    Ok(Some(StateId::QueryStatus))
}

// ═══════════════════════════════════════════════════════════════════════════
//  FATAL_ERROR: absorbing, LED solid on
// ═══════════════════════════════════════════════════════════════════════════

fn fatal_error_enter<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) {
    // Heartbeat must stop first or it toggles the LED back off.
    ctx.halted.store(true, Ordering::Release);
    ctx.led.set_on();

    if !ctx.fault_logged {
        ctx.fault_logged = true;
        match ctx.fault {
            Some((fault, state)) => {
                error!("FATAL in {:?} ({} fault): {}", state, fault.kind(), fault);
            }
            None => error!("FATAL: halted without a recorded fault"),
        }
    }
}

fn fatal_error_update<B: TransferPort, T: TimerPort, L: StatusIndicator>(
    ctx: &mut PollContext<B, T, L>,
) -> Step {
    ctx.led.set_on();
    Ok(None)
}
