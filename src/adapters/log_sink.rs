//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing poller events to the `log` facade
//! (serial console on target, `env_logger` on the host).  The fatal line
//! itself is logged once by the FSM; this sink only notes it at debug
//! level so a fault never produces two error lines.

use log::{debug, info};

use crate::app::events::PollEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`PollEvent`] to the console.
pub struct LogEventSink;

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &PollEvent) {
        match event {
            PollEvent::Sample(s) => {
                info!(
                    "SAMPLE | #{} | raw=0x{:02X} | T={}\u{00b0}C",
                    s.iteration, s.raw, s.celsius
                );
            }
            PollEvent::StateChanged { from, to } => {
                debug!("STATE | {:?} -> {:?}", from, to);
            }
            PollEvent::StatusChanged { status } => {
                debug!("STATUS | 0x{:02X}", status);
            }
            PollEvent::Fault { fault, state } => {
                debug!("FAULT | {:?} in {:?}", fault, state);
            }
            PollEvent::Started { version } => {
                debug!("START | tc74mon v{}", version);
            }
        }
    }
}
