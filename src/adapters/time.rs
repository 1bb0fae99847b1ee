//! Host timer adapter.
//!
//! Implements [`TimerPort`] on `std`:
//!
//! - periodic callbacks run on their own detached thread (the host
//!   counterpart of a timer-task callback), sleeping between periods;
//! - one-shot delays are `Instant` deadlines polled by the FSM.

use std::thread;
use std::time::{Duration, Instant};

use log::info;

use crate::app::ports::{PeriodicCallback, TimerError, TimerHandle, TimerPort};

/// Monotonic timer service for host simulation.
pub struct StdTimer {
    start: Instant,
    next_handle: u32,
}

impl Default for StdTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StdTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            next_handle: 0,
        }
    }

    /// Microseconds since construction (monotonic).
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl TimerPort for StdTimer {
    type Delay = Instant;

    fn register_periodic(
        &mut self,
        callback: PeriodicCallback,
        initial_delay_ms: u32,
        period_ms: u32,
    ) -> Option<TimerHandle> {
        if period_ms == 0 {
            return None;
        }
        let handle = TimerHandle(self.next_handle);
        let initial = Duration::from_millis(initial_delay_ms.into());
        let period = Duration::from_millis(period_ms.into());

        thread::Builder::new()
            .name(format!("periodic-{}", handle.0))
            .spawn(move || {
                thread::sleep(initial);
                loop {
                    callback();
                    thread::sleep(period);
                }
            })
            .ok()?;

        self.next_handle += 1;
        info!("timer: periodic {} every {}ms", handle.0, period_ms);
        Some(handle)
    }

    fn request_delay(&mut self, us: u32) -> Result<Instant, TimerError> {
        Instant::now()
            .checked_add(Duration::from_micros(us.into()))
            .ok_or(TimerError::OutOfRange)
    }

    fn is_delay_complete(&mut self, deadline: Instant) -> bool {
        Instant::now() >= deadline
    }
}
