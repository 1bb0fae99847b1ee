//! Single-colour status LED driver.
//!
//! One GPIO, driven from two contexts: the heartbeat timer toggles it and
//! the poll loop forces it on once the poller is halted.  The pin lives in
//! a `critical_section::Mutex` so both contexts can reach it.
//!
//! ## Dual-target design
//!
//! On hardware: any embedded-hal `StatefulOutputPin`.
//! On host/test: [`SimPin`] tracks the level in memory.

use core::cell::RefCell;
use core::convert::Infallible;

use critical_section::Mutex;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

use crate::app::ports::StatusIndicator;

/// [`StatusIndicator`] over a push-pull output pin (active high).
pub struct PinIndicator<P> {
    pin: Mutex<RefCell<P>>,
}

impl<P: StatefulOutputPin> PinIndicator<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin: Mutex::new(RefCell::new(pin)),
        }
    }

    pub fn into_inner(self) -> P {
        self.pin.into_inner().into_inner()
    }
}

// Pin errors are dropped: neither the timer context nor the fatal path has
// anywhere to report them.
impl<P: StatefulOutputPin + Send + 'static> StatusIndicator for PinIndicator<P> {
    fn toggle(&self) {
        critical_section::with(|cs| {
            let _ = self.pin.borrow_ref_mut(cs).toggle();
        });
    }

    fn set_on(&self) {
        critical_section::with(|cs| {
            let _ = self.pin.borrow_ref_mut(cs).set_high();
        });
    }

    fn is_on(&self) -> bool {
        critical_section::with(|cs| self.pin.borrow_ref_mut(cs).is_set_high().unwrap_or(false))
    }
}

/// In-memory output pin for host runs.
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
    toggles: u32,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of level changes so far.
    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    fn drive(&mut self, high: bool) {
        if self.high != high {
            self.toggles += 1;
        }
        self.high = high;
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high)
    }
}
