//! Application core: pure domain logic, zero I/O.
//!
//! [`service::SensorPoller`] drives the TC74 poll FSM.  All interaction
//! with the bus, the timer service and the LED happens through the
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
