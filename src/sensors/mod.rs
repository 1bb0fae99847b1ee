//! Sensor register models.
//!
//! Pure decoding logic for the sensors this firmware talks to.  Nothing in
//! here touches a bus; the poll FSM issues the transfers and hands the raw
//! bytes to these helpers.

pub mod tc74;
