//! tc74mon firmware library.
//!
//! Polls a TC74 temperature sensor over callback-completed I2C transfers
//! while a heartbeat LED blinks.  The poll state machine is pure logic
//! behind port traits; adapters for embedded-hal buses, a simulated sensor
//! and a host timer make the whole thing runnable and testable on the host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod sensors;
pub mod transfer;

pub mod adapters;
pub mod drivers;
