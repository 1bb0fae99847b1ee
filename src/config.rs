//! Poller configuration parameters
//!
//! Bus placement, heartbeat cadence and the three back-off intervals of
//! the polling loop.  Defaults match a TC74A0 on bus channel 0.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Shortest pause the poller will ever request from the timer service.
pub const MIN_PAUSE_US: u32 = 1_000;

/// Poller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    // --- Bus ---
    /// Index of the I2C driver instance to open
    pub bus_channel: u8,
    /// 7-bit slave address of the sensor
    pub address: u8,

    // --- Heartbeat ---
    /// Delay before the first heartbeat toggle (milliseconds)
    pub heartbeat_initial_delay_ms: u32,
    /// Heartbeat LED toggle period (milliseconds)
    pub heartbeat_period_ms: u32,

    // --- Back-off ---
    /// Pause between two completed temperature reads (microseconds)
    pub sample_interval_us: u32,
    /// Pause before re-querying a busy sensor (microseconds)
    pub busy_retry_us: u32,
    /// Pause after clearing STANDBY before the next status query (microseconds)
    pub wake_settle_us: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            // Bus
            bus_channel: 0,
            address: 0x48, // TC74A0

            // Heartbeat
            heartbeat_initial_delay_ms: 0,
            heartbeat_period_ms: 500,

            // Back-off
            sample_interval_us: 1_000_000, // 1 Hz
            busy_retry_us: 300_000,        // conversion takes up to 250 ms
            wake_settle_us: 300_000,
        }
    }
}

impl PollerConfig {
    /// Reject values the poller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address > 0x7F {
            return Err(ConfigError("address must be a 7-bit I2C address"));
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError("heartbeat_period_ms must be non-zero"));
        }
        if self.sample_interval_us < MIN_PAUSE_US {
            return Err(ConfigError("sample_interval_us below 1000"));
        }
        if self.busy_retry_us < MIN_PAUSE_US {
            return Err(ConfigError("busy_retry_us below 1000"));
        }
        if self.wake_settle_us < MIN_PAUSE_US {
            return Err(ConfigError("wake_settle_us below 1000"));
        }
        Ok(())
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
