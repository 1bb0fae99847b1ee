//! Error types for the TC74 poller.
//!
//! Every fatal condition the state machine can hit funnels into [`Fault`].
//! All variants are `Copy` so they can be stored in the poll context and
//! carried in events without allocation.  There is no recovery path once a
//! fault is raised: the FSM parks in `FatalError` until the process restarts.

use core::fmt;

// ---------------------------------------------------------------------------
// Fatal faults
// ---------------------------------------------------------------------------

/// A condition that sends the poller into its absorbing `FatalError` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// A one-time setup call failed.  Carries the name of the call.
    Setup(&'static str),
    /// The bus driver refused to queue a transfer.
    TransferRejected(&'static str),
    /// The probe read at the configured address was not acknowledged.
    NoDevice { address: u8 },
    /// An issued transfer completed with an error.
    TransferFailed(&'static str),
    /// Reserved status bits were set: the device is not a TC74.
    UnexpectedDevice { status: u8 },
    /// READY/STANDBY bits in a combination the decoder cannot classify.
    ContradictoryStatus { status: u8 },
    /// A pause shorter than the minimum was requested.
    PauseTooShort { us: u32 },
    /// The timer service refused a one-shot delay.
    DelayRequest,
}

/// Coarse classification of a [`Fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Timer registration or channel open failed.
    Setup,
    /// The bus reported an error for an issued transfer.
    Transfer,
    /// The device answered with something a TC74 never sends.
    Protocol,
    /// A bad pause length or a delay the timer refused.
    Internal,
}

impl Fault {
    pub const fn kind(self) -> FaultKind {
        match self {
            Self::Setup(_) => FaultKind::Setup,
            Self::TransferRejected(_) | Self::NoDevice { .. } | Self::TransferFailed(_) => {
                FaultKind::Transfer
            }
            Self::UnexpectedDevice { .. } | Self::ContradictoryStatus { .. } => FaultKind::Protocol,
            Self::PauseTooShort { .. } | Self::DelayRequest => FaultKind::Internal,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(op) => write!(f, "{op} failed"),
            Self::TransferRejected(op) => write!(f, "driver rejected {op}"),
            Self::NoDevice { address } => {
                write!(f, "no device responded at 0x{address:02X}, check wiring")
            }
            Self::TransferFailed(op) => write!(f, "{op} transfer failed"),
            Self::UnexpectedDevice { status } => {
                write!(f, "status 0x{status:02X} has reserved bits set, not a TC74")
            }
            Self::ContradictoryStatus { status } => {
                write!(f, "contradictory status 0x{status:02X}")
            }
            Self::PauseTooShort { us } => write!(f, "internal error: pause of {us}us below minimum"),
            Self::DelayRequest => write!(f, "timer delay request failed"),
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Transfer => write!(f, "transfer"),
            Self::Protocol => write!(f, "protocol"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// A [`PollerConfig`](crate::config::PollerConfig) field failed validation.
/// The `&'static str` names the field and the violated bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigError(pub &'static str);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid config: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}
