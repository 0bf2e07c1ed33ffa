//! Digital I/O value types.
//!
//! `DigitalState` is the logical level of a digital endpoint, `PullResistance`
//! the input bias configuration, and `TimeUnit` the granularity accepted by
//! the timed pulse/blink protocols. `IoType` discriminates instance
//! categories in the registry and in board files.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::IoError;

// ─── IoType ─────────────────────────────────────────────────────────

/// I/O category discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoType {
    /// A digital output endpoint.
    Output,
    /// A digital input endpoint.
    Input,
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => write!(f, "digital output"),
            Self::Input => write!(f, "digital input"),
        }
    }
}

// ─── DigitalState ───────────────────────────────────────────────────

/// Logical level of a digital I/O endpoint.
///
/// Every instance starts in `Unknown` until its first configured or
/// commanded transition moves it into `High`/`Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitalState {
    /// Logic high.
    High,
    /// Logic low.
    Low,
    /// Level not yet established.
    Unknown,
}

impl DigitalState {
    /// The opposite operative level. `Unknown` has no inverse and maps
    /// to itself.
    pub fn inverse(self) -> Self {
        match self {
            Self::High => Self::Low,
            Self::Low => Self::High,
            Self::Unknown => Self::Unknown,
        }
    }

    /// True if the state is `High`.
    #[inline]
    pub fn is_high(self) -> bool {
        self == Self::High
    }

    /// True if the state is `Low`.
    #[inline]
    pub fn is_low(self) -> bool {
        self == Self::Low
    }
}

impl From<bool> for DigitalState {
    fn from(value: bool) -> Self {
        if value { Self::High } else { Self::Low }
    }
}

impl fmt::Display for DigitalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for DigitalState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("unknown DigitalState: {s:?}")),
        }
    }
}

// ─── PullResistance ─────────────────────────────────────────────────

/// Internal pull resistor setting for a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullResistance {
    /// No internal bias.
    #[default]
    Off,
    /// Bias the input towards `Low`.
    PullDown,
    /// Bias the input towards `High`.
    PullUp,
}

impl fmt::Display for PullResistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::PullDown => write!(f, "pull_down"),
            Self::PullUp => write!(f, "pull_up"),
        }
    }
}

// ─── TimeUnit ───────────────────────────────────────────────────────

/// Time granularity for the pulse/blink protocols.
///
/// Sub-millisecond and day-scale granularities are not supported by the
/// timed toggle protocols and are rejected at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Microseconds — rejected by `to_millis`.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days — rejected by `to_millis`.
    Days,
}

impl TimeUnit {
    /// Convert `value` of this unit into milliseconds.
    ///
    /// # Errors
    /// Returns `IoError::UnsupportedUnit` for `Microseconds` and `Days`.
    pub fn to_millis(self, value: u32) -> Result<u64, IoError> {
        match self {
            Self::Microseconds | Self::Days => Err(IoError::UnsupportedUnit(self)),
            Self::Milliseconds => Ok(u64::from(value)),
            Self::Seconds => Ok(u64::from(value) * 1_000),
            Self::Minutes => Ok(u64::from(value) * 60_000),
            Self::Hours => Ok(u64::from(value) * 3_600_000),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microseconds => write!(f, "microseconds"),
            Self::Milliseconds => write!(f, "milliseconds"),
            Self::Seconds => write!(f, "seconds"),
            Self::Minutes => write!(f, "minutes"),
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
        }
    }
}
