//! Collector growth knob

use std::fmt;
use std::str::FromStr;

use crate::error::GcError;

/// How far the heap may grow past the live set before the next cycle.
///
/// `Percent(100)` lets the heap double; `Off` disables automatic cycles
/// entirely, leaving only forced collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPercent {
    /// Automatic collection disabled
    Off,
    /// Growth allowed over the live heap, in percent
    Percent(u32),
}

impl GcPercent {
    /// Percentage used when nothing else is configured
    pub const DEFAULT: GcPercent = GcPercent::Percent(100);

    /// Next-cycle target for a given live heap size.
    ///
    /// Returns `usize::MAX` when automatic collection is off.
    pub fn target(self, live: usize, min_heap: usize) -> usize {
        match self {
            GcPercent::Off => usize::MAX,
            GcPercent::Percent(p) => {
                let growth = live.saturating_mul(p as usize) / 100;
                live.saturating_add(growth).max(min_heap)
            }
        }
    }

    /// Value as an integer, `-1` meaning off
    pub fn as_i64(self) -> i64 {
        match self {
            GcPercent::Off => -1,
            GcPercent::Percent(p) => p as i64,
        }
    }
}

impl Default for GcPercent {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i64> for GcPercent {
    fn from(value: i64) -> Self {
        if value < 0 {
            GcPercent::Off
        } else {
            GcPercent::Percent(value.min(u32::MAX as i64) as u32)
        }
    }
}

impl FromStr for GcPercent {
    type Err = GcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("off") {
            return Ok(GcPercent::Off);
        }
        trimmed
            .parse::<i64>()
            .map(GcPercent::from)
            .map_err(|_| GcError::InvalidPercent(s.to_string()))
    }
}

impl fmt::Display for GcPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcPercent::Off => f.write_str("off"),
            GcPercent::Percent(p) => write!(f, "{p}"),
        }
    }
}
