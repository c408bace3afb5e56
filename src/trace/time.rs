//! Trace time: a single normalised tick unit plus the display scales.

use crate::error::TraceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the trace timeline, in picoseconds.
///
/// Every comparison in the crate happens on ticks; the file's [`TimeScale`]
/// only matters when values enter or leave a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Tick(u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    #[inline]
    pub fn new(ticks: u64) -> Self {
        Tick(ticks)
    }

    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ps", self.0)
    }
}

crate::btf_enum! {
    /// Unit in which a trace file reads and writes time values.
    pub enum TimeScale {
        Pico => "ps",
        Nano => "ns",
        Micro => "us",
        Milli => "ms",
        Seconds => "s",
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        TimeScale::Nano
    }
}

impl TimeScale {
    /// Ticks per unit of this scale.
    pub fn ticks_per_unit(self) -> u64 {
        match self {
            Self::Pico => 1,
            Self::Nano => 1_000,
            Self::Micro => 1_000_000,
            Self::Milli => 1_000_000_000,
            Self::Seconds => 1_000_000_000_000,
        }
    }

    /// Convert a value in this scale to ticks. `None` on overflow.
    pub fn to_ticks(self, value: u64) -> Option<Tick> {
        value.checked_mul(self.ticks_per_unit()).map(Tick)
    }

    /// Like [`TimeScale::to_ticks`], reporting overflow as an error.
    pub fn normalize(self, value: u64) -> Result<Tick, TraceError> {
        self.to_ticks(value)
            .ok_or(TraceError::TimeOverflow { value, scale: self })
    }

    /// Render `tick` in this scale, truncating sub-unit remainders.
    pub fn from_ticks(self, tick: Tick) -> u64 {
        tick.0 / self.ticks_per_unit()
    }
}
