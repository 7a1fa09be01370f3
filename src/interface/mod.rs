//! Transfer strategies used to clock a conversion out of the converter.

pub mod bitbang;
pub mod spi;

use crate::decode::RawSample;
use crate::params::Strategy;
use crate::schedule::{Clock, Ticks};

/// Result of one measured transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading {
    /// Raw word, MSB first.
    pub raw: RawSample,
    /// Tick captured immediately before the transfer started.
    pub start: Ticks,
    /// Measured duration of the transfer window.
    pub elapsed: Ticks,
    /// Readiness still asserted after the transfer (bit-bang only).
    pub ready_after_read: bool,
}

/// Abstraction over the readiness gate and data transfer of one converter.
pub trait SampleTransfer {
    /// Error type produced by the concrete bus or pins.
    type Error;

    /// Strategy implemented, checked against the configured chip.
    const STRATEGY: Strategy;

    /// Non-blocking check whether a conversion is available.
    fn is_ready(&mut self) -> core::result::Result<bool, Self::Error>;

    /// Clocks out one conversion and measures the transfer window.
    fn read_raw(&mut self, clock: &impl Clock) -> core::result::Result<RawReading, Self::Error>;

    /// Wakes the converter before capture starts.
    fn power_up(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    /// Puts the converter to sleep once capture stops.
    fn power_down(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}
