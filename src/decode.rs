//! 24-bit two's-complement sample decoding.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::error::Fault;
use crate::params::{SampleError, Severity};

/// Largest legal sample magnitude.
pub const MAX_COUNTS: i32 = 0x7F_FFFF;
/// Raw encoding of negative zero.
pub const RAW_NEGATIVE_ZERO: u32 = 0x80_0000;
/// Raw all-ones word, produced by a floating data line.
pub const RAW_ALL_ONES: u32 = 0xFF_FFFF;

/// Raw conversion word as clocked out of the converter, MSB first.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    // Magnitude bits 22..0.
    pub magnitude: B23,
    // Two's-complement sign (bit 23).
    pub sign: bool,
    // Bits beyond the 24-bit word; zero for any well-framed transfer.
    pub excess: B8,
}

impl RawSample {
    /// Assembles the word from three big-endian bytes.
    pub fn from_be_bytes(bytes: [u8; 3]) -> Self {
        Self::from(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }
}

impl From<u32> for RawSample {
    fn from(value: u32) -> Self {
        Self::from_bytes(value.to_le_bytes())
    }
}

impl From<RawSample> for u32 {
    fn from(value: RawSample) -> Self {
        u32::from_le_bytes(value.into_bytes())
    }
}

/// Why a raw word was not accepted as a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejection {
    /// Report in-band and keep sampling.
    Recoverable(SampleError),
    /// Halt the process.
    Fatal(Fault),
}

impl Rejection {
    /// Classifies a sample error under the given escalation policy.
    pub fn escalate(error: SampleError, severity: Severity) -> Self {
        match severity {
            Severity::Recoverable => Self::Recoverable(error),
            Severity::Strict => Self::Fatal(Fault::from(error)),
        }
    }
}

/// Sign-extends a raw word into a signed count.
///
/// Negative zero normalizes to `0`. Anything outside `[-MAX_COUNTS, MAX_COUNTS]`
/// is rejected; only words wider than 24 bits can land there.
pub fn decode(raw: RawSample) -> core::result::Result<i32, SampleError> {
    let value = u32::from(raw);
    let counts = if value == RAW_NEGATIVE_ZERO {
        0
    } else if raw.sign() && raw.excess() == 0 {
        (value | 0xFF00_0000) as i32
    } else {
        value as i32
    };

    if !(-MAX_COUNTS..=MAX_COUNTS).contains(&counts) {
        return Err(SampleError::OutOfRange);
    }

    Ok(counts)
}

/// Decodes a raw word and applies the escalation policy.
///
/// The strict policy additionally rejects an all-ones word as a bad read and
/// turns a range error into a fault.
pub fn validate(raw: RawSample, severity: Severity) -> core::result::Result<i32, Rejection> {
    if severity == Severity::Strict && u32::from(raw) == RAW_ALL_ONES {
        return Err(Rejection::Fatal(Fault::PossibleBadRead));
    }
    decode(raw).map_err(|error| Rejection::escalate(error, severity))
}
