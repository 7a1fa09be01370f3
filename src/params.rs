//! Strongly typed parameter enumerations shared by the acquisition engine.
//!
//! These types capture the per-chip differences between the supported converters:
//! which transfer strategy reads them, how long a transfer may take, how anomalies
//! are escalated and which numeric code each recoverable anomaly is reported with.
//! Prefer these types over raw integers so that illegal selections are rejected
//! at configuration time.
//!
//! # Examples
//!
//! ```rust
//! use bulk_adc::params::{Chip, GainChannel, Severity, Strategy};
//!
//! assert_eq!(Chip::Hx71x.strategy(), Strategy::BitBang);
//! assert_eq!(Chip::Ads1256.default_severity(), Severity::Strict);
//! assert_eq!(GainChannel::try_from(3).unwrap().pulses(), 3);
//! ```

use modular_bitfield::prelude::Specifier;

use crate::config::ConfigError;

/// Supported converter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chip {
    /// TI ADS1220, read over SPI, gated by DRDY.
    Ads1220,
    /// TI ADS1256, read over SPI, gated by DRDY, optional endstop fanout.
    Ads1256,
    /// Avia HX711 / HX717, bit-banged over DOUT and SCLK.
    Hx71x,
}

impl Chip {
    /// Transfer strategy required to read this chip.
    pub const fn strategy(self) -> Strategy {
        match self {
            Self::Ads1220 | Self::Ads1256 => Strategy::Register,
            Self::Hx71x => Strategy::BitBang,
        }
    }

    /// Worst-case tolerable transfer duration in microseconds.
    pub const fn max_transfer_us(self) -> u32 {
        match self {
            Self::Ads1220 | Self::Ads1256 => 150,
            Self::Hx71x => 50,
        }
    }

    /// Escalation policy the chip ships with.
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::Ads1220 | Self::Hx71x => Severity::Recoverable,
            Self::Ads1256 => Severity::Strict,
        }
    }

    /// Whether the chip can feed a mechanical-endstop consumer.
    pub const fn accepts_endstop(self) -> bool {
        matches!(self, Self::Ads1256)
    }

    /// Numeric code reported in-band for a recoverable sample error.
    pub const fn error_code(self, error: SampleError) -> u8 {
        match (self, error) {
            (Self::Hx71x, SampleError::ReadyAfterRead) => 1,
            (Self::Hx71x, SampleError::ReadTooLong) => 2,
            (Self::Hx71x, SampleError::OutOfRange) => 3,
            (_, SampleError::ReadTooLong) => 1,
            (_, SampleError::OutOfRange) => 2,
            // Register chips never observe this condition.
            (_, SampleError::ReadyAfterRead) => 3,
        }
    }
}

/// How a sample is clocked out of the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Strategy {
    /// Fixed 3-byte transfer over a shared SPI bus.
    Register,
    /// 24 data pulses plus 1-4 gain/channel pulses on dedicated lines.
    BitBang,
}

/// Escalation policy applied to acquisition anomalies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    /// Anomalies become sentinel records in the sample stream.
    Recoverable,
    /// Anomalies halt the whole process; an all-ones read is also treated as a bad read.
    Strict,
}

/// Recoverable anomalies observed during one acquisition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleError {
    /// The measured transfer window met or exceeded the budget.
    ReadTooLong,
    /// The decoded value fell outside the legal 24-bit signed range.
    OutOfRange,
    /// DOUT still signalled "ready" after the full pulse train.
    ReadyAfterRead,
}

/// HX71x gain and input channel selection, encoded as trailing clock pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GainChannel {
    /// Channel A, gain 128 (HX711 and HX717).
    A128 = 1,
    /// Channel B, gain 32 on HX711 / gain 64 on HX717.
    B = 2,
    /// Channel A, gain 64 (HX711 and HX717).
    A64 = 3,
    /// Channel B, gain 8 (HX717 only).
    B8 = 4,
}

impl GainChannel {
    /// Number of clock pulses issued after the 24 data bits.
    pub const fn pulses(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for GainChannel {
    type Error = ConfigError;

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::A128),
            2 => Ok(Self::B),
            3 => Ok(Self::A64),
            4 => Ok(Self::B8),
            _ => Err(ConfigError::GainChannelOutOfRange),
        }
    }
}

/// ADS1256 programmable gain amplifier setting (`ADCON.PGA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 3]
pub enum Ads1256Gain {
    /// Gain 1.
    G1 = 0b000,
    /// Gain 2.
    G2 = 0b001,
    /// Gain 4.
    G4 = 0b010,
    /// Gain 8.
    G8 = 0b011,
    /// Gain 16.
    G16 = 0b100,
    /// Gain 32.
    G32 = 0b101,
    /// Gain 64.
    G64 = 0b110,
}

impl Default for Ads1256Gain {
    fn default() -> Self {
        Self::G64
    }
}

/// ADS1256 output data rate, valued with its `DRATE` register code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Ads1256DataRate {
    /// 2.5 samples per second.
    Sps2_5 = 0x03,
    /// 5 samples per second.
    Sps5 = 0x13,
    /// 10 samples per second.
    Sps10 = 0x23,
    /// 15 samples per second.
    Sps15 = 0x33,
    /// 25 samples per second.
    Sps25 = 0x43,
    /// 30 samples per second.
    Sps30 = 0x53,
    /// 50 samples per second.
    Sps50 = 0x63,
    /// 60 samples per second.
    Sps60 = 0x72,
    /// 100 samples per second.
    Sps100 = 0x82,
    /// 500 samples per second.
    Sps500 = 0x92,
    /// 1000 samples per second.
    Sps1000 = 0xA1,
    /// 2000 samples per second.
    #[default]
    Sps2000 = 0xB0,
    /// 3750 samples per second.
    Sps3750 = 0xC0,
    /// 7500 samples per second.
    Sps7500 = 0xD0,
    /// 15000 samples per second.
    Sps15000 = 0xE0,
    /// 30000 samples per second.
    Sps30000 = 0xF0,
}

impl Ads1256DataRate {
    /// Raw `DRATE` register value.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Output data rate in millihertz.
    pub const fn millihertz(self) -> u32 {
        match self {
            Self::Sps2_5 => 2_500,
            Self::Sps5 => 5_000,
            Self::Sps10 => 10_000,
            Self::Sps15 => 15_000,
            Self::Sps25 => 25_000,
            Self::Sps30 => 30_000,
            Self::Sps50 => 50_000,
            Self::Sps60 => 60_000,
            Self::Sps100 => 100_000,
            Self::Sps500 => 500_000,
            Self::Sps1000 => 1_000_000,
            Self::Sps2000 => 2_000_000,
            Self::Sps3750 => 3_750_000,
            Self::Sps7500 => 7_500_000,
            Self::Sps15000 => 15_000_000,
            Self::Sps30000 => 30_000_000,
        }
    }
}

/// Bit-banged converter variants sharing the HX71x protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hx71xModel {
    /// HX711: 10 or 80 sps, channel B fixed at gain 32.
    Hx711,
    /// HX717: 10 to 320 sps, channel B at gain 64 or 8.
    Hx717,
}

impl Hx71xModel {
    /// Sample rates selectable on the RATE pin, fastest first.
    pub const fn sample_rates(self) -> &'static [u16] {
        match self {
            Self::Hx711 => &[80, 10],
            Self::Hx717 => &[320, 80, 20, 10],
        }
    }

    /// Rate assumed when none is configured.
    pub const fn default_sample_rate(self) -> u16 {
        match self {
            Self::Hx711 => 80,
            Self::Hx717 => 320,
        }
    }

    /// Whether the model can run at `sps`.
    pub fn supports_sample_rate(self, sps: u16) -> bool {
        self.sample_rates().contains(&sps)
    }

    /// Whether the model accepts the gain/channel selection.
    pub const fn supports_gain(self, gain: GainChannel) -> bool {
        match self {
            Self::Hx711 => !matches!(gain, GainChannel::B8),
            Self::Hx717 => true,
        }
    }
}
