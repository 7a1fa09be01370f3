//! Configuration primitives for an acquisition instance.

use crate::params::{Chip, Severity};
use crate::schedule::{ticks_from_us, Ticks};

/// Timer frequency assumed by [`Config::default()`], in ticks per second.
pub const DEFAULT_CLOCK_FREQ: u32 = 1_000_000;

/// Per-instance configuration, fixed once the instance is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Converter family wired to this instance.
    pub chip: Chip,
    /// Frequency of the free-running [`Clock`](crate::schedule::Clock), in ticks per second.
    pub clock_freq: u32,
    /// Transfer budget override in microseconds; the chip default applies when `None`.
    pub max_transfer_us: Option<u32>,
    /// Anomaly escalation policy.
    pub severity: Severity,
}

impl Config {
    /// Begins building a [`Config`] for the given chip.
    pub fn new(chip: Chip) -> ConfigBuilder {
        ConfigBuilder::new(chip)
    }

    /// Checks whether this configuration is usable.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.clock_freq == 0 {
            return Err(ConfigError::ZeroClockFrequency);
        }

        if self.max_transfer_ticks() == 0 {
            return Err(ConfigError::TransferBudgetTooSmall);
        }

        Ok(())
    }

    /// Transfer budget in microseconds, after applying any override.
    pub fn max_transfer_us(&self) -> u32 {
        self.max_transfer_us
            .unwrap_or_else(|| self.chip.max_transfer_us())
    }

    /// Transfer budget converted to clock ticks.
    pub fn max_transfer_ticks(&self) -> Ticks {
        ticks_from_us(self.clock_freq, self.max_transfer_us())
    }
}

/// Builder for [`Config`] allowing piecemeal construction.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new builder seeded with the chip defaults.
    pub fn new(chip: Chip) -> Self {
        Self {
            config: Config {
                chip,
                severity: chip.default_severity(),
                ..Config::default()
            },
        }
    }

    /// Sets the timer frequency in ticks per second.
    pub fn clock_freq(mut self, hz: u32) -> Self {
        self.config.clock_freq = hz;
        self
    }

    /// Overrides the transfer budget in microseconds.
    pub fn max_transfer_us(mut self, us: u32) -> Self {
        self.config.max_transfer_us = Some(us);
        self
    }

    /// Overrides the escalation policy.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.config.severity = severity;
        self
    }

    /// Finalizes the builder and returns the [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chip: Chip::Ads1220,
            clock_freq: DEFAULT_CLOCK_FREQ,
            max_transfer_us: None,
            severity: Chip::Ads1220.default_severity(),
        }
    }
}

/// Validation errors generated while configuring an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The clock frequency is zero.
    ZeroClockFrequency,
    /// The transfer budget rounds down to zero ticks.
    TransferBudgetTooSmall,
    /// The HX71x gain/channel selector is outside 1-4.
    GainChannelOutOfRange,
    /// The transfer strategy does not match the chip.
    StrategyMismatch,
    /// The chip cannot feed an endstop consumer.
    ConsumerNotSupported,
    /// The instance table has no free slot.
    TableFull,
    /// An instance with the same handle already exists.
    DuplicateHandle,
    /// The converter model cannot run at the requested sample rate.
    SampleRateNotSupported,
    /// The converter model does not offer the requested gain/channel.
    GainNotSupported,
    /// The polling duty cycle is outside 10-100% of a sample period.
    DutyCycleOutOfRange,
}

impl ConfigError {
    /// Shutdown message reported to the host.
    pub const fn message(self) -> &'static str {
        match self {
            Self::ZeroClockFrequency => "clock frequency must be non-zero",
            Self::TransferBudgetTooSmall => "transfer budget shorter than one tick",
            Self::GainChannelOutOfRange => "HX71x gain/channel out of range 1-4",
            Self::StrategyMismatch => "transfer strategy does not match chip",
            Self::ConsumerNotSupported => "chip does not support an endstop",
            Self::TableFull => "no free ADC instance slot",
            Self::DuplicateHandle => "ADC instance already configured",
            Self::SampleRateNotSupported => "sample rate not supported by converter",
            Self::GainNotSupported => "gain/channel not supported by converter",
            Self::DutyCycleOutOfRange => "duty cycle out of range 0.1-1.0",
        }
    }
}
