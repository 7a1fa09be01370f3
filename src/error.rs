//! Error handling primitives for the acquisition engine.

use crate::config::ConfigError;
use crate::params::SampleError;

/// Crate-wide result type alias.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error variants produced by the engine.
///
/// Every variant is fatal: recoverable anomalies never leave the instance and are
/// written into its sample stream instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Any error reported by the underlying bus or pins.
    Interface(E),
    /// The provided configuration parameters are invalid.
    InvalidConfig(ConfigError),
    /// The acquisition protocol is desynchronized and the process must halt.
    Shutdown(Fault),
    /// No instance is registered under the given handle.
    UnknownInstance(u8),
    /// A register read back a different value than was written.
    RegisterMismatch {
        /// Address of the first mismatching register.
        register: u8,
        /// Value written.
        expected: u8,
        /// Value read back.
        actual: u8,
    },
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Interface(err)
    }
}

/// Unrecoverable acquisition faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// A transfer exceeded its budget under the strict policy.
    ReadTooLong,
    /// The converter returned all ones, the signature of a floating bus.
    PossibleBadRead,
    /// The decoded value fell outside the legal 24-bit signed range.
    InvalidCounts,
    /// DOUT stayed low after the pulse train under the strict policy.
    ReadyAfterRead,
    /// A configuration request was rejected.
    Config(ConfigError),
    /// The bus or a pin reported an error.
    Interface,
    /// A request named a handle that was never configured.
    UnknownInstance(u8),
    /// Register write verification failed at the given address.
    RegisterMismatch(u8),
}

impl From<SampleError> for Fault {
    fn from(error: SampleError) -> Self {
        match error {
            SampleError::ReadTooLong => Self::ReadTooLong,
            SampleError::OutOfRange => Self::InvalidCounts,
            SampleError::ReadyAfterRead => Self::ReadyAfterRead,
        }
    }
}

impl<E> From<&Error<E>> for Fault {
    fn from(error: &Error<E>) -> Self {
        match *error {
            Error::Interface(_) => Self::Interface,
            Error::InvalidConfig(config) => Self::Config(config),
            Error::Shutdown(fault) => fault,
            Error::UnknownInstance(oid) => Self::UnknownInstance(oid),
            Error::RegisterMismatch { register, .. } => Self::RegisterMismatch(register),
        }
    }
}

impl Fault {
    /// Shutdown message reported to the host.
    pub const fn message(self) -> &'static str {
        match self {
            Self::ReadTooLong => "ADC read timing error, read took too long",
            Self::PossibleBadRead => "ADC possible bad read",
            Self::InvalidCounts => "ADC invalid counts",
            Self::ReadyAfterRead => "ADC data ready after read, clock desynchronized",
            Self::Config(error) => error.message(),
            Self::Interface => "ADC bus or pin error",
            Self::UnknownInstance(_) => "ADC handle not configured",
            Self::RegisterMismatch(_) => "ADC register write not retained, check wiring",
        }
    }
}
