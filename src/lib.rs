#![no_std]

#[macro_use]
mod log;

mod error;

pub mod buffer;
pub mod capture;
pub mod config;
pub mod decode;
pub mod endstop;
pub mod interface;
pub mod params;
pub mod ready;
pub mod registers;
pub mod schedule;
pub mod setup;

#[cfg(test)]
mod test_support;

pub use crate::buffer::{BulkReport, BulkSink, SampleBuffer};
pub use crate::capture::{CaptureTask, CycleOutcome, StatusReport};
pub use crate::config::{Config, ConfigError};
pub use crate::endstop::SampleConsumer;
pub use crate::error::{Error, Fault, Result};
pub use crate::interface::SampleTransfer;
pub use crate::params::{Chip, GainChannel, Hx71xModel, Severity};
pub use crate::schedule::{Clock, TaskTimers, TaskWake, Ticks};
pub use crate::setup::{Ads1256Setup, Hx71xSetup};
