//! Host-side doubles shared by the unit tests.

extern crate std;

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use crate::buffer::{BulkReport, BulkSink};
use crate::endstop::SampleConsumer;
use crate::schedule::{Clock, Ticks};

/// Clock that advances by a fixed step on every read.
pub struct TestClock {
    now: Cell<Ticks>,
    step: Cell<Ticks>,
}

impl TestClock {
    pub fn new(start: Ticks) -> Self {
        Self {
            now: Cell::new(start),
            step: Cell::new(0),
        }
    }

    pub fn set(&self, now: Ticks) {
        self.now.set(now);
    }

    pub fn set_step(&self, step: Ticks) {
        self.step.set(step);
    }

    pub fn peek(&self) -> Ticks {
        self.now.get()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Ticks {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step.get()));
        now
    }
}

/// Owned copy of one bulk report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub oid: u8,
    pub sequence: u16,
    pub data: Vec<u8>,
    pub possible_overflows: u16,
}

impl Report {
    pub fn samples(&self) -> Vec<i32> {
        self.data
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}

/// Sink that records every report it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Vec<Report>,
}

impl BulkSink for RecordingSink {
    fn report(&mut self, report: BulkReport<'_>) {
        self.reports.push(Report {
            oid: report.oid,
            sequence: report.sequence,
            data: report.data.to_vec(),
            possible_overflows: report.possible_overflows,
        });
    }
}

/// Endstop double that records the samples pushed to it.
#[derive(Default)]
pub struct RecordingEndstop {
    pub samples: RefCell<Vec<(i32, Ticks)>>,
}

impl SampleConsumer for RecordingEndstop {
    fn report_sample(&self, counts: i32, clock: Ticks) {
        self.samples.borrow_mut().push((counts, clock));
    }
}
