//! Periodic capture task driving every configured ADC instance.
//!
//! One [`CaptureTask`] serves one converter family. Its instances are bound to the
//! timers of one [`TaskTimers`] bank, which the timer interrupt reaches through a
//! shared reference; each instance owns its transfer and sample buffer. A cycle
//! runs as follows:
//!
//! 1. The instance timer expires ([`TaskTimers::timer_event`] or
//!    [`TaskTimers::dispatch`]), marking the instance pending and waking the task.
//! 2. [`CaptureTask::run`] services every pending instance in table order.
//! 3. If the converter has no sample yet, the timer is simply re-armed.
//! 4. Otherwise the transfer is measured, decoded and validated. Valid samples are
//!    fanned out to an attached endstop and buffered; recoverable anomalies become a
//!    sentinel record plus error code; fatal anomalies halt the task.
//! 5. The timer is re-armed for `now + rest_ticks`.
//!
//! Any fatal error latches: every later request returns [`Error::Shutdown`] and no
//! timer fires again.
//!
//! ```rust,ignore
//! static TIMERS: TaskTimers<4> = TaskTimers::new();
//!
//! // timer interrupt
//! TIMERS.dispatch(timer.now());
//!
//! // main loop, task created once with `CaptureTask::new(timer, &TIMERS)`
//! task.run(&mut host_link)?;
//! ```

use heapless::Vec;

use crate::buffer::{BulkSink, SampleBuffer, BYTES_PER_SAMPLE, DEFAULT_SLOTS, SAMPLE_ERROR};
use crate::config::{Config, ConfigError};
use crate::decode::{validate, Rejection};
use crate::endstop::{NoEndstop, SampleConsumer};
use crate::error::{Error, Fault, Result};
use crate::interface::{RawReading, SampleTransfer};
use crate::params::SampleError;
use crate::schedule::{ticks_elapsed, Clock, CycleState, CycleTimer, TaskTimers, TaskWake, Ticks};

/// Default number of instances per capture task.
pub const DEFAULT_MAX_INSTANCES: usize = 4;

/// What one serviced cycle produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// The instance is stopped; nothing was read.
    Idle,
    /// No sample was available; the timer was re-armed.
    Deferred,
    /// A validated sample was buffered.
    Sample(i32),
    /// An error record was written to the stream.
    Error(SampleError),
}

/// Answer to a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusReport {
    /// Tick captured at the start of the query.
    pub clock: Ticks,
    /// Duration of the measurement window.
    pub query_ticks: Ticks,
    /// Sequence number of the next bulk report.
    pub next_sequence: u16,
    /// Unflushed bytes plus the bytes of a sample waiting in the converter.
    pub buffered: u32,
    /// Overflow counter or last error code.
    pub possible_overflows: u16,
}

/// State of one configured converter.
pub struct AdcInstance<'a, T, L = NoEndstop, const SLOTS: usize = DEFAULT_SLOTS> {
    oid: u8,
    config: Config,
    max_transfer_ticks: Ticks,
    transfer: T,
    timer: &'a CycleTimer,
    buffer: SampleBuffer<SLOTS>,
    endstop: Option<L>,
}

impl<T, L, const SLOTS: usize> AdcInstance<'_, T, L, SLOTS> {
    /// Handle the instance was configured under.
    pub fn oid(&self) -> u8 {
        self.oid
    }

    /// Immutable configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current scheduling state.
    pub fn state(&self) -> CycleState {
        self.timer.state()
    }

    /// Interval between cycle starts; zero when stopped.
    pub fn rest_ticks(&self) -> Ticks {
        self.timer.rest_ticks()
    }

    /// Tick at which the armed timer expires.
    pub fn waketime(&self) -> Option<Ticks> {
        self.timer.waketime()
    }

    /// Unflushed samples.
    pub fn buffer(&self) -> &SampleBuffer<SLOTS> {
        &self.buffer
    }

    /// Whether an endstop consumer is attached.
    pub fn has_endstop(&self) -> bool {
        self.endstop.is_some()
    }
}

impl<T, L, const SLOTS: usize> AdcInstance<'_, T, L, SLOTS>
where
    T: SampleTransfer,
    L: SampleConsumer,
{
    fn read_adc(
        &mut self,
        clock: &impl Clock,
        sink: &mut impl BulkSink,
    ) -> Result<CycleOutcome, T::Error> {
        self.timer.complete();
        if self.timer.rest_ticks() == 0 {
            return Ok(CycleOutcome::Idle);
        }

        if !self.transfer.is_ready()? {
            trace!("adc {}: not ready", self.oid);
            self.timer.reschedule(clock);
            return Ok(CycleOutcome::Deferred);
        }

        let reading = self.transfer.read_raw(clock)?;
        let outcome = match self.classify(&reading) {
            Ok(counts) => {
                if let Some(endstop) = &self.endstop {
                    endstop.report_sample(counts, reading.start);
                }
                self.buffer.push(self.oid, counts as u32, sink);
                self.buffer.flush_if_full(self.oid, sink);
                CycleOutcome::Sample(counts)
            }
            Err(Rejection::Recoverable(error)) => {
                self.send_error(error, sink);
                CycleOutcome::Error(error)
            }
            Err(Rejection::Fatal(fault)) => return Err(Error::Shutdown(fault)),
        };

        self.timer.reschedule(clock);
        Ok(outcome)
    }

    fn classify(&self, reading: &RawReading) -> core::result::Result<i32, Rejection> {
        let severity = self.config.severity;
        if reading.ready_after_read {
            return Err(Rejection::escalate(SampleError::ReadyAfterRead, severity));
        }
        if reading.elapsed >= self.max_transfer_ticks {
            // Some interrupt stretched the transfer; the word may be torn.
            return Err(Rejection::escalate(SampleError::ReadTooLong, severity));
        }
        validate(reading.raw, severity)
    }

    fn send_error(&mut self, error: SampleError, sink: &mut impl BulkSink) {
        let code = self.config.chip.error_code(error);
        warn!("adc {}: sample error {} (code {})", self.oid, error, code);
        self.buffer.push(self.oid, SAMPLE_ERROR, sink);
        self.buffer.set_error_code(code);
        self.buffer.flush(self.oid, sink);
    }
}

/// Cooperative task that owns and services every instance of one converter family.
///
/// `N` bounds the instance table and must match the [`TaskTimers`] bank; `SLOTS`
/// is the per-instance buffer capacity in records.
pub struct CaptureTask<
    'a,
    T,
    C,
    L = NoEndstop,
    const N: usize = DEFAULT_MAX_INSTANCES,
    const SLOTS: usize = DEFAULT_SLOTS,
> {
    clock: C,
    timers: &'a TaskTimers<N>,
    instances: Vec<AdcInstance<'a, T, L, SLOTS>, N>,
}

impl<'a, T, C, L, const N: usize, const SLOTS: usize> CaptureTask<'a, T, C, L, N, SLOTS> {
    // ==================================================================
    // == Construction & Introspection ==================================
    // ==================================================================
    /// Creates an empty task reading time from `clock` and arming `timers`.
    pub const fn new(clock: C, timers: &'a TaskTimers<N>) -> Self {
        Self {
            clock,
            timers,
            instances: Vec::new(),
        }
    }

    /// Wake signal shared by this task's timers.
    pub fn wake(&self) -> &TaskWake {
        self.timers.wake()
    }

    /// Timer bank driven by the timer interrupt.
    pub fn timers(&self) -> &'a TaskTimers<N> {
        self.timers
    }

    /// Clock used for timestamps and timer arming.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Looks up an instance by handle.
    pub fn instance(&self, oid: u8) -> Option<&AdcInstance<'a, T, L, SLOTS>> {
        self.instances.iter().find(|instance| instance.oid == oid)
    }

    /// Iterates configured instances in service order.
    pub fn instances(&self) -> impl Iterator<Item = &AdcInstance<'a, T, L, SLOTS>> {
        self.instances.iter()
    }

    /// Fault that halted the task, if any.
    pub fn halted(&self) -> Option<Fault> {
        self.timers.halted()
    }

    // ==================================================================
    // == Timer Interrupt Path ==========================================
    // ==================================================================
    /// Timer-interrupt entry for one instance; see [`TaskTimers::timer_event`].
    pub fn timer_event(&self, oid: u8) -> bool {
        self.timers.timer_event(oid)
    }

    /// Fires every due timer; see [`TaskTimers::dispatch`].
    pub fn dispatch_timers(&self, now: Ticks) -> usize {
        self.timers.dispatch(now)
    }

    // ==================================================================
    // == Fault Latch ===================================================
    // ==================================================================
    fn halt<E>(&self, error: Error<E>) -> Error<E> {
        let fault = self.timers.halt(Fault::from(&error));
        error!("adc shutdown: {}", fault.message());
        error
    }
}

impl<'a, T, C, L, const N: usize, const SLOTS: usize> CaptureTask<'a, T, C, L, N, SLOTS>
where
    T: SampleTransfer,
    C: Clock,
    L: SampleConsumer,
{
    // ==================================================================
    // == Host Requests =================================================
    // ==================================================================
    /// Creates an instance under `oid` with an immutable configuration.
    ///
    /// Any rejection halts the task; no partially configured instance remains.
    /// The converter is left powered down until capture starts.
    pub fn configure(&mut self, oid: u8, config: Config, transfer: T) -> Result<(), T::Error> {
        self.ensure_running()?;

        if let Err(error) = self.check_config(oid, &config) {
            return Err(self.halt(Error::InvalidConfig(error)));
        }
        let timers: &'a TaskTimers<N> = self.timers;
        let Some(timer) = timers.slot(self.instances.len()) else {
            return Err(self.halt(Error::InvalidConfig(ConfigError::TableFull)));
        };

        let mut instance = AdcInstance {
            oid,
            config,
            max_transfer_ticks: config.max_transfer_ticks(),
            transfer,
            timer,
            buffer: SampleBuffer::new(),
            endstop: None,
        };
        if let Err(error) = instance.transfer.power_down() {
            return Err(self.halt(Error::Interface(error)));
        }
        if self.instances.push(instance).is_err() {
            return Err(self.halt(Error::InvalidConfig(ConfigError::TableFull)));
        }
        timer.bind(oid);

        debug!("adc {}: configured {}", oid, config.chip);
        Ok(())
    }

    /// Binds an endstop consumer to an instance whose chip supports one.
    pub fn attach_endstop(&mut self, oid: u8, endstop: L) -> Result<(), T::Error> {
        self.ensure_running()?;
        let index = self.index_of(oid)?;

        let instance = &mut self.instances[index];
        if !instance.config.chip.accepts_endstop() {
            return Err(self.halt(Error::InvalidConfig(ConfigError::ConsumerNotSupported)));
        }
        instance.endstop = Some(endstop);

        debug!("adc {}: endstop attached", oid);
        Ok(())
    }

    /// Starts capture every `rest_ticks`, or stops it when `rest_ticks == 0`.
    ///
    /// Either way the timer is cancelled, the pending cycle dropped and the
    /// buffer, sequence and error state cleared.
    pub fn start_stop(&mut self, oid: u8, rest_ticks: Ticks) -> Result<(), T::Error> {
        self.ensure_running()?;
        let index = self.index_of(oid)?;

        let Self { clock, instances, .. } = self;
        let instance = &mut instances[index];
        instance.timer.reset(rest_ticks);
        instance.buffer.reset();

        let powered = if rest_ticks == 0 {
            instance.transfer.power_down()
        } else {
            instance.transfer.power_up()
        };
        if let Err(error) = powered {
            return Err(self.halt(Error::Interface(error)));
        }

        if rest_ticks == 0 {
            debug!("adc {}: stopped", oid);
        } else {
            instance.timer.reschedule(&*clock);
            debug!("adc {}: started, rest_ticks {}", oid, rest_ticks);
        }
        Ok(())
    }

    /// Captures a timestamp and the readiness line in one masked window.
    pub fn query_status(&mut self, oid: u8) -> Result<StatusReport, T::Error> {
        self.ensure_running()?;
        let index = self.index_of(oid)?;

        let Self { clock, instances, .. } = self;
        let instance = &mut instances[index];
        let (start, ready, end) = critical_section::with(|_| {
            let start = clock.now();
            let ready = instance.transfer.is_ready();
            (start, ready, clock.now())
        });
        let ready = match ready {
            Ok(ready) => ready,
            Err(error) => return Err(self.halt(Error::Interface(error))),
        };

        let pending_bytes = if ready { BYTES_PER_SAMPLE } else { 0 };
        let buffer = &self.instances[index].buffer;
        Ok(StatusReport {
            clock: start,
            query_ticks: ticks_elapsed(start, end),
            next_sequence: buffer.sequence(),
            buffered: (buffer.data_count() + pending_bytes) as u32,
            possible_overflows: buffer.possible_overflows(),
        })
    }

    // ==================================================================
    // == Internal Helpers ==============================================
    // ==================================================================
    fn ensure_running(&self) -> Result<(), T::Error> {
        match self.timers.halted() {
            Some(fault) => Err(Error::Shutdown(fault)),
            None => Ok(()),
        }
    }

    fn index_of(&self, oid: u8) -> Result<usize, T::Error> {
        match self.instances.iter().position(|instance| instance.oid == oid) {
            Some(index) => Ok(index),
            None => Err(self.halt(Error::UnknownInstance(oid))),
        }
    }

    fn check_config(&self, oid: u8, config: &Config) -> core::result::Result<(), ConfigError> {
        config.validate()?;
        if config.chip.strategy() != T::STRATEGY {
            return Err(ConfigError::StrategyMismatch);
        }
        if self.instance(oid).is_some() {
            return Err(ConfigError::DuplicateHandle);
        }
        if self.instances.is_full() {
            return Err(ConfigError::TableFull);
        }
        Ok(())
    }

    // ==================================================================
    // == Task Body =====================================================
    // ==================================================================
    /// Services every pending instance if the task was woken.
    ///
    /// Returns the number of instances serviced. A fatal error stops the pass
    /// immediately and latches the halt.
    pub fn run(&mut self, sink: &mut impl BulkSink) -> Result<usize, T::Error> {
        self.ensure_running()?;
        if !self.timers.wake().check_wake() {
            return Ok(0);
        }

        let mut serviced = 0;
        for index in 0..self.instances.len() {
            if self.instances[index].timer.is_pending() {
                self.service_at(index, sink)?;
                serviced += 1;
            }
        }
        Ok(serviced)
    }

    /// Runs one acquisition cycle for a started instance immediately, pending or not.
    ///
    /// A stopped instance reports [`CycleOutcome::Idle`] without touching the bus.
    pub fn service(
        &mut self,
        oid: u8,
        sink: &mut impl BulkSink,
    ) -> Result<CycleOutcome, T::Error> {
        self.ensure_running()?;
        let index = self.index_of(oid)?;
        self.service_at(index, sink)
    }

    fn service_at(
        &mut self,
        index: usize,
        sink: &mut impl BulkSink,
    ) -> Result<CycleOutcome, T::Error> {
        let Self { clock, instances, .. } = self;
        let outcome = instances[index].read_adc(&*clock, sink);
        outcome.map_err(|error| self.halt(error))
    }
}
