//! Timer and task-wake primitives for the cooperative capture task.
//!
//! Each instance is bound to one software timer in a [`TaskTimers`] bank. When it
//! expires the timer-interrupt path marks the instance pending and wakes the shared
//! capture task; the task later services every pending instance and re-arms its
//! timer. Timestamps are raw wrapping ticks of a free-running counter.
#![allow(unused_parens)]

use core::cell::Cell;

use critical_section::Mutex;
use modular_bitfield::prelude::*;

use crate::error::Fault;

/// Raw timer ticks.
pub type Ticks = u32;

/// Free-running monotonic tick counter.
pub trait Clock {
    /// Returns the current counter value. Wraps on overflow.
    fn now(&self) -> Ticks;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Ticks {
        (**self).now()
    }
}

/// Ticks elapsed between two counter readings, tolerant of wrap-around.
#[inline]
pub const fn ticks_elapsed(start: Ticks, end: Ticks) -> Ticks {
    end.wrapping_sub(start)
}

/// Returns `true` when `a` lies strictly before `b` on the wrapping timeline.
#[inline]
pub const fn is_before(a: Ticks, b: Ticks) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// Converts microseconds into ticks of a clock running at `hz`.
pub const fn ticks_from_us(hz: u32, us: u32) -> Ticks {
    ((hz as u64 * us as u64) / 1_000_000) as Ticks
}

/// Wake signal shared by every instance of one capture task.
///
/// Setting it is additive: any number of timers may wake the task before it runs.
/// Safe to place in a `static` and to signal from interrupt context.
pub struct TaskWake {
    woken: Mutex<Cell<bool>>,
}

impl TaskWake {
    /// Creates a cleared wake signal.
    pub const fn new() -> Self {
        Self {
            woken: Mutex::new(Cell::new(false)),
        }
    }

    /// Requests that the task run.
    pub fn wake(&self) {
        critical_section::with(|cs| self.woken.borrow(cs).set(true));
    }

    /// Consumes a pending wake request, returning whether one was set.
    pub fn check_wake(&self) -> bool {
        critical_section::with(|cs| self.woken.borrow(cs).replace(false))
    }

    /// Peeks at the wake request without consuming it.
    pub fn is_woken(&self) -> bool {
        critical_section::with(|cs| self.woken.borrow(cs).get())
    }
}

impl Default for TaskWake {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance scheduling flags.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleFlags {
    // Timer fired and the cycle awaits the task (bit 0).
    pub pending: bool,
    // Timer queued with a waketime (bit 1).
    pub armed: bool,
    #[skip]
    __: B6,
}

impl From<u8> for CycleFlags {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<CycleFlags> for u8 {
    fn from(value: CycleFlags) -> Self {
        value.into_bytes()[0]
    }
}

/// Observable scheduling state of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleState {
    /// `rest_ticks == 0`; no timer armed.
    Stopped,
    /// Timer queued, waiting to expire.
    Armed,
    /// Timer fired; the task has not serviced the cycle yet.
    Servicing,
}

// Snapshot of one timer, swapped in and out of its cell as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerSlot {
    owner: Option<u8>,
    rest_ticks: Ticks,
    waketime: Ticks,
    flags: u8,
}

impl TimerSlot {
    const IDLE: Self = Self {
        owner: None,
        rest_ticks: 0,
        waketime: 0,
        flags: 0,
    };

    fn flags(&self) -> CycleFlags {
        CycleFlags::from(self.flags)
    }

    fn set_flags(&mut self, flags: CycleFlags) {
        self.flags = u8::from(flags);
    }
}

/// Software timer re-armed at a fixed interval.
///
/// All state sits behind a critical-section mutex, so the timer interrupt and the
/// capture task drive it through shared references.
pub struct CycleTimer {
    slot: Mutex<Cell<TimerSlot>>,
}

impl CycleTimer {
    /// Creates an unbound, stopped timer.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(TimerSlot::IDLE)),
        }
    }

    fn load(&self) -> TimerSlot {
        critical_section::with(|cs| self.slot.borrow(cs).get())
    }

    fn update<R>(&self, f: impl FnOnce(&mut TimerSlot) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let mut slot = cell.get();
            let result = f(&mut slot);
            cell.set(slot);
            result
        })
    }

    /// Handle of the instance this timer belongs to.
    pub fn owner(&self) -> Option<u8> {
        self.load().owner
    }

    /// Assigns the timer to an instance and leaves it stopped.
    pub fn bind(&self, oid: u8) {
        self.update(|slot| {
            *slot = TimerSlot {
                owner: Some(oid),
                ..TimerSlot::IDLE
            }
        });
    }

    /// Interval between cycle starts; zero means stopped.
    pub fn rest_ticks(&self) -> Ticks {
        self.load().rest_ticks
    }

    /// Tick at which the armed timer expires.
    pub fn waketime(&self) -> Option<Ticks> {
        let slot = self.load();
        slot.flags().armed().then_some(slot.waketime)
    }

    /// Whether the timer fired and the cycle still awaits service.
    pub fn is_pending(&self) -> bool {
        self.load().flags().pending()
    }

    /// Current scheduling state.
    pub fn state(&self) -> CycleState {
        let flags = self.load().flags();
        if flags.pending() {
            CycleState::Servicing
        } else if flags.armed() {
            CycleState::Armed
        } else {
            CycleState::Stopped
        }
    }

    /// Cancels the timer and any pending cycle, then stores a new interval.
    pub fn reset(&self, rest_ticks: Ticks) {
        self.update(|slot| {
            slot.set_flags(CycleFlags::new());
            slot.rest_ticks = rest_ticks;
        });
    }

    /// Queues the next expiry at `now + rest_ticks`.
    ///
    /// The timestamp read and the queue update happen in one masked window. A
    /// stopped timer stays stopped.
    pub fn reschedule(&self, clock: &impl Clock) {
        self.update(|slot| {
            if slot.rest_ticks == 0 {
                return;
            }
            slot.waketime = clock.now().wrapping_add(slot.rest_ticks);
            slot.set_flags(slot.flags().with_armed(true));
        });
    }

    /// Timer-interrupt body: marks an armed cycle pending and wakes the task.
    ///
    /// Returns `false` without side effects when the timer is not armed.
    pub fn fire(&self, wake: &TaskWake) -> bool {
        self.fire_when(wake, |_| true)
    }

    /// Fires the timer if it is armed and `now` has reached its waketime.
    pub fn fire_if_due(&self, now: Ticks, wake: &TaskWake) -> bool {
        self.fire_when(wake, |waketime| !is_before(now, waketime))
    }

    fn fire_when(&self, wake: &TaskWake, due: impl FnOnce(Ticks) -> bool) -> bool {
        let fired = self.update(|slot| {
            let flags = slot.flags();
            if !flags.armed() || !due(slot.waketime) {
                return false;
            }
            slot.set_flags(flags.with_armed(false).with_pending(true));
            true
        });
        if fired {
            wake.wake();
        }
        fired
    }

    /// Marks the current cycle as serviced.
    pub fn complete(&self) {
        self.update(|slot| slot.set_flags(slot.flags().with_pending(false)));
    }
}

impl Default for CycleTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt-side state of one capture task: its timers, wake signal and halt latch.
///
/// Lives outside the task, typically in a `static`, so the timer interrupt can
/// reach it while the task body holds `&mut` on the task itself.
pub struct TaskTimers<const N: usize> {
    wake: TaskWake,
    halted: Mutex<Cell<Option<Fault>>>,
    timers: [CycleTimer; N],
}

impl<const N: usize> TaskTimers<N> {
    /// Creates `N` unbound timers and a cleared wake signal.
    pub const fn new() -> Self {
        Self {
            wake: TaskWake::new(),
            halted: Mutex::new(Cell::new(None)),
            timers: [const { CycleTimer::new() }; N],
        }
    }

    /// Wake signal shared by every timer of the task.
    pub fn wake(&self) -> &TaskWake {
        &self.wake
    }

    /// Timer stored in slot `index`.
    pub fn slot(&self, index: usize) -> Option<&CycleTimer> {
        self.timers.get(index)
    }

    /// Fault that halted the task, if any.
    pub fn halted(&self) -> Option<Fault> {
        critical_section::with(|cs| self.halted.borrow(cs).get())
    }

    /// Latches a fault. The first fault wins.
    pub fn halt(&self, fault: Fault) -> Fault {
        critical_section::with(|cs| {
            let cell = self.halted.borrow(cs);
            let latched = cell.get().unwrap_or(fault);
            cell.set(Some(latched));
            latched
        })
    }

    /// Timer-interrupt entry for one instance: fires its timer if armed.
    ///
    /// Returns `false` for unknown handles, stopped instances and halted tasks.
    pub fn timer_event(&self, oid: u8) -> bool {
        if self.halted().is_some() {
            return false;
        }
        self.timers
            .iter()
            .find(|timer| timer.owner() == Some(oid))
            .is_some_and(|timer| timer.fire(&self.wake))
    }

    /// Fires every armed timer whose waketime is not after `now`.
    ///
    /// Returns the number of timers fired. A halted task fires nothing.
    pub fn dispatch(&self, now: Ticks) -> usize {
        if self.halted().is_some() {
            return 0;
        }
        self.timers
            .iter()
            .filter(|timer| timer.fire_if_due(now, &self.wake))
            .count()
    }
}

impl<const N: usize> Default for TaskTimers<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a sample rate into the polling interval for a clock running at `hz`.
///
/// The interval is `duty_permille / 1000` of one sample period, so the readiness
/// line is polled slightly faster than the converter produces data.
pub const fn rest_ticks_for_rate(hz: u32, rate_millihertz: u32, duty_permille: u16) -> Ticks {
    if rate_millihertz == 0 {
        return 0;
    }
    ((hz as u64 * duty_permille as u64) / rate_millihertz as u64) as Ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestClock;

    #[test]
    fn wrapping_helpers_survive_overflow() {
        assert_eq!(ticks_elapsed(0xFFFF_FFF0, 0x10), 0x20);
        assert!(is_before(0xFFFF_FFF0, 0x10));
        assert!(!is_before(0x10, 0xFFFF_FFF0));
        assert!(!is_before(5, 5));
        assert_eq!(ticks_from_us(1_000_000, 150), 150);
        assert_eq!(ticks_from_us(16_000_000, 50), 800);
    }

    #[test]
    fn task_wake_is_consumed_once() {
        let wake = TaskWake::new();
        assert!(!wake.check_wake());
        wake.wake();
        wake.wake();
        assert!(wake.is_woken());
        assert!(wake.check_wake());
        assert!(!wake.check_wake());
    }

    #[test]
    fn timer_walks_stopped_armed_servicing() {
        let clock = TestClock::new(100);
        let wake = TaskWake::new();
        let timer = CycleTimer::new();
        assert_eq!(timer.state(), CycleState::Stopped);

        timer.reschedule(&clock);
        assert_eq!(timer.state(), CycleState::Stopped, "stopped timers never arm");

        timer.reset(1_000);
        timer.reschedule(&clock);
        assert_eq!(timer.state(), CycleState::Armed);
        assert_eq!(timer.waketime(), Some(1_100));

        assert!(!timer.fire_if_due(1_099, &wake));
        assert!(timer.fire_if_due(1_100, &wake));
        assert_eq!(timer.state(), CycleState::Servicing);
        assert!(wake.check_wake());

        timer.complete();
        timer.reschedule(&clock);
        assert_eq!(timer.state(), CycleState::Armed);

        timer.reset(0);
        assert_eq!(timer.state(), CycleState::Stopped);
        assert_eq!(timer.waketime(), None);
    }

    #[test]
    fn stopped_timer_ignores_interrupts() {
        let wake = TaskWake::new();
        let timer = CycleTimer::new();
        timer.bind(3);

        assert!(!timer.fire(&wake));
        assert_eq!(timer.state(), CycleState::Stopped);
        assert!(!wake.is_woken());

        timer.reset(0);
        assert!(!timer.fire_if_due(u32::MAX / 2, &wake));
        assert!(!wake.is_woken());
    }

    #[test]
    fn timers_fire_through_a_shared_static() {
        static TIMERS: TaskTimers<2> = TaskTimers::new();
        let clock = TestClock::new(0);

        let first = TIMERS.slot(0).unwrap();
        first.bind(7);
        first.reset(50);
        first.reschedule(&clock);
        TIMERS.slot(1).unwrap().bind(8);

        assert!(!TIMERS.timer_event(8), "never started");
        assert!(!TIMERS.timer_event(9), "unknown handle");
        assert!(TIMERS.timer_event(7));
        assert!(!TIMERS.timer_event(7), "already fired");
        assert!(TIMERS.wake().check_wake());
        assert!(first.is_pending());

        first.complete();
        first.reschedule(&clock);
        assert_eq!(TIMERS.halt(Fault::ReadTooLong), Fault::ReadTooLong);
        assert_eq!(TIMERS.halt(Fault::Interface), Fault::ReadTooLong);
        assert_eq!(TIMERS.dispatch(1_000), 0);
        assert!(!TIMERS.timer_event(7));
    }

    #[test]
    fn rate_converts_to_polling_interval() {
        // 0.7 / 2000 sps at 1 MHz.
        assert_eq!(rest_ticks_for_rate(1_000_000, 2_000_000, 700), 350);
        // 0.7 / 2.5 sps at 72 MHz.
        assert_eq!(rest_ticks_for_rate(72_000_000, 2_500, 700), 20_160_000);
        assert_eq!(rest_ticks_for_rate(1_000_000, 0, 700), 0);
    }

    #[test]
    fn flags_round_trip_through_raw_byte() {
        let flags = CycleFlags::new().with_pending(true).with_armed(true);
        assert_eq!(u8::from(flags), 0b11);
        assert_eq!(CycleFlags::from(0b10).armed(), true);
    }
}
