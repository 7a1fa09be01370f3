//! Optional fanout of validated samples to a mechanical-endstop consumer.

use crate::schedule::Ticks;

/// Receiver of validated samples, typically a load-cell endstop trigger.
///
/// Delivery is synchronous and fire-and-forget: the acquisition cycle does not
/// observe the consumer's outcome. Implementors are usually shared with an
/// interrupt handler and therefore take `&self`.
pub trait SampleConsumer {
    /// Receives one validated sample and the tick its transfer started at.
    fn report_sample(&self, counts: i32, clock: Ticks);
}

impl<T: SampleConsumer + ?Sized> SampleConsumer for &T {
    fn report_sample(&self, counts: i32, clock: Ticks) {
        (**self).report_sample(counts, clock)
    }
}

/// Placeholder consumer for instances that never fan out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoEndstop;

impl SampleConsumer for NoEndstop {
    fn report_sample(&self, _counts: i32, _clock: Ticks) {}
}
