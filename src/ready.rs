//! Non-blocking "sample available" predicate over a digital input.

use embedded_hal::digital::InputPin;

/// Active-low readiness signal (ADS DRDY, HX71x DOUT).
///
/// Reading it has no side effects and is safe inside a masked window.
pub struct DataReady<P> {
    pin: P,
}

impl<P> DataReady<P> {
    /// Wraps the input pin.
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Consumes the gate and returns the owned pin.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: InputPin> DataReady<P> {
    /// Returns `true` when a completed conversion can be read.
    pub fn is_ready(&mut self) -> core::result::Result<bool, P::Error> {
        self.pin.is_low()
    }

    /// Samples the raw line level; used to clock in HX71x data bits.
    pub(crate) fn is_high(&mut self) -> core::result::Result<bool, P::Error> {
        self.pin.is_high()
    }
}

#[cfg(test)]
mod tests {
    use super::DataReady;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn low_level_signals_ready() {
        let expectations = [Transaction::get(State::High), Transaction::get(State::Low)];
        let mut pin = PinMock::new(&expectations);
        let mut gate = DataReady::new(pin.clone());

        assert!(!gate.is_ready().unwrap());
        assert!(gate.is_ready().unwrap());

        pin.done();
    }
}
