//! Bit-banged two-wire transfer strategy for the HX711 and HX717.
//!
//! The chip shifts out one data bit per SCLK pulse, MSB first. After the 24 data
//! bits, 1-4 extra pulses select gain and input channel for the next conversion.
//! Each pulse is generated with interrupts masked so that the high and low phases
//! never drop below the minimum pulse width; the masked window covers one pulse,
//! not the whole train. Holding SCLK high powers the chip down.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use super::{RawReading, SampleTransfer};
use crate::config::ConfigError;
use crate::decode::RawSample;
use crate::params::{GainChannel, Strategy};
use crate::ready::DataReady;
use crate::schedule::{ticks_elapsed, Clock};

/// Minimum SCLK high and low time shared by HX711 and HX717, in nanoseconds.
pub const MIN_PULSE_NS: u32 = 200;
// Data bits per conversion.
const DATA_BITS: u8 = 24;

/// Errors raised by the DOUT or SCLK pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitBangError<D, C> {
    /// DOUT read error.
    Dout(D),
    /// SCLK write error.
    Sclk(C),
}

/// Reads HX71x conversions by pulsing SCLK and sampling DOUT.
pub struct BitBangTransfer<DOUT, SCLK, DELAY> {
    dout: DataReady<DOUT>,
    sclk: SCLK,
    delay: DELAY,
    gain_channel: GainChannel,
}

impl<DOUT, SCLK, DELAY> BitBangTransfer<DOUT, SCLK, DELAY> {
    /// Creates a transfer, validating the raw gain/channel selector.
    pub fn new(
        dout: DOUT,
        sclk: SCLK,
        delay: DELAY,
        gain_channel: u8,
    ) -> core::result::Result<Self, ConfigError> {
        Ok(Self::with_gain_channel(
            dout,
            sclk,
            delay,
            GainChannel::try_from(gain_channel)?,
        ))
    }

    /// Creates a transfer from an already validated selector.
    pub const fn with_gain_channel(
        dout: DOUT,
        sclk: SCLK,
        delay: DELAY,
        gain_channel: GainChannel,
    ) -> Self {
        Self {
            dout: DataReady::new(dout),
            sclk,
            delay,
            gain_channel,
        }
    }

    /// Gain/channel selection programmed after every read.
    pub fn gain_channel(&self) -> GainChannel {
        self.gain_channel
    }

    /// Consumes the transfer and returns the owned pins and delay.
    pub fn release(self) -> (DOUT, SCLK, DELAY) {
        (self.dout.release(), self.sclk, self.delay)
    }
}

impl<DOUT, SCLK, DELAY> BitBangTransfer<DOUT, SCLK, DELAY>
where
    DOUT: InputPin,
    SCLK: OutputPin,
    DELAY: DelayNs,
{
    fn pulse_clock(&mut self) -> core::result::Result<(), BitBangError<DOUT::Error, SCLK::Error>> {
        let Self { sclk, delay, .. } = self;
        critical_section::with(|_| {
            sclk.set_high().map_err(BitBangError::Sclk)?;
            delay.delay_ns(MIN_PULSE_NS);
            sclk.set_low().map_err(BitBangError::Sclk)?;
            delay.delay_ns(MIN_PULSE_NS);
            Ok(())
        })
    }
}

impl<DOUT, SCLK, DELAY> SampleTransfer for BitBangTransfer<DOUT, SCLK, DELAY>
where
    DOUT: InputPin,
    SCLK: OutputPin,
    DELAY: DelayNs,
{
    type Error = BitBangError<DOUT::Error, SCLK::Error>;

    const STRATEGY: Strategy = Strategy::BitBang;

    fn is_ready(&mut self) -> core::result::Result<bool, Self::Error> {
        self.dout.is_ready().map_err(BitBangError::Dout)
    }

    fn read_raw(&mut self, clock: &impl Clock) -> core::result::Result<RawReading, Self::Error> {
        let start = clock.now();

        let mut raw = 0u32;
        for _ in 0..DATA_BITS {
            self.pulse_clock()?;
            let bit = self.dout.is_high().map_err(BitBangError::Dout)?;
            raw = (raw << 1) | u32::from(bit);
        }

        for _ in 0..self.gain_channel.pulses() {
            self.pulse_clock()?;
        }

        let ready_after_read = self.is_ready()?;
        let elapsed = ticks_elapsed(start, clock.now());

        Ok(RawReading {
            raw: RawSample::from(raw),
            start,
            elapsed,
            ready_after_read,
        })
    }

    fn power_up(&mut self) -> core::result::Result<(), Self::Error> {
        self.sclk.set_low().map_err(BitBangError::Sclk)
    }

    fn power_down(&mut self) -> core::result::Result<(), Self::Error> {
        self.sclk.set_high().map_err(BitBangError::Sclk)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::BitBangTransfer;
    use crate::config::ConfigError;
    use crate::interface::SampleTransfer;
    use crate::params::GainChannel;
    use crate::test_support::TestClock;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};
    use std::vec::Vec;

    fn pulses(count: usize) -> Vec<Transaction> {
        (0..count)
            .flat_map(|_| [Transaction::set(State::High), Transaction::set(State::Low)])
            .collect()
    }

    fn dout_bits(raw: u32, ready_after: bool) -> Vec<Transaction> {
        let mut expectations: Vec<Transaction> = (0..24)
            .rev()
            .map(|bit| {
                let level = if raw & (1 << bit) != 0 { State::High } else { State::Low };
                Transaction::get(level)
            })
            .collect();
        let level = if ready_after { State::Low } else { State::High };
        expectations.push(Transaction::get(level));
        expectations
    }

    #[test]
    fn shifts_in_24_bits_msb_first_then_programs_gain() {
        let sclk_expectations = pulses(24 + 3);
        let dout_expectations = dout_bits(0x80_0001, false);
        let mut sclk = PinMock::new(&sclk_expectations);
        let mut dout = PinMock::new(&dout_expectations);
        let mut transfer =
            BitBangTransfer::new(dout.clone(), sclk.clone(), NoopDelay::new(), 3).unwrap();
        assert_eq!(transfer.gain_channel(), GainChannel::A64);

        let clock = TestClock::new(0);
        clock.set_step(10);
        let reading = transfer.read_raw(&clock).unwrap();

        assert_eq!(u32::from(reading.raw), 0x80_0001);
        assert_eq!(reading.elapsed, 10);
        assert!(!reading.ready_after_read);

        sclk.done();
        dout.done();
    }

    #[test]
    fn reports_dout_still_low_after_the_train() {
        let sclk_expectations = pulses(24 + 1);
        let dout_expectations = dout_bits(0x12_3456, true);
        let mut sclk = PinMock::new(&sclk_expectations);
        let mut dout = PinMock::new(&dout_expectations);
        let mut transfer =
            BitBangTransfer::new(dout.clone(), sclk.clone(), NoopDelay::new(), 1).unwrap();

        let reading = transfer.read_raw(&TestClock::new(0)).unwrap();
        assert_eq!(u32::from(reading.raw), 0x12_3456);
        assert!(reading.ready_after_read);

        sclk.done();
        dout.done();
    }

    #[test]
    fn power_state_follows_sclk_level() {
        let sclk_expectations = [Transaction::set(State::High), Transaction::set(State::Low)];
        let dout_expectations: [Transaction; 0] = [];
        let mut sclk = PinMock::new(&sclk_expectations);
        let mut dout = PinMock::new(&dout_expectations);
        let mut transfer =
            BitBangTransfer::new(dout.clone(), sclk.clone(), NoopDelay::new(), 1).unwrap();

        transfer.power_down().unwrap();
        transfer.power_up().unwrap();

        sclk.done();
        dout.done();
    }

    #[test]
    fn rejects_gain_channel_selector_outside_range() {
        let expectations: [Transaction; 0] = [];
        let mut sclk = PinMock::new(&expectations);
        let mut dout = PinMock::new(&expectations);

        for selector in [0, 5] {
            let result =
                BitBangTransfer::new(dout.clone(), sclk.clone(), NoopDelay::new(), selector);
            assert_eq!(result.err(), Some(ConfigError::GainChannelOutOfRange));
        }

        sclk.done();
        dout.done();
    }
}
