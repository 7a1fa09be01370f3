//! Converter bring-up and the polling interval derived from each sample rate.
//!
//! The ADS1256 must be reset, given its gain and data rate, and put into
//! continuous conversion before the capture task reads from it. The HX71x has no
//! registers; its rate is strapped in hardware and only the polling interval and
//! gain/channel selection are checked here.
//!
//! # Examples
//!
//! ```rust
//! use bulk_adc::params::{Ads1256DataRate, Hx71xModel};
//! use bulk_adc::setup::{Ads1256Setup, Hx71xSetup};
//!
//! let setup = Ads1256Setup::new().data_rate(Ads1256DataRate::Sps2000);
//! assert_eq!(setup.rest_ticks(1_000_000), 350);
//!
//! let setup = Hx71xSetup::new(Hx71xModel::Hx711).sample_rate(10);
//! assert_eq!(setup.rest_ticks(1_000_000), Ok(70_000));
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

use crate::config::ConfigError;
use crate::error::{Error, Result};
use crate::params::{Ads1256DataRate, Ads1256Gain, GainChannel, Hx71xModel};
use crate::registers::{
    register_command, Adcon, Register, CMD_RDATAC, CMD_RESET, CMD_RREG, CMD_SYNC, CMD_WAKEUP,
    CMD_WREG,
};
use crate::schedule::{rest_ticks_for_rate, Ticks};

/// Fraction of a sample period, in permille, between readiness polls.
pub const DEFAULT_DUTY_PERMILLE: u16 = 700;
/// Settling time after a reset command.
pub const RESET_SETTLE_MS: u32 = 100;
/// Delay between an `RREG` command and its data (50 `tCLKIN` at 7.68 MHz).
pub const RREG_DELAY_NS: u32 = 7_000;

// Registers written in one burst, starting at `ADCON`.
const BURST_LEN: usize = 2;

/// Gain and data rate written to an ADS1256 before capture starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ads1256Setup {
    /// PGA setting.
    pub gain: Ads1256Gain,
    /// Output data rate.
    pub data_rate: Ads1256DataRate,
}

impl Ads1256Setup {
    /// Gain 64 at 2000 sps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the PGA gain.
    pub fn gain(mut self, gain: Ads1256Gain) -> Self {
        self.gain = gain;
        self
    }

    /// Sets the output data rate.
    pub fn data_rate(mut self, data_rate: Ads1256DataRate) -> Self {
        self.data_rate = data_rate;
        self
    }

    /// `ADCON` and `DRATE` values in register order.
    pub fn register_values(&self) -> [u8; BURST_LEN] {
        [u8::from(Adcon::with_gain(self.gain)), self.data_rate.code()]
    }

    /// Polling interval at 70% of one conversion period.
    pub fn rest_ticks(&self, clock_freq: u32) -> Ticks {
        rest_ticks_for_rate(clock_freq, self.data_rate.millihertz(), DEFAULT_DUTY_PERMILLE)
    }

    /// Resets the chip, writes and verifies `ADCON`/`DRATE`, then starts
    /// continuous conversion.
    pub fn apply<SPI, D>(&self, spi: &mut SPI, delay: &mut D) -> Result<(), SPI::Error>
    where
        SPI: SpiDevice,
        D: DelayNs,
    {
        send_command(spi, CMD_RESET)?;
        delay.delay_ms(RESET_SETTLE_MS);

        let expected = self.register_values();
        write_registers(spi, Adcon::ADDRESS, &expected)?;
        let mut stored = [0u8; BURST_LEN];
        read_registers(spi, Adcon::ADDRESS, &mut stored)?;
        if let Some(offset) = expected.iter().zip(&stored).position(|(want, got)| want != got) {
            let register = Adcon::ADDRESS + offset as u8;
            error!(
                "ads1256: register {:#x} set to {:#x}, read {:#x}",
                register, expected[offset], stored[offset]
            );
            return Err(Error::RegisterMismatch {
                register,
                expected: expected[offset],
                actual: stored[offset],
            });
        }

        send_command(spi, CMD_SYNC)?;
        send_command(spi, CMD_WAKEUP)?;
        send_command(spi, CMD_RDATAC)?;
        debug!("ads1256: continuous conversion started");
        Ok(())
    }
}

fn send_command<SPI: SpiDevice>(
    spi: &mut SPI,
    command: u8,
) -> core::result::Result<(), SPI::Error> {
    spi.write(&[command])
}

fn write_registers<SPI: SpiDevice>(
    spi: &mut SPI,
    register: u8,
    data: &[u8],
) -> core::result::Result<(), SPI::Error> {
    if data.is_empty() {
        return Ok(());
    }

    let command = [register_command(CMD_WREG, register), (data.len() - 1) as u8];
    let mut operations = [Operation::Write(&command), Operation::Write(data)];
    spi.transaction(&mut operations)
}

fn read_registers<SPI: SpiDevice>(
    spi: &mut SPI,
    register: u8,
    buf: &mut [u8],
) -> core::result::Result<(), SPI::Error> {
    if buf.is_empty() {
        return Ok(());
    }

    let command = [register_command(CMD_RREG, register), (buf.len() - 1) as u8];
    let mut operations = [
        Operation::Write(&command),
        Operation::DelayNs(RREG_DELAY_NS),
        Operation::Read(buf),
    ];
    spi.transaction(&mut operations)
}

/// Sample rate, gain/channel and polling duty of an HX711 or HX717.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hx71xSetup {
    /// Converter variant.
    pub model: Hx71xModel,
    /// Strapped sample rate in samples per second.
    pub sample_rate: u16,
    /// Gain/channel selected by the trailing pulses.
    pub gain_channel: GainChannel,
    /// Polling interval as permille of one sample period, 100-1000.
    pub duty_permille: u16,
}

impl Hx71xSetup {
    /// Model defaults: fastest rate, channel A at gain 128, 70% duty.
    pub fn new(model: Hx71xModel) -> Self {
        Self {
            model,
            sample_rate: model.default_sample_rate(),
            gain_channel: GainChannel::A128,
            duty_permille: DEFAULT_DUTY_PERMILLE,
        }
    }

    /// Sets the strapped sample rate.
    pub fn sample_rate(mut self, sps: u16) -> Self {
        self.sample_rate = sps;
        self
    }

    /// Sets the gain/channel selection.
    pub fn gain_channel(mut self, gain_channel: GainChannel) -> Self {
        self.gain_channel = gain_channel;
        self
    }

    /// Sets the polling duty in permille of one sample period.
    pub fn duty_permille(mut self, duty_permille: u16) -> Self {
        self.duty_permille = duty_permille;
        self
    }

    /// Checks the selection against what the model supports.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if !self.model.supports_sample_rate(self.sample_rate) {
            return Err(ConfigError::SampleRateNotSupported);
        }
        if !self.model.supports_gain(self.gain_channel) {
            return Err(ConfigError::GainNotSupported);
        }
        if !(100..=1000).contains(&self.duty_permille) {
            return Err(ConfigError::DutyCycleOutOfRange);
        }
        Ok(())
    }

    /// Polling interval for a validated selection.
    pub fn rest_ticks(&self, clock_freq: u32) -> core::result::Result<Ticks, ConfigError> {
        self.validate()?;
        Ok(rest_ticks_for_rate(
            clock_freq,
            u32::from(self.sample_rate) * 1000,
            self.duty_permille,
        ))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::registers::REG_ADCON;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};
    use std::vec;
    use std::vec::Vec;

    fn command(byte: u8) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![byte]),
            SpiTransaction::transaction_end(),
        ]
    }

    fn burst(written: [u8; 2], read_back: [u8; 2]) -> Vec<SpiTransaction<u8>> {
        let mut expectations = Vec::new();
        expectations.extend(command(0xFE));
        expectations.extend([
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x52, 0x01]),
            SpiTransaction::write_vec(written.to_vec()),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x12, 0x01]),
            SpiTransaction::delay(RREG_DELAY_NS),
            SpiTransaction::read_vec(read_back.to_vec()),
            SpiTransaction::transaction_end(),
        ]);
        expectations
    }

    #[test]
    fn ads1256_setup_writes_verifies_and_starts_continuous_mode() {
        let mut expectations = burst([0x26, 0xB0], [0x26, 0xB0]);
        expectations.extend(command(0xFC));
        expectations.extend(command(0xFF));
        expectations.extend(command(0x03));
        let mut spi = SpiMock::new(&expectations);

        Ads1256Setup::new().apply(&mut spi, &mut NoopDelay::new()).unwrap();

        spi.done();
    }

    #[test]
    fn ads1256_setup_reports_the_first_register_that_did_not_stick() {
        let expectations = burst([0x20, 0x72], [0x20, 0xFF]);
        let mut spi = SpiMock::new(&expectations);

        let setup = Ads1256Setup::new()
            .gain(Ads1256Gain::G1)
            .data_rate(Ads1256DataRate::Sps60);
        let result = setup.apply(&mut spi, &mut NoopDelay::new());

        assert_eq!(
            result,
            Err(Error::RegisterMismatch {
                register: REG_ADCON + 1,
                expected: 0x72,
                actual: 0xFF,
            })
        );
        let fault = crate::error::Fault::from(&result.unwrap_err());
        assert_eq!(fault, crate::error::Fault::RegisterMismatch(0x03));
        spi.done();
    }

    #[test]
    fn ads1256_polls_at_seventy_percent_of_the_rate() {
        let setup = Ads1256Setup::new();
        assert_eq!(setup.rest_ticks(1_000_000), 350);
        let setup = setup.data_rate(Ads1256DataRate::Sps2_5);
        assert_eq!(setup.rest_ticks(72_000_000), 20_160_000);
    }

    #[test]
    fn hx71x_defaults_follow_the_model() {
        let hx711 = Hx71xSetup::new(Hx71xModel::Hx711);
        assert_eq!(hx711.sample_rate, 80);
        assert_eq!(hx711.gain_channel, GainChannel::A128);
        assert_eq!(hx711.rest_ticks(1_000_000), Ok(8_750));

        let hx717 = Hx71xSetup::new(Hx71xModel::Hx717);
        assert_eq!(hx717.rest_ticks(1_000_000), Ok(2_187));
        assert_eq!(hx717.duty_permille(1000).rest_ticks(1_000_000), Ok(3_125));
    }

    #[test]
    fn hx71x_rejects_unsupported_selections() {
        let hx711 = Hx71xSetup::new(Hx71xModel::Hx711);
        assert_eq!(
            hx711.sample_rate(320).validate(),
            Err(ConfigError::SampleRateNotSupported)
        );
        assert_eq!(
            hx711.gain_channel(GainChannel::B8).validate(),
            Err(ConfigError::GainNotSupported)
        );
        assert_eq!(
            hx711.duty_permille(99).rest_ticks(1_000_000),
            Err(ConfigError::DutyCycleOutOfRange)
        );
        assert_eq!(
            hx711.duty_permille(1001).validate(),
            Err(ConfigError::DutyCycleOutOfRange)
        );

        let hx717 = Hx71xSetup::new(Hx71xModel::Hx717).gain_channel(GainChannel::B8);
        assert_eq!(hx717.sample_rate(20).validate(), Ok(()));
    }
}
