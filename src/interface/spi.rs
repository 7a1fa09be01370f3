//! Register transfer strategy built on top of `embedded-hal` `SpiDevice`.

use embedded_hal::digital::InputPin;
use embedded_hal::spi::SpiDevice;

use super::{RawReading, SampleTransfer};
use crate::decode::RawSample;
use crate::params::Strategy;
use crate::ready::DataReady;
use crate::schedule::{ticks_elapsed, Clock};

// Bytes in one conversion word.
const SAMPLE_BYTES: usize = 3;

/// Errors raised by the SPI bus or the DRDY pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiTransferError<S, P> {
    /// SPI bus error.
    Spi(S),
    /// DRDY pin read error.
    DataReady(P),
}

/// Reads ADS1220/ADS1256 conversions with a fixed 3-byte SPI transfer.
pub struct SpiTransfer<SPI, DRDY> {
    spi: SPI,
    data_ready: DataReady<DRDY>,
}

impl<SPI, DRDY> SpiTransfer<SPI, DRDY> {
    /// Creates a transfer from the SPI device and DRDY input.
    pub const fn new(spi: SPI, data_ready: DRDY) -> Self {
        Self {
            spi,
            data_ready: DataReady::new(data_ready),
        }
    }

    /// Provides mutable access to the wrapped SPI device.
    pub fn spi_mut(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Consumes the transfer and returns the owned SPI device and DRDY pin.
    pub fn release(self) -> (SPI, DRDY) {
        (self.spi, self.data_ready.release())
    }
}

impl<SPI, DRDY> SampleTransfer for SpiTransfer<SPI, DRDY>
where
    SPI: SpiDevice,
    DRDY: InputPin,
{
    type Error = SpiTransferError<SPI::Error, DRDY::Error>;

    const STRATEGY: Strategy = Strategy::Register;

    fn is_ready(&mut self) -> core::result::Result<bool, Self::Error> {
        self.data_ready.is_ready().map_err(SpiTransferError::DataReady)
    }

    fn read_raw(&mut self, clock: &impl Clock) -> core::result::Result<RawReading, Self::Error> {
        let mut msg = [0u8; SAMPLE_BYTES];
        let start = critical_section::with(|_| clock.now());
        self.spi
            .transfer_in_place(&mut msg)
            .map_err(SpiTransferError::Spi)?;
        let elapsed = ticks_elapsed(start, clock.now());

        Ok(RawReading {
            raw: RawSample::from_be_bytes(msg),
            start,
            elapsed,
            ready_after_read: false,
        })
    }
}
