//! Command set and register map of the ADS1256 used during bring-up.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::params::{Ads1256DataRate, Ads1256Gain};

/// Wake up from standby.
pub const CMD_WAKEUP: u8 = 0xFF;
/// Read data continuously.
pub const CMD_RDATAC: u8 = 0x03;
/// Read registers; the low nibble carries the start address.
pub const CMD_RREG: u8 = 0x10;
/// Write registers; the low nibble carries the start address.
pub const CMD_WREG: u8 = 0x50;
/// Synchronize the A/D conversion.
pub const CMD_SYNC: u8 = 0xFC;
/// Reset registers to their power-on values.
pub const CMD_RESET: u8 = 0xFE;
/// Filler clocked out while reading.
pub const CMD_NOOP: u8 = 0x00;

/// Register address of `STATUS`.
pub const REG_STATUS: u8 = 0x00;
/// Register address of `MUX`.
pub const REG_MUX: u8 = 0x01;
/// Register address of `ADCON`.
pub const REG_ADCON: u8 = 0x02;
/// Register address of `DRATE`.
pub const REG_DRATE: u8 = 0x03;

/// Minimal metadata exposed by every register value type.
pub trait Register {
    /// Register address as documented in the datasheet.
    const ADDRESS: u8;
    /// Power-on value.
    const RESET_VALUE: u8;
}

/// First byte of an `RREG`/`WREG` command addressing `register`.
pub const fn register_command(command: u8, register: u8) -> u8 {
    command | (register & 0x0F)
}

/// `CLKOUT` divider selection in `ADCON`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[repr(u8)]
#[bits = 2]
pub enum ClockOut {
    /// Clock output disabled.
    Off = 0b00,
    /// `fCLKIN`.
    Div1 = 0b01,
    /// `fCLKIN / 2`.
    Div2 = 0b10,
    /// `fCLKIN / 4`.
    Div4 = 0b11,
}

/// Bitfield representation of the `ADCON` register (address `0x02`).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adcon {
    // Programmable gain (bits 0-2).
    pub pga: Ads1256Gain,
    // Sensor detect current source (bits 3-4).
    pub sdcs: B2,
    // Clock output rate (bits 5-6).
    pub clk: ClockOut,
    #[skip]
    __: B1,
}

impl Adcon {
    /// Power-on layout with the requested gain.
    pub fn with_gain(gain: Ads1256Gain) -> Self {
        Self::from(<Self as Register>::RESET_VALUE).with_pga(gain)
    }
}

impl Register for Adcon {
    const ADDRESS: u8 = REG_ADCON;
    const RESET_VALUE: u8 = 0x20;
}

impl From<u8> for Adcon {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<Adcon> for u8 {
    fn from(value: Adcon) -> Self {
        value.into_bytes()[0]
    }
}

impl Register for Ads1256DataRate {
    const ADDRESS: u8 = REG_DRATE;
    const RESET_VALUE: u8 = Ads1256DataRate::Sps30000.code();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adcon_keeps_clock_output_at_reset_value() {
        let adcon = Adcon::with_gain(Ads1256Gain::G64);
        assert_eq!(adcon.clk(), ClockOut::Div1);
        assert_eq!(u8::from(adcon), 0x26);
        assert_eq!(u8::from(Adcon::with_gain(Ads1256Gain::G1)), 0x20);
    }

    #[test]
    fn adcon_decodes_gain_bits() {
        let adcon = Adcon::from(0x23);
        assert_eq!(adcon.pga(), Ads1256Gain::G8);
        assert_eq!(adcon.sdcs(), 0);
    }

    #[test]
    fn register_commands_carry_the_address_nibble() {
        assert_eq!(register_command(CMD_WREG, REG_ADCON), 0x52);
        assert_eq!(register_command(CMD_RREG, REG_DRATE), 0x13);
        assert_eq!(register_command(CMD_RREG, REG_STATUS), 0x10);
        assert_eq!(REG_MUX, 0x01);
    }
}
