use crate::{crc, decode, Error};
use byteorder::{ByteOrder, LittleEndian};
use core::fmt::Debug;
use core::ops::Deref;

/// Highest addressable page
pub const LAST_PAGE: u8 = 7;

/// One memory page as read from the scratchpad: eight data bytes and their CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Page {
    number: u8,
    raw: [u8; Page::BYTES],
}

impl Deref for Page {
    type Target = [u8; Page::BYTES];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl AsRef<[u8]> for Page {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Page {
    /// Data bytes plus CRC
    pub const BYTES: usize = 9;
    pub const DATA_BYTES: usize = 8;

    pub fn new(number: u8, raw: [u8; Page::BYTES]) -> Self {
        Page { number, raw }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn data(&self) -> &[u8] {
        &self.raw[..Self::DATA_BYTES]
    }

    pub fn crc(&self) -> u8 {
        self.raw[Self::DATA_BYTES]
    }

    pub fn ensure_correct_crc8<E: Debug>(&self) -> Result<(), Error<E>> {
        crc::ensure_correct_crc8(self.data(), self.crc())
    }

    /// Copy of the bytes suitable for writing back with [`Ds2438::write_page`](crate::Ds2438::write_page)
    pub fn into_bytes(self) -> [u8; Page::BYTES] {
        self.raw
    }

    /// Page 0 byte 0
    pub fn status(&self) -> Status {
        Status::from(self.raw[0])
    }

    /// Temperature register word, three low bits unused
    pub fn temperature_word(&self) -> u16 {
        LittleEndian::read_u16(&self.raw[1..3])
    }

    pub fn temperature(&self) -> f32 {
        decode::temperature(self.raw[1], self.raw[2])
    }

    pub fn raw_voltage(&self) -> u16 {
        LittleEndian::read_u16(&self.raw[3..5])
    }

    pub fn voltage(&self) -> f32 {
        decode::voltage(self.raw[3], self.raw[4])
    }

    pub fn raw_current(&self) -> i16 {
        decode::raw_current(self.raw[5], self.raw[6])
    }

    pub fn current(&self, sense_resistor: f32) -> f32 {
        decode::current(self.raw_current(), sense_resistor)
    }

    /// Page 0 byte 7 bits 7..6
    pub fn threshold(&self) -> u8 {
        self.raw[7] >> 6
    }

    /// Page 1 byte 4
    pub fn ica(&self) -> u8 {
        self.raw[4]
    }
}

/// Status/configuration register (page 0, byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Status(u8);

impl From<u8> for Status {
    fn from(raw: u8) -> Self {
        Status(raw)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status.0
    }
}

impl Status {
    /// Current A/D and ICA enable
    pub const IAD: u8 = 1 << 0;
    /// Current accumulator enable
    pub const CA: u8 = 1 << 1;
    /// Shadow accumulators to EEPROM
    pub const EE: u8 = 1 << 2;
    /// A/D input select, set = VDD, clear = VAD
    pub const AD: u8 = 1 << 3;
    /// Temperature conversion busy
    pub const TB: u8 = 1 << 4;
    /// EEPROM copy in progress
    pub const NVB: u8 = 1 << 5;
    /// Voltage conversion busy
    pub const ADB: u8 = 1 << 6;

    pub fn bits(&self) -> u8 {
        self.0
    }

    fn is_set(&self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    fn with(self, mask: u8, value: bool) -> Self {
        if value {
            Status(self.0 | mask)
        } else {
            Status(self.0 & !mask)
        }
    }

    pub fn is_iad_enabled(&self) -> bool {
        self.is_set(Self::IAD)
    }

    pub fn with_iad_enabled(self, enabled: bool) -> Self {
        self.with(Self::IAD, enabled)
    }

    pub fn is_ca_enabled(&self) -> bool {
        self.is_set(Self::CA)
    }

    pub fn with_ca_enabled(self, enabled: bool) -> Self {
        self.with(Self::CA, enabled)
    }

    pub fn is_shadow_ee_enabled(&self) -> bool {
        self.is_set(Self::EE)
    }

    pub fn with_shadow_ee_enabled(self, enabled: bool) -> Self {
        self.with(Self::EE, enabled)
    }

    pub fn input_source(&self) -> InputSource {
        if self.is_set(Self::AD) {
            InputSource::Vdd
        } else {
            InputSource::Vad
        }
    }

    pub fn with_input_source(self, source: InputSource) -> Self {
        self.with(Self::AD, source == InputSource::Vdd)
    }

    pub fn is_temperature_busy(&self) -> bool {
        self.is_set(Self::TB)
    }

    pub fn is_copy_in_progress(&self) -> bool {
        self.is_set(Self::NVB)
    }

    pub fn is_voltage_busy(&self) -> bool {
        self.is_set(Self::ADB)
    }
}

/// Input measured by a voltage conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum InputSource {
    /// General purpose A/D input
    Vad = 0,
    /// Supply voltage
    Vdd = 1,
}

impl InputSource {
    /// Like `try_from`, but fails with [`Error::BadParam`] for use next to bus operations
    pub fn from_selector<E: Debug>(value: u8) -> Result<Self, Error<E>> {
        Self::try_from(value).map_err(|_| Error::BadParam)
    }
}

/// Selector value other than 0 (VAD) or 1 (VDD)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidInputSource(pub u8);

impl TryFrom<u8> for InputSource {
    type Error = InvalidInputSource;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(InputSource::Vad),
            1 => Ok(InputSource::Vdd),
            _ => Err(InvalidInputSource(value)),
        }
    }
}
