use crate::{crc, Command, Driver, Error, IoWire, OpCode};
use core::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    ops::Deref,
    str::FromStr,
};
use embedded_hal::delay::DelayNs;

/// 64-bit lasered ROM: family code, 48-bit serial number, CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Rom {
    raw: [u8; Self::BYTES],
}

impl From<[u8; Self::BYTES]> for Rom {
    fn from(raw: [u8; Self::BYTES]) -> Self {
        Rom { raw }
    }
}

impl From<Rom> for [u8; Rom::BYTES] {
    fn from(rom: Rom) -> [u8; Rom::BYTES] {
        rom.raw
    }
}

impl Deref for Rom {
    type Target = [u8; Self::BYTES];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl AsRef<[u8]> for Rom {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Rom {
    pub const BYTES: usize = 8;

    pub fn family_code(&self) -> u8 {
        self.raw[0]
    }

    pub fn serial_number(&self) -> [u8; 6] {
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&self.raw[1..7]);
        serial
    }

    /// CRC byte as reported by the device
    pub fn crc(&self) -> u8 {
        self.raw[7]
    }

    pub fn ensure_correct_crc8<E: Debug>(&self) -> Result<(), Error<E>> {
        crc::ensure_correct_crc8(&self.raw[..7], self.crc())
    }

    /// Reset, Read ROM and eight bytes back. Only valid with a single device on the bus.
    pub fn read_single<W: IoWire>(
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
    ) -> Result<Self, Error<W::Error>> {
        let mut rom = Self::default();
        driver.reset_write_read(delay, &[Command::ReadRom.op_code()], &mut rom.raw)?;
        Ok(rom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RomParseError {
    NotEnough,
    Invalid,
}

impl FromStr for Rom {
    type Err = RomParseError;

    /// Accepts 16 hex digits, optionally separated by whitespace or `:`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut raw = [0u8; Self::BYTES];
        let mut digits = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .map(|c| c.to_digit(16));

        for byte in raw.iter_mut() {
            match (digits.next(), digits.next()) {
                (Some(Some(h)), Some(Some(l))) => *byte = ((h << 4) | l) as u8,
                (Some(None), _) | (_, Some(None)) => return Err(RomParseError::Invalid),
                _ => return Err(RomParseError::NotEnough),
            }
        }

        Ok(Rom { raw })
    }
}

impl Display for Rom {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for (i, b) in self.raw.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Rom, RomParseError};
    use crate::crc::compute_crc8;
    use crate::Error;

    fn rom_with_crc(head: [u8; 7]) -> Rom {
        let mut raw = [0u8; 8];
        raw[..7].copy_from_slice(&head);
        raw[7] = compute_crc8(&head);
        Rom::from(raw)
    }

    #[test]
    fn fields() {
        let rom = Rom::from([0x26, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        assert_eq!(rom.family_code(), 0x26);
        assert_eq!(rom.serial_number(), [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(rom.crc(), 0x77);
    }

    #[test]
    fn crc_check() {
        let rom = rom_with_crc([0x26, 0x9d, 0x2f, 0xbd, 0x01, 0x00, 0x00]);
        assert!(rom.ensure_correct_crc8::<()>().is_ok());

        let mut raw: [u8; 8] = rom.into();
        raw[3] ^= 0x10;
        assert!(matches!(
            Rom::from(raw).ensure_correct_crc8::<()>(),
            Err(Error::CrcMismatch(_, _))
        ));
    }

    #[test]
    fn parse_rom() {
        let rom: Rom = "26a0e2bd01000040".parse().unwrap();
        assert_eq!(
            rom,
            Rom::from([0x26, 0xa0, 0xe2, 0xbd, 0x01, 0x00, 0x00, 0x40])
        );
    }

    #[test]
    fn parse_rom_separated() {
        let spaced: Rom = "26 a0 e2 bd 01 00 00 40".parse().unwrap();
        let colons: Rom = "26:A0:E2:BD:01:00:00:40".parse().unwrap();
        assert_eq!(spaced, colons);
    }

    #[test]
    fn parse_rom_errors() {
        assert_eq!("26a0".parse::<Rom>(), Err(RomParseError::NotEnough));
        assert_eq!(
            "26a0e2bd0100004g".parse::<Rom>(),
            Err(RomParseError::Invalid)
        );
    }

    #[test]
    fn display_round_trips() {
        let rom = Rom::from([0x26, 0xa0, 0xe2, 0xbd, 0x01, 0x00, 0x00, 0x40]);
        let text = format!("{}", rom);
        assert_eq!(text, "26:a0:e2:bd:01:00:00:40");
        assert_eq!(text.parse::<Rom>(), Ok(rom));
    }
}
