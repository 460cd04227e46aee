use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Error type
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// No presence pulse after a reset
    NoPresence,
    /// Computed CRC, CRC reported by the device
    CrcMismatch(u8, u8),
    /// Expected family code, family code found in ROM
    FamilyCodeMismatch(u8, u8),
    /// Page number, threshold or input source out of range
    BadParam,
    /// Polling policy exhausted while waiting for the device
    Timeout,
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}

impl<E: Sized + Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::NoPresence => write!(f, "no presence pulse on wire"),
            Error::CrcMismatch(computed, expected) => write!(
                f,
                "crc mismatch: computed {:02x}, expected {:02x}",
                computed, expected
            ),
            Error::FamilyCodeMismatch(expected, found) => write!(
                f,
                "family code mismatch: expected {:02x}, found {:02x}",
                expected, found
            ),
            Error::BadParam => write!(f, "parameter out of range"),
            Error::Timeout => write!(f, "device did not become ready in time"),
            Error::PortError(e) => write!(f, "port error: {:?}", e),
        }
    }
}
