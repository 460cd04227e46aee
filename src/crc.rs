use crate::Error;
use core::fmt::Debug;

/// Dallas/Maxim CRC-8 (x^8 + x^5 + x^4 + 1, reflected), continued from `crc`
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

pub fn compute_crc8(data: &[u8]) -> u8 {
    compute_partial_crc8(0, data)
}

/// `data` excludes the CRC byte itself
pub fn check_crc8(data: &[u8], expected: u8) -> bool {
    compute_crc8(data) == expected
}

pub fn ensure_correct_crc8<E: Debug>(data: &[u8], expected: u8) -> Result<(), Error<E>> {
    let computed = compute_crc8(data);
    if computed != expected {
        warn!("crc mismatch: computed {}, expected {}", computed, expected);
        Err(Error::CrcMismatch(computed, expected))
    } else {
        Ok(())
    }
}
