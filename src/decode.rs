//! Conversions from register bytes to physical units

use byteorder::{ByteOrder, LittleEndian};

/// Degrees Celsius per LSB of the 13 bit temperature value
pub const TEMPERATURE_RESOLUTION: f32 = 0.03125;

/// Volts per LSB of the voltage register
pub const VOLTAGE_RESOLUTION: f32 = 0.01;

/// Signed 13 bit temperature count
///
/// The word is signed before the shift so negative temperatures keep their sign.
pub fn raw_temperature(lsb: u8, msb: u8) -> i16 {
    LittleEndian::read_i16(&[lsb, msb]) >> 3
}

pub fn temperature(lsb: u8, msb: u8) -> f32 {
    raw_temperature(lsb, msb) as f32 * TEMPERATURE_RESOLUTION
}

pub fn voltage(lsb: u8, msb: u8) -> f32 {
    LittleEndian::read_u16(&[lsb, msb]) as f32 / 100.0
}

/// Current register as a signed count
///
/// The register is 10 bits wide with the sign extended into bits 1..0 of the MSB.
pub fn raw_current(lsb: u8, msb: u8) -> i16 {
    let word = LittleEndian::read_u16(&[lsb, msb]);
    if msb & 0x03 > 1 {
        -(((!word) & 0x3FF) as i16)
    } else {
        word as i16
    }
}

/// Amps through a sense resistor of `sense_resistor` ohms
pub fn current(raw: i16, sense_resistor: f32) -> f32 {
    raw as f32 / (4096.0 * sense_resistor)
}

/// Accumulated charge from the ICA register
pub fn capacity(ica: u8, sense_resistor: f32) -> f32 {
    ica as f32 / (2048.0 * sense_resistor)
}
