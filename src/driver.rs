use crate::{Command, Error, IoWire, OpCode};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// Standard speed slot timings in microseconds (Maxim application note 126)
pub mod timing {
    /// Idle gap before the reset pulse (G)
    pub const RESET_IDLE_US: u32 = 0;
    /// Reset pulse (H)
    pub const RESET_LOW_US: u32 = 480;
    /// Release to presence sample (I)
    pub const PRESENCE_SAMPLE_US: u32 = 70;
    /// Remainder of the presence detect window (J)
    pub const RESET_RECOVERY_US: u32 = 410;

    /// Low time of a `1` slot and of a read slot (A)
    pub const WRITE_ONE_LOW_US: u32 = 6;
    /// Release time of a `1` slot including recovery (B)
    pub const WRITE_ONE_RELEASE_US: u32 = 64;
    /// Low time of a `0` slot (C)
    pub const WRITE_ZERO_LOW_US: u32 = 60;
    /// Release time of a `0` slot (D)
    pub const WRITE_ZERO_RELEASE_US: u32 = 6;

    /// Low time initiating a read slot (A)
    pub const READ_LOW_US: u32 = WRITE_ONE_LOW_US;
    /// Release to sample (E)
    pub const READ_SAMPLE_US: u32 = 9;
    /// Remainder of the read slot including recovery (F)
    pub const READ_RECOVERY_US: u32 = 55;
}

use timing::*;

pub struct Driver<W: IoWire> {
    io_wire: W,
}

impl<E: Debug, W: IoWire<Error = E>> Driver<W> {
    pub fn new(io_wire: W) -> Self {
        Driver { io_wire }
    }

    /// Gives the line back
    pub fn release_wire(self) -> W {
        self.io_wire
    }

    pub fn reset_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    pub fn skip(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.write_command(delay, Command::SkipRom)
    }

    /// Performs a reset and listens for a presence pulse
    ///
    /// Returns `Err(NoPresence)` if no device pulled the line low
    /// during the sample window.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        if self.reset_presence(delay)? {
            Ok(())
        } else {
            debug!("no presence pulse after reset");
            Err(Error::NoPresence)
        }
    }

    pub fn reset_presence(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        delay.delay_us(RESET_IDLE_US);
        self.drive_low()?;
        delay.delay_us(RESET_LOW_US);
        self.release()?;
        delay.delay_us(PRESENCE_SAMPLE_US);
        let presence = self.is_low();
        delay.delay_us(RESET_RECOVERY_US);
        presence
    }

    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), E> {
        for d in dst {
            *d = self.read_byte(delay)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, E> {
        let mut byte = 0_u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.read_bit(delay)? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        self.drive_low()?;
        delay.delay_us(READ_LOW_US);
        self.release()?;
        delay.delay_us(READ_SAMPLE_US);
        let val = self.is_high();
        delay.delay_us(READ_RECOVERY_US);
        val
    }

    pub fn write_command(&mut self, delay: &mut impl DelayNs, cmd: impl OpCode) -> Result<(), E> {
        self.write_byte(delay, cmd.op_code())
    }

    pub fn write_bytes(&mut self, delay: &mut impl DelayNs, bytes: &[u8]) -> Result<(), E> {
        for b in bytes {
            self.write_byte(delay, *b)?;
        }
        Ok(())
    }

    pub fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), E> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(delay, (byte & 0x01) == 0x01)?;
            byte >>= 1;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, delay: &mut impl DelayNs, high: bool) -> Result<(), E> {
        self.drive_low()?;
        delay.delay_us(if high {
            WRITE_ONE_LOW_US
        } else {
            WRITE_ZERO_LOW_US
        });
        self.release()?;
        delay.delay_us(if high {
            WRITE_ONE_RELEASE_US
        } else {
            WRITE_ZERO_RELEASE_US
        });
        Ok(())
    }

    /// Writes `byte` and returns what was sampled on the wire
    ///
    /// A `1` goes out as a read slot, so a device holding the line low
    /// turns it into a `0` in the result.
    pub fn touch_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<u8, E> {
        let mut byte = byte;
        let mut result = 0_u8;
        for _ in 0..8 {
            result >>= 1;
            if byte & 0x01 == 0x01 {
                if self.read_bit(delay)? {
                    result |= 0x80;
                }
            } else {
                self.write_bit(delay, false)?;
            }
            byte >>= 1;
        }
        Ok(result)
    }

    /// `touch_byte` over a buffer, replacing each byte with the sampled one
    pub fn touch_block(&mut self, delay: &mut impl DelayNs, block: &mut [u8]) -> Result<(), E> {
        for b in block {
            *b = self.touch_byte(delay, *b)?;
        }
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn release(&mut self) -> Result<(), E> {
        self.io_wire.release()
    }

    #[inline(always)]
    pub(crate) fn drive_low(&mut self) -> Result<(), E> {
        self.io_wire.drive_low()
    }

    #[inline(always)]
    pub(crate) fn is_high(&mut self) -> Result<bool, E> {
        self.io_wire.is_high()
    }

    #[inline(always)]
    pub(crate) fn is_low(&mut self) -> Result<bool, E> {
        self.io_wire.is_low()
    }
}
