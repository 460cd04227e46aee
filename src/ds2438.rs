use embedded_hal::delay::DelayNs;

use crate::page::LAST_PAGE;
use crate::{decode, Config, Driver, Error, InputSource, IoWire, OpCode, Page, Rom, Status};

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    ConvertT = 0x44,
    ConvertV = 0xB4,
    RecallMemory = 0xB8,
    ReadScratchpad = 0xBE,
    WriteScratchpad = 0x4E,
    CopyScratchpad = 0x48,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Whether a read is validated against the CRC the device sends along
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrcCheck {
    Check,
    Skip,
}

/// The one DS2438 on the bus
///
/// Every function command is preceded by Skip ROM, so the bus must not carry
/// any other device.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ds2438 {
    config: Config,
}

impl Ds2438 {
    pub const FAMILY_CODE: u8 = 0x26;

    pub fn new(config: Config) -> Self {
        Ds2438 { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device_present<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
    ) -> Result<bool, Error<W::Error>> {
        Ok(driver.reset_presence(delay)?)
    }

    pub fn read_rom<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<Rom, Error<W::Error>> {
        let rom = Rom::read_single(driver, delay)?;
        if crc == CrcCheck::Check {
            rom.ensure_correct_crc8::<W::Error>()?;
        }
        Ok(rom)
    }

    pub fn read_serial_number<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<[u8; 6], Error<W::Error>> {
        Ok(self.read_rom(driver, delay, crc)?.serial_number())
    }

    /// Reads the ROM with CRC check and makes sure it belongs to a DS2438
    pub fn probe<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
    ) -> Result<Rom, Error<W::Error>> {
        let rom = self.read_rom(driver, delay, CrcCheck::Check)?;
        if rom.family_code() != Self::FAMILY_CODE {
            debug!("unexpected family code {}", rom.family_code());
            return Err(Error::FamilyCodeMismatch(
                Self::FAMILY_CODE,
                rom.family_code(),
            ));
        }
        Ok(rom)
    }

    pub fn start_voltage_conversion<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<W::Error>> {
        driver.reset_skip_write_only(delay, &[Command::ConvertV.op_code()])
    }

    pub fn start_temperature_conversion<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<W::Error>> {
        driver.reset_skip_write_only(delay, &[Command::ConvertT.op_code()])
    }

    /// Recalls `page` into the scratchpad and reads it back
    pub fn read_page<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        page: u8,
    ) -> Result<Page, Error<W::Error>> {
        if page > LAST_PAGE {
            return Err(Error::BadParam);
        }
        driver.reset_skip_write_only(delay, &[Command::RecallMemory.op_code(), page])?;

        let mut raw = [0u8; Page::BYTES];
        driver.reset_skip_write_read(
            delay,
            &[Command::ReadScratchpad.op_code(), page],
            &mut raw,
        )?;
        trace!("read page {}: {:?}", page, raw);
        Ok(Page::new(page, raw))
    }

    pub fn read_page_checked<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        page: u8,
        crc: CrcCheck,
    ) -> Result<Page, Error<W::Error>> {
        let page = self.read_page(driver, delay, page)?;
        if crc == CrcCheck::Check {
            page.ensure_correct_crc8::<W::Error>()?;
        }
        Ok(page)
    }

    /// Writes `data` to the scratchpad and copies it to `page`
    ///
    /// The copy to EEPROM is not awaited; see [`Ds2438::wait_for_copy`].
    pub fn write_page<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        page: u8,
        data: &[u8; Page::BYTES],
    ) -> Result<(), Error<W::Error>> {
        if page > LAST_PAGE {
            return Err(Error::BadParam);
        }
        driver.reset_skip_write_only(delay, &[Command::WriteScratchpad.op_code(), page])?;
        driver.write_bytes(delay, data)?;
        driver.reset_skip_write_only(delay, &[Command::CopyScratchpad.op_code(), page])?;
        trace!("wrote page {}: {:?}", page, data);
        Ok(())
    }

    pub fn read_status<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<Status, Error<W::Error>> {
        Ok(self.read_page_checked(driver, delay, 0, crc)?.status())
    }

    /// Read-modify-write of the status byte, leaving the rest of page 0 as read
    fn update_status<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
        update: impl FnOnce(Status) -> Status,
    ) -> Result<(), Error<W::Error>> {
        let page = self.read_page_checked(driver, delay, 0, crc)?;
        let mut raw = page.into_bytes();
        raw[0] = update(page.status()).into();
        self.write_page(driver, delay, 0, &raw)
    }

    /// Calls `ready` until it reports `true`, following the configured poll policy
    ///
    /// A CRC mismatch counts as not ready yet.
    fn poll<W: IoWire, D: DelayNs>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut D,
        mut ready: impl FnMut(&mut Driver<W>, &mut D) -> Result<bool, Error<W::Error>>,
    ) -> Result<(), Error<W::Error>> {
        let policy = self.config.poll;
        for attempt in 1..=policy.max_attempts {
            match ready(&mut *driver, &mut *delay) {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(Error::CrcMismatch(..)) => {}
                Err(e) => return Err(e),
            }
            if attempt < policy.max_attempts {
                delay.delay_us(policy.interval_us);
            }
        }
        warn!("device not ready after {} checks", policy.max_attempts);
        Err(Error::Timeout)
    }

    // Voltage

    pub fn has_voltage_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<bool, Error<W::Error>> {
        Ok(!self.read_status(driver, delay, crc)?.is_voltage_busy())
    }

    /// Volts from the last conversion
    pub fn get_voltage_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<f32, Error<W::Error>> {
        Ok(self.read_page_checked(driver, delay, 0, crc)?.voltage())
    }

    pub fn get_raw_voltage_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<u16, Error<W::Error>> {
        Ok(self.read_page_checked(driver, delay, 0, crc)?.raw_voltage())
    }

    pub fn read_voltage<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<f32, Error<W::Error>> {
        self.convert_voltage(driver, delay, crc)?;
        self.get_voltage_data(driver, delay, crc)
    }

    pub fn read_raw_voltage<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<u16, Error<W::Error>> {
        self.convert_voltage(driver, delay, crc)?;
        self.get_raw_voltage_data(driver, delay, crc)
    }

    fn convert_voltage<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.start_voltage_conversion(driver, delay)?;
        self.poll(driver, delay, |driver, delay| {
            self.has_voltage_data(driver, delay, crc)
        })
    }

    pub fn select_input_source<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        source: InputSource,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.update_status(driver, delay, crc, |status| {
            status.with_input_source(source)
        })
    }

    // Temperature

    pub fn has_temperature_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<bool, Error<W::Error>> {
        Ok(!self.read_status(driver, delay, crc)?.is_temperature_busy())
    }

    /// Degrees Celsius from the last conversion
    pub fn get_temperature_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<f32, Error<W::Error>> {
        Ok(self.read_page_checked(driver, delay, 0, crc)?.temperature())
    }

    pub fn get_raw_temperature_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<u16, Error<W::Error>> {
        Ok(self
            .read_page_checked(driver, delay, 0, crc)?
            .temperature_word())
    }

    pub fn read_temperature<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<f32, Error<W::Error>> {
        self.convert_temperature(driver, delay, crc)?;
        self.get_temperature_data(driver, delay, crc)
    }

    pub fn read_raw_temperature<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<u16, Error<W::Error>> {
        self.convert_temperature(driver, delay, crc)?;
        self.get_raw_temperature_data(driver, delay, crc)
    }

    fn convert_temperature<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.start_temperature_conversion(driver, delay)?;
        self.poll(driver, delay, |driver, delay| {
            self.has_temperature_data(driver, delay, crc)
        })
    }

    // Current and accumulators

    /// Amps through the sense resistor, positive when charging
    pub fn get_current_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<f32, Error<W::Error>> {
        let raw = self.get_raw_current_data(driver, delay, crc)?;
        Ok(decode::current(raw, self.config.sense_resistor))
    }

    pub fn get_raw_current_data<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<i16, Error<W::Error>> {
        Ok(self.read_page_checked(driver, delay, 0, crc)?.raw_current())
    }

    pub fn enable_iad<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.update_status(driver, delay, crc, |s| s.with_iad_enabled(true))
    }

    pub fn disable_iad<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.update_status(driver, delay, crc, |s| s.with_iad_enabled(false))
    }

    pub fn enable_ca<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.update_status(driver, delay, crc, |s| s.with_ca_enabled(true))
    }

    pub fn disable_ca<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.update_status(driver, delay, crc, |s| s.with_ca_enabled(false))
    }

    pub fn enable_shadow_ee<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.update_status(driver, delay, crc, |s| s.with_shadow_ee_enabled(true))
    }

    pub fn disable_shadow_ee<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.update_status(driver, delay, crc, |s| s.with_shadow_ee_enabled(false))
    }

    pub fn copy_in_progress<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<bool, Error<W::Error>> {
        Ok(self.read_status(driver, delay, crc)?.is_copy_in_progress())
    }

    /// Waits for a scratchpad copy to reach EEPROM
    pub fn wait_for_copy<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        self.poll(driver, delay, |driver, delay| {
            Ok(!self.copy_in_progress(driver, delay, crc)?)
        })
    }

    /// Current accumulator threshold, 0..=3
    pub fn read_threshold<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<u8, Error<W::Error>> {
        Ok(self.read_page_checked(driver, delay, 0, crc)?.threshold())
    }

    /// Sets the current accumulator threshold
    ///
    /// Current measurement is paused while the threshold is written and
    /// resumed afterwards if it was running.
    pub fn write_threshold<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        threshold: u8,
        crc: CrcCheck,
    ) -> Result<(), Error<W::Error>> {
        if threshold > 3 {
            return Err(Error::BadParam);
        }
        let page = self.read_page_checked(driver, delay, 0, crc)?;
        let status = page.status();
        let mut raw = page.into_bytes();

        if status.is_iad_enabled() {
            raw[0] = status.with_iad_enabled(false).into();
            self.write_page(driver, delay, 0, &raw)?;
            self.wait_for_copy(driver, delay, crc)?;
        }

        raw[7] = threshold << 6;
        self.write_page(driver, delay, 0, &raw)?;

        if status.is_iad_enabled() {
            self.wait_for_copy(driver, delay, crc)?;
            raw[0] = status.into();
            self.write_page(driver, delay, 0, &raw)?;
        }
        Ok(())
    }

    /// Current accumulator register (page 1, byte 4)
    pub fn get_ica<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<u8, Error<W::Error>> {
        Ok(self.read_page_checked(driver, delay, 1, crc)?.ica())
    }

    /// Accumulated charge in ampere hours
    pub fn get_capacity<W: IoWire>(
        &self,
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        crc: CrcCheck,
    ) -> Result<f32, Error<W::Error>> {
        let ica = self.get_ica(driver, delay, crc)?;
        Ok(decode::capacity(ica, self.config.sense_resistor))
    }
}
