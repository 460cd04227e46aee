//! Simulated DS2438 on the far end of the wire
//!
//! The wire decodes slots from how long the master holds the line low, measured
//! on a [`Clock`] that is advanced by the same delays the driver issues.

use crate::crc::compute_crc8;
use crate::IoWire;
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

#[derive(Default)]
struct ClockState {
    now_us: u64,
    delays: Vec<u32>,
}

/// Delay that only advances simulated time and records each request
#[derive(Clone, Default)]
pub struct Clock(Rc<RefCell<ClockState>>);

impl Clock {
    pub fn now_us(&self) -> u64 {
        self.0.borrow().now_us
    }

    pub fn delays(&self) -> Vec<u32> {
        self.0.borrow().delays.clone()
    }
}

impl DelayNs for Clock {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().now_us += u64::from(ns / 1_000);
    }

    fn delay_us(&mut self, us: u32) {
        let mut state = self.0.borrow_mut();
        state.now_us += u64::from(us);
        state.delays.push(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms * 1_000);
    }
}

const TB: u8 = 1 << 4;
const NVB: u8 = 1 << 5;
const ADB: u8 = 1 << 6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Rom,
    Function,
    PageNumber(u8),
    WriteScratchpad { page: usize, index: usize },
}

pub struct SimDs2438 {
    pub connected: bool,
    pub rom: [u8; 8],
    pub memory: [[u8; 8]; 8],
    /// Page 0 recalls that still report a conversion as busy
    pub conversion_polls: u8,
    /// Page 0 recalls that still report an EEPROM copy as busy
    pub copy_polls: u8,
    /// Loaded into page 0 bytes 1-2 when a temperature conversion ends
    pub temperature: [u8; 2],
    /// Loaded into page 0 bytes 3-4 when a voltage conversion ends
    pub voltage: [u8; 2],
    pub corrupt_crc: bool,
    /// Every byte the device received, in order
    pub received: Vec<u8>,
    /// Pages committed by Copy Scratchpad, in order
    pub copies: Vec<u8>,
    pub resets: usize,
    /// Falling edges driven by the master
    pub edges: usize,
    scratchpad: [[u8; 8]; 8],
    phase: Phase,
    in_byte: u8,
    in_bits: u8,
    out: VecDeque<bool>,
    temperature_left: Option<u8>,
    voltage_left: Option<u8>,
    copy_left: u8,
}

impl Default for SimDs2438 {
    fn default() -> Self {
        let mut rom = [0x26, 0x4d, 0x1b, 0xa2, 0x01, 0x00, 0x00, 0x00];
        rom[7] = compute_crc8(&rom[..7]);
        SimDs2438 {
            connected: true,
            rom,
            memory: [[0; 8]; 8],
            conversion_polls: 1,
            copy_polls: 0,
            temperature: [0x00, 0x19],
            voltage: [0x88, 0x03],
            corrupt_crc: false,
            received: Vec::new(),
            copies: Vec::new(),
            resets: 0,
            edges: 0,
            scratchpad: [[0; 8]; 8],
            phase: Phase::Idle,
            in_byte: 0,
            in_bits: 0,
            out: VecDeque::new(),
            temperature_left: None,
            voltage_left: None,
            copy_left: 0,
        }
    }
}

impl SimDs2438 {
    pub fn with_clock(self, clock: &Clock) -> SimWire {
        SimWire {
            device: Rc::new(RefCell::new(self)),
            clock: clock.clone(),
            low_at: None,
            released_at: 0,
            slot_start: 0,
            slot: Slot::Idle,
        }
    }

    /// Returns whether a presence pulse follows
    fn on_reset(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        self.resets += 1;
        self.phase = Phase::Rom;
        self.in_byte = 0;
        self.in_bits = 0;
        self.out.clear();
        true
    }

    fn is_transmitting(&self) -> bool {
        !self.out.is_empty()
    }

    fn send_bit(&mut self) -> bool {
        self.out.pop_front().unwrap_or(true)
    }

    fn queue(&mut self, bytes: &[u8]) {
        for byte in bytes {
            for i in 0..8 {
                self.out.push_back(byte & (1 << i) != 0);
            }
        }
    }

    fn receive_bit(&mut self, bit: bool) {
        if !self.connected || self.phase == Phase::Idle {
            return;
        }
        if bit {
            self.in_byte |= 1 << self.in_bits;
        }
        self.in_bits += 1;
        if self.in_bits == 8 {
            let byte = self.in_byte;
            self.in_byte = 0;
            self.in_bits = 0;
            self.receive_byte(byte);
        }
    }

    fn receive_byte(&mut self, byte: u8) {
        self.received.push(byte);
        self.phase = match (self.phase, byte) {
            (Phase::Rom, 0x33) => {
                let rom = self.rom;
                self.queue(&rom);
                Phase::Idle
            }
            (Phase::Rom, 0xCC) => Phase::Function,
            (Phase::Function, 0x44) => {
                self.memory[0][0] |= TB;
                self.temperature_left = Some(self.conversion_polls);
                Phase::Idle
            }
            (Phase::Function, 0xB4) => {
                self.memory[0][0] |= ADB;
                self.voltage_left = Some(self.conversion_polls);
                Phase::Idle
            }
            (Phase::Function, 0xB8 | 0xBE | 0x4E | 0x48) => Phase::PageNumber(byte),
            (Phase::PageNumber(cmd), page) if page < 8 => self.page_command(cmd, page as usize),
            (Phase::WriteScratchpad { page, index }, _) => {
                if index < 8 {
                    self.scratchpad[page][index] = byte;
                }
                Phase::WriteScratchpad {
                    page,
                    index: index + 1,
                }
            }
            _ => Phase::Idle,
        };
    }

    fn page_command(&mut self, cmd: u8, page: usize) -> Phase {
        match cmd {
            0xB8 => {
                if page == 0 {
                    self.advance_busy();
                }
                self.scratchpad[page] = self.memory[page];
                Phase::Idle
            }
            0xBE => {
                let data = self.scratchpad[page];
                let mut crc = compute_crc8(&data);
                if self.corrupt_crc {
                    crc ^= 0x5A;
                }
                self.queue(&data);
                self.queue(&[crc]);
                Phase::Idle
            }
            0x4E => Phase::WriteScratchpad { page, index: 0 },
            0x48 => {
                self.copy(page);
                Phase::Idle
            }
            _ => Phase::Idle,
        }
    }

    fn copy(&mut self, page: usize) {
        let data = self.scratchpad[page];
        if page == 0 {
            // bytes 1-6 are measurement registers, status busy flags are read-only
            let memory = &mut self.memory[0];
            memory[0] = (memory[0] & (TB | NVB | ADB)) | (data[0] & 0x0F);
            memory[7] = data[7];
        } else {
            self.memory[page] = data;
        }
        if self.copy_polls > 0 {
            self.memory[0][0] |= NVB;
            self.copy_left = self.copy_polls;
        }
        self.copies.push(page as u8);
    }

    fn advance_busy(&mut self) {
        if self.copy_left > 0 {
            self.copy_left -= 1;
        } else {
            self.memory[0][0] &= !NVB;
        }

        match self.temperature_left {
            Some(0) => {
                self.memory[0][0] &= !TB;
                self.memory[0][1..3].copy_from_slice(&self.temperature);
                self.temperature_left = None;
            }
            Some(left) => self.temperature_left = Some(left - 1),
            None => {}
        }

        match self.voltage_left {
            Some(0) => {
                self.memory[0][0] &= !ADB;
                self.memory[0][3..5].copy_from_slice(&self.voltage);
                self.voltage_left = None;
            }
            Some(left) => self.voltage_left = Some(left - 1),
            None => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Idle,
    Presence,
    Read(bool),
}

pub struct SimWire {
    device: Rc<RefCell<SimDs2438>>,
    clock: Clock,
    low_at: Option<u64>,
    released_at: u64,
    slot_start: u64,
    slot: Slot,
}

impl SimWire {
    pub fn device(&self) -> Rc<RefCell<SimDs2438>> {
        self.device.clone()
    }

    fn level_high(&self) -> bool {
        if self.low_at.is_some() {
            return false;
        }
        let now = self.clock.now_us();
        match self.slot {
            Slot::Idle => true,
            Slot::Presence => !(15..=240).contains(&(now - self.released_at)),
            Slot::Read(bit) => bit || now - self.slot_start > 15,
        }
    }
}

impl IoWire for SimWire {
    type Error = Infallible;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level_high())
    }

    fn drive_low(&mut self) -> Result<(), Self::Error> {
        self.device.borrow_mut().edges += 1;
        self.low_at = Some(self.clock.now_us());
        self.slot = Slot::Idle;
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        let Some(start) = self.low_at.take() else {
            return Ok(());
        };
        let now = self.clock.now_us();
        let low_for = now - start;
        self.released_at = now;
        self.slot_start = start;

        let mut device = self.device.borrow_mut();
        self.slot = if low_for >= 480 {
            if device.on_reset() {
                Slot::Presence
            } else {
                Slot::Idle
            }
        } else if device.is_transmitting() {
            Slot::Read(device.send_bit())
        } else {
            device.receive_bit(low_for < 15);
            Slot::Idle
        };
        Ok(())
    }
}
