#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod fmt;

mod command;
mod config;
pub mod crc;
pub mod decode;
mod driver;
mod ds2438;
mod iowire;
mod page;
mod result;
mod rom;
#[cfg(test)]
mod sim;

pub use command::{Command, OpCode};
pub use config::{Config, PollPolicy};
pub use driver::{timing, Driver};
pub use ds2438::{Command as Ds2438Command, CrcCheck, Ds2438};
pub use iowire::{Inverted, IoWire};
pub use page::{InputSource, InvalidInputSource, Page, Status, LAST_PAGE};
pub use result::Error;
pub use rom::{Rom, RomParseError};
