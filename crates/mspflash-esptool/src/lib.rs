//! mspflash-esptool - esptool backend for mspflash
//!
//! Provides [`EsptoolRunner`], a [`mspflash_core::ToolRunner`] that starts
//! esptool as a child process, and serial port discovery helpers.
//!
//! # Example
//!
//! ```ignore
//! use mspflash_esptool::EsptoolRunner;
//!
//! let mut runner = EsptoolRunner::new(&["esptool.py"])?;
//! let info = mspflash_core::probe::probe(&mut runner, "/dev/ttyUSB0")?;
//! ```

pub mod error;
mod ports;
mod runner;

pub use error::{EsptoolError, Result};
pub use ports::{check_port, list_ports, PortInfo};
pub use runner::EsptoolRunner;
