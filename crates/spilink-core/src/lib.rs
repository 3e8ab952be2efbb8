//! spilink-core - SPI device configuration and session state machine
//!
//! This crate holds everything about driving one SPI device that does not
//! depend on a particular operating system interface:
//!
//! - [`DeviceConfiguration`]: clock mode, chip select polarity, bit order,
//!   word size, clock speed, inter-word delay and the 3-wire/loopback toggles
//! - [`SpiSession`]: the open/closed lifecycle and the full-duplex transfer
//! - [`driver`]: the traits a character-device driver implements
//!
//! # Example
//!
//! ```ignore
//! use spilink_core::{ChipSelect, SpiSession};
//! use spilink_linux_spi::LinuxSpidev;
//!
//! let mut spi = SpiSession::new(LinuxSpidev::new());
//! spi.set_clock_mode(3)?;
//! spi.set_chip_select(ChipSelect::ActiveHigh)?;
//! spi.open("/dev/spidev0.0")?;
//!
//! let rx = spi.exchange(&[0x9F, 0x00, 0x00, 0x00])?;
//! println!("JEDEC ID: {:02X} {:02X} {:02X}", rx[1], rx[2], rx[3]);
//!
//! spi.close();
//! ```

#![warn(rust_2018_idioms)]

pub mod config;
pub mod driver;
pub mod error;
pub mod options;
pub mod session;

pub use config::{consts, BitOrder, ChipSelect, ClockMode, DeviceConfiguration, ModeFlags};
pub use driver::{SpiDriver, SpiHandle, Transfer};
pub use error::{Error, Result, Setting};
pub use options::{parse_options, split_options, SessionOptions};
pub use session::SpiSession;
