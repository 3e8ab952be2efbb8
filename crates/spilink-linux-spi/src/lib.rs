//! spilink-linux-spi - Linux spidev support
//!
//! This crate provides the driver for Linux spidev character devices at
//! `/dev/spidevX.Y`, where X is the bus number and Y is the chip select.
//!
//! # Example
//!
//! ```no_run
//! use spilink_core::SpiSession;
//! use spilink_linux_spi::LinuxSpidev;
//!
//! let mut spi = SpiSession::new(LinuxSpidev::new());
//! spi.set_max_clock_hz(4_000_000)?;
//! spi.open("/dev/spidev0.0")?;
//!
//! let mut id = [0u8; 4];
//! spi.transfer(Some(&[0x9F, 0, 0, 0][..]), Some(&mut id[..]))?;
//! println!("JEDEC ID: {:02X} {:02X} {:02X}", id[1], id[2], id[3]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - May require adding user to `spi` group or using udev rules

pub mod device;

pub use device::{LinuxSpidev, SpidevHandle};
