//! Device session
//!
//! `SpiSession` owns at most one open driver handle. Configuration is pushed
//! to the driver when the device is opened; from then until `close()` the
//! numeric settings are locked. The boolean toggles (half duplex, loopback,
//! bit order) stay writable and are re-pushed immediately while open.

use crate::config::{BitOrder, ChipSelect, DeviceConfiguration};
use crate::driver::{SpiDriver, SpiHandle, Transfer};
use crate::error::{Error, Result, Setting};
use crate::options::SessionOptions;

enum State<H> {
    Closed,
    Open { path: String, handle: H },
}

/// A single SPI device: its configuration and open/closed lifecycle
pub struct SpiSession<D: SpiDriver> {
    driver: D,
    config: DeviceConfiguration,
    device: Option<String>,
    state: State<D::Handle>,
}

impl<D: SpiDriver> SpiSession<D> {
    /// Create a closed session with the default configuration
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, DeviceConfiguration::default())
    }

    /// Create a closed session with the given configuration
    pub fn with_config(driver: D, config: DeviceConfiguration) -> Self {
        Self {
            driver,
            config,
            device: None,
            state: State::Closed,
        }
    }

    /// Create a closed session from parsed options
    ///
    /// The device path from the options is remembered for
    /// [`SpiSession::open_configured`].
    pub fn from_options(driver: D, options: SessionOptions) -> Self {
        let mut session = Self::with_config(driver, options.config);
        session.device = options.device;
        session
    }

    /// Current configuration
    pub fn config(&self) -> &DeviceConfiguration {
        &self.config
    }

    /// Whether a device handle is held
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    /// Path of the open device, if any
    pub fn path(&self) -> Option<&str> {
        match &self.state {
            State::Open { path, .. } => Some(path),
            State::Closed => None,
        }
    }

    fn ensure_closed(&self) -> Result<()> {
        if self.is_open() {
            return Err(Error::IllegalState("cannot be called once device is opened"));
        }
        Ok(())
    }

    /// Set the clock mode (0-3); only while closed
    pub fn set_clock_mode(&mut self, mode: u8) -> Result<()> {
        self.ensure_closed()?;
        self.config.set_clock_mode(mode)
    }

    /// Set the chip select polarity; only while closed
    pub fn set_chip_select(&mut self, cs: ChipSelect) -> Result<()> {
        self.ensure_closed()?;
        self.config.set_chip_select(cs);
        Ok(())
    }

    /// Set bits per word; only while closed
    pub fn set_word_size_bits(&mut self, bits: u8) -> Result<()> {
        self.ensure_closed()?;
        self.config.set_word_size_bits(bits)
    }

    /// Set the maximum clock speed; only while closed
    pub fn set_max_clock_hz(&mut self, hz: u32) -> Result<()> {
        self.ensure_closed()?;
        self.config.set_max_clock_hz(hz)
    }

    /// Set the inter-word delay; only while closed
    pub fn set_inter_word_delay_us(&mut self, delay_us: u16) -> Result<()> {
        self.ensure_closed()?;
        self.config.set_inter_word_delay_us(delay_us)
    }

    /// Enable or disable 3-wire mode
    pub fn set_half_duplex(&mut self, enabled: bool) -> Result<()> {
        self.update_mode(|config| config.set_half_duplex(enabled))
    }

    /// Enable or disable loopback
    pub fn set_loopback(&mut self, enabled: bool) -> Result<()> {
        self.update_mode(|config| config.set_loopback(enabled))
    }

    /// Select MSB-first or LSB-first word order
    pub fn set_bit_order(&mut self, order: BitOrder) -> Result<()> {
        self.update_mode(|config| config.set_bit_order(order))
    }

    /// Apply a toggle and, when open, push the new mode byte right away
    fn update_mode(&mut self, apply: impl FnOnce(&mut DeviceConfiguration)) -> Result<()> {
        let mut updated = self.config.clone();
        apply(&mut updated);

        if let State::Open { handle, .. } = &mut self.state {
            let mode = updated.mode_byte();
            handle
                .write_mode(mode)
                .map_err(|source| Error::ConfigurationRejected {
                    setting: Setting::Mode,
                    source,
                })?;
            log::debug!("spi: Updated mode to 0x{:02X}", mode);
        }

        self.config = updated;
        Ok(())
    }

    /// Open the device at `path` and push the configuration to it
    pub fn open(&mut self, path: &str) -> Result<()> {
        self.ensure_closed()
            .map_err(|_| Error::IllegalState("device is already open"))?;

        log::debug!("spi: Opening device {}", path);

        let mut handle = self.driver.open(path).map_err(|e| Error::OpenFailed {
            path: path.to_string(),
            source: e,
        })?;

        // On error the handle is dropped here, so nothing stays half-open
        push_config(&mut handle, &self.config)?;

        log::info!(
            "spi: Opened {} (mode={}, bits={}, speed={} kHz)",
            path,
            self.config.clock_mode(),
            self.config.word_size_bits(),
            self.config.max_clock_hz() / 1000
        );

        self.state = State::Open {
            path: path.to_string(),
            handle,
        };
        Ok(())
    }

    /// Open the device path given in the session options
    pub fn open_configured(&mut self) -> Result<()> {
        let device = self
            .device
            .clone()
            .ok_or_else(|| Error::invalid("no device specified, use dev=/dev/spidevX.Y"))?;
        self.open(&device)
    }

    /// Release the device handle; does nothing if already closed
    pub fn close(&mut self) {
        if let State::Open { path, handle } = std::mem::replace(&mut self.state, State::Closed) {
            drop(handle);
            log::info!("spi: Closed {}", path);
        }
    }

    /// Perform one full-duplex exchange
    ///
    /// Empty slices count as absent. At least one buffer must be present,
    /// and when both are they must be the same length. Returns the driver's
    /// status value, normally the number of bytes transferred.
    pub fn transfer(&mut self, write: Option<&[u8]>, read: Option<&mut [u8]>) -> Result<usize> {
        let State::Open { handle, .. } = &mut self.state else {
            return Err(Error::IllegalState("device not opened"));
        };

        let tx = write.filter(|buf| !buf.is_empty());
        let rx = read.filter(|buf| !buf.is_empty());

        let len = match (&tx, &rx) {
            (None, None) => return Err(Error::invalid("both buffers cannot be empty")),
            (Some(tx), Some(rx)) if tx.len() != rx.len() => {
                return Err(Error::invalid("read and write buffers must be same length"))
            }
            (Some(tx), _) => tx.len(),
            (None, Some(rx)) => rx.len(),
        };

        if u32::try_from(len).is_err() {
            return Err(Error::invalid(format!("transfer of {} bytes is too long", len)));
        }
        if let Some(max) = handle.max_transfer_len() {
            if len > max {
                return Err(Error::invalid(format!(
                    "transfer of {} bytes exceeds driver limit of {} bytes",
                    len, max
                )));
            }
        }

        let mut xfer = Transfer::new(
            tx,
            rx,
            self.config.max_clock_hz(),
            self.config.inter_word_delay_us(),
            self.config.word_size_bits(),
        )
        .map_err(|e| Error::invalid(e.to_string()))?;

        log::trace!("spi: Transfer {} bytes at {} Hz", len, xfer.speed_hz());

        handle.transfer(&mut xfer).map_err(Error::TransferFailed)
    }

    /// Write-only transfer; received data is discarded
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.transfer(Some(data), None)
    }

    /// Read-only transfer; zeros are shifted out
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.transfer(None, Some(buf))
    }

    /// Full-duplex transfer returning a receive buffer the size of `data`
    pub fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut rx = vec![0u8; data.len()];
        self.transfer(Some(data), Some(&mut rx))?;
        Ok(rx)
    }
}

/// Push mode, word size and clock speed, in that order
fn push_config<H: SpiHandle>(handle: &mut H, config: &DeviceConfiguration) -> Result<()> {
    let mode = config.mode_byte();
    handle
        .write_mode(mode)
        .map_err(|source| Error::ConfigurationRejected {
            setting: Setting::Mode,
            source,
        })?;
    log::debug!("spi: Set mode 0x{:02X}", mode);

    let bits = config.word_size_bits();
    handle
        .write_bits_per_word(bits)
        .map_err(|source| Error::ConfigurationRejected {
            setting: Setting::BitsPerWord,
            source,
        })?;
    log::debug!("spi: Set bits per word {}", bits);

    let speed = config.max_clock_hz();
    handle
        .write_max_speed_hz(speed)
        .map_err(|source| Error::ConfigurationRejected {
            setting: Setting::MaxSpeedHz,
            source,
        })?;
    log::debug!("spi: Set max speed {} Hz", speed);

    Ok(())
}
