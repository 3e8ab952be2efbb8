//! Device configuration
//!
//! `DeviceConfiguration` holds the typed settings for one SPI device. The
//! kernel expects clock mode, chip select, bit order and the 3-wire/loopback
//! toggles packed into a single mode byte; that packing only happens at the
//! driver boundary through [`DeviceConfiguration::mode_byte`] and
//! [`DeviceConfiguration::apply_mode_byte`].

use crate::error::{Error, Result};
use bitflags::bitflags;
use std::fmt;

/// Default SPI clock speed in Hz (1 MHz)
pub const DEFAULT_MAX_CLOCK_HZ: u32 = 1_000_000;

/// Default word size in bits
pub const DEFAULT_WORD_SIZE_BITS: u8 = 8;

/// Raw constants for hosts that pass settings as plain integers
pub mod consts {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;

    /// Chip select asserted low
    pub const CS_LOW: u8 = 0x00;
    /// Chip select asserted high
    pub const CS_HIGH: u8 = 0x04;
    /// Chip select not driven by the controller
    pub const NO_CS: u8 = 0x40;

    /// Most significant bit first
    pub const MSB_FIRST: u8 = 0x00;
    /// Least significant bit first
    pub const LSB_FIRST: u8 = 0x08;
}

bitflags! {
    /// spidev mode byte as written with `SPI_IOC_WR_MODE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u8 {
        /// Clock phase
        const CPHA       = 0x01;
        /// Clock polarity
        const CPOL       = 0x02;
        /// Chip select active high
        const CS_HIGH    = 0x04;
        /// Shift out least significant bit first
        const LSB_FIRST  = 0x08;
        /// Shared SI/SO line (half duplex)
        const THREE_WIRE = 0x10;
        /// Loopback mode
        const LOOP       = 0x20;
        /// No chip select
        const NO_CS      = 0x40;
        /// Slave pulls low to pause
        const READY      = 0x80;
    }
}

/// Clock polarity and phase combination
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClockMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0 = consts::MODE_0,
    /// CPOL=0, CPHA=1
    Mode1 = consts::MODE_1,
    /// CPOL=1, CPHA=0
    Mode2 = consts::MODE_2,
    /// CPOL=1, CPHA=1
    Mode3 = consts::MODE_3,
}

impl ClockMode {
    /// All four clock modes in numeric order
    pub const ALL: [ClockMode; 4] = [Self::Mode0, Self::Mode1, Self::Mode2, Self::Mode3];

    /// Numeric mode value (0-3)
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Clock polarity (idle level of SCLK)
    pub const fn cpol(self) -> bool {
        matches!(self, Self::Mode2 | Self::Mode3)
    }

    /// Clock phase (sampling edge)
    pub const fn cpha(self) -> bool {
        matches!(self, Self::Mode1 | Self::Mode3)
    }

    fn flags(self) -> ModeFlags {
        ModeFlags::from_bits_truncate(self.value())
    }
}

impl TryFrom<u8> for ClockMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            consts::MODE_0 => Ok(Self::Mode0),
            consts::MODE_1 => Ok(Self::Mode1),
            consts::MODE_2 => Ok(Self::Mode2),
            consts::MODE_3 => Ok(Self::Mode3),
            _ => Err(Error::invalid(format!(
                "clock mode must be one of MODE_0..MODE_3, got {}",
                value
            ))),
        }
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Chip select polarity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChipSelect {
    /// Asserted low (the usual case)
    #[default]
    ActiveLow,
    /// Asserted high
    ActiveHigh,
    /// Not driven by the controller
    None,
}

impl ChipSelect {
    /// Map a raw constant to a polarity
    ///
    /// Anything other than `CS_HIGH` or `NO_CS` selects active-low.
    pub const fn from_raw(value: u8) -> Self {
        match value {
            consts::CS_HIGH => Self::ActiveHigh,
            consts::NO_CS => Self::None,
            _ => Self::ActiveLow,
        }
    }

    /// Raw constant for this polarity
    pub const fn raw(self) -> u8 {
        match self {
            Self::ActiveLow => consts::CS_LOW,
            Self::ActiveHigh => consts::CS_HIGH,
            Self::None => consts::NO_CS,
        }
    }
}

impl fmt::Display for ChipSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveLow => write!(f, "active-low"),
            Self::ActiveHigh => write!(f, "active-high"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Bit order on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

impl BitOrder {
    /// Raw constant for this bit order
    pub const fn raw(self) -> u8 {
        match self {
            Self::MsbFirst => consts::MSB_FIRST,
            Self::LsbFirst => consts::LSB_FIRST,
        }
    }
}

impl fmt::Display for BitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MsbFirst => write!(f, "msb-first"),
            Self::LsbFirst => write!(f, "lsb-first"),
        }
    }
}

/// Settings applied to a device when it is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfiguration {
    clock_mode: ClockMode,
    chip_select: ChipSelect,
    bit_order: BitOrder,
    word_size_bits: u8,
    max_clock_hz: u32,
    inter_word_delay_us: u16,
    half_duplex: bool,
    loopback: bool,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            clock_mode: ClockMode::Mode0,
            chip_select: ChipSelect::ActiveLow,
            bit_order: BitOrder::MsbFirst,
            word_size_bits: DEFAULT_WORD_SIZE_BITS,
            max_clock_hz: DEFAULT_MAX_CLOCK_HZ,
            inter_word_delay_us: 0,
            half_duplex: false,
            loopback: false,
        }
    }
}

impl DeviceConfiguration {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock polarity and phase
    pub fn clock_mode(&self) -> ClockMode {
        self.clock_mode
    }

    /// Chip select polarity
    pub fn chip_select(&self) -> ChipSelect {
        self.chip_select
    }

    /// Word bit order
    pub fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    /// Bits per word
    pub fn word_size_bits(&self) -> u8 {
        self.word_size_bits
    }

    /// Maximum clock speed in Hz
    pub fn max_clock_hz(&self) -> u32 {
        self.max_clock_hz
    }

    /// Delay in microseconds, sent as `spi_ioc_transfer.delay_usecs` (after the
    /// last word, before chip select is released), not `word_delay_usecs`
    pub fn inter_word_delay_us(&self) -> u16 {
        self.inter_word_delay_us
    }

    /// Whether 3-wire (shared MOSI/MISO) mode is enabled
    pub fn half_duplex(&self) -> bool {
        self.half_duplex
    }

    /// Whether the controller loops MOSI back to MISO
    pub fn loopback(&self) -> bool {
        self.loopback
    }

    /// Set the clock mode from its raw value (0-3)
    pub fn set_clock_mode(&mut self, mode: u8) -> Result<()> {
        self.clock_mode = ClockMode::try_from(mode)?;
        Ok(())
    }

    /// Set the chip select polarity
    pub fn set_chip_select(&mut self, cs: ChipSelect) {
        self.chip_select = cs;
    }

    /// Set MSB-first or LSB-first word order
    pub fn set_bit_order(&mut self, order: BitOrder) {
        self.bit_order = order;
    }

    /// Set the word size; zero is rejected
    pub fn set_word_size_bits(&mut self, bits: u8) -> Result<()> {
        if bits == 0 {
            return Err(Error::invalid("word size must be greater than 0"));
        }
        self.word_size_bits = bits;
        Ok(())
    }

    /// Set the maximum clock speed; zero is rejected
    pub fn set_max_clock_hz(&mut self, hz: u32) -> Result<()> {
        if hz == 0 {
            return Err(Error::invalid("max clock speed must be greater than 0"));
        }
        self.max_clock_hz = hz;
        Ok(())
    }

    /// Set the delay fed to `spi_ioc_transfer.delay_usecs`
    ///
    /// Zero is rejected even though it is the default: an explicit delay
    /// must be positive.
    pub fn set_inter_word_delay_us(&mut self, delay_us: u16) -> Result<()> {
        if delay_us == 0 {
            return Err(Error::invalid("inter-word delay must be greater than 0"));
        }
        self.inter_word_delay_us = delay_us;
        Ok(())
    }

    /// Enable or disable 3-wire mode
    pub fn set_half_duplex(&mut self, enabled: bool) {
        self.half_duplex = enabled;
    }

    /// Enable or disable loopback
    pub fn set_loopback(&mut self, enabled: bool) {
        self.loopback = enabled;
    }

    /// Builder-style clock mode
    pub fn with_clock_mode(mut self, mode: ClockMode) -> Self {
        self.clock_mode = mode;
        self
    }

    /// Builder-style chip select
    pub fn with_chip_select(mut self, cs: ChipSelect) -> Self {
        self.chip_select = cs;
        self
    }

    /// Pack the mode-related fields into the spidev mode byte
    pub fn mode_flags(&self) -> ModeFlags {
        let mut flags = self.clock_mode.flags();
        match self.chip_select {
            ChipSelect::ActiveLow => {}
            ChipSelect::ActiveHigh => flags |= ModeFlags::CS_HIGH,
            ChipSelect::None => flags |= ModeFlags::NO_CS,
        }
        flags.set(ModeFlags::LSB_FIRST, self.bit_order == BitOrder::LsbFirst);
        flags.set(ModeFlags::THREE_WIRE, self.half_duplex);
        flags.set(ModeFlags::LOOP, self.loopback);
        flags
    }

    /// Raw mode byte for `SPI_IOC_WR_MODE`
    pub fn mode_byte(&self) -> u8 {
        self.mode_flags().bits()
    }

    /// Replace all mode-related fields with those decoded from a raw mode byte
    ///
    /// Unknown bits are ignored. `NO_CS` takes precedence over `CS_HIGH`.
    pub fn apply_mode_byte(&mut self, byte: u8) {
        let flags = ModeFlags::from_bits_truncate(byte);
        let cpol = flags.contains(ModeFlags::CPOL);
        let cpha = flags.contains(ModeFlags::CPHA);
        self.clock_mode = match (cpol, cpha) {
            (false, false) => ClockMode::Mode0,
            (false, true) => ClockMode::Mode1,
            (true, false) => ClockMode::Mode2,
            (true, true) => ClockMode::Mode3,
        };
        self.chip_select = if flags.contains(ModeFlags::NO_CS) {
            ChipSelect::None
        } else if flags.contains(ModeFlags::CS_HIGH) {
            ChipSelect::ActiveHigh
        } else {
            ChipSelect::ActiveLow
        };
        self.bit_order = if flags.contains(ModeFlags::LSB_FIRST) {
            BitOrder::LsbFirst
        } else {
            BitOrder::MsbFirst
        };
        self.half_duplex = flags.contains(ModeFlags::THREE_WIRE);
        self.loopback = flags.contains(ModeFlags::LOOP);
    }
}

impl fmt::Display for DeviceConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} cs={} order={} bits={} speed={} Hz delay={} us",
            self.clock_mode,
            self.chip_select,
            self.bit_order,
            self.word_size_bits,
            self.max_clock_hz,
            self.inter_word_delay_us
        )?;
        if self.half_duplex {
            write!(f, " 3wire")?;
        }
        if self.loopback {
            write!(f, " loop")?;
        }
        Ok(())
    }
}
