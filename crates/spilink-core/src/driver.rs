//! Driver boundary
//!
//! These traits describe the character-device driver a session talks to.
//! A driver opens handles; a handle accepts the three scalar configuration
//! pushes and the bulk transfer command. Releasing a handle is done by
//! dropping it.
//!
//! ## Example: a driver that discards everything
//!
//! ```
//! use spilink_core::driver::{SpiDriver, SpiHandle, Transfer};
//! use std::io;
//!
//! struct Null;
//!
//! impl SpiHandle for Null {
//!     fn write_mode(&mut self, _mode: u8) -> io::Result<()> { Ok(()) }
//!     fn write_bits_per_word(&mut self, _bits: u8) -> io::Result<()> { Ok(()) }
//!     fn write_max_speed_hz(&mut self, _hz: u32) -> io::Result<()> { Ok(()) }
//!     fn transfer(&mut self, xfer: &mut Transfer<'_>) -> io::Result<usize> {
//!         Ok(xfer.len())
//!     }
//! }
//!
//! struct NullDriver;
//!
//! impl SpiDriver for NullDriver {
//!     type Handle = Null;
//!     fn open(&mut self, _path: &str) -> io::Result<Null> { Ok(Null) }
//! }
//! ```

use std::io;

/// One atomic full-duplex exchange
///
/// `tx` of `None` shifts out zeros; `rx` of `None` discards what is shifted
/// in. When present, both buffers are exactly [`Transfer::len`] bytes long.
#[derive(Debug)]
pub struct Transfer<'a> {
    tx: Option<&'a [u8]>,
    rx: Option<&'a mut [u8]>,
    len: usize,
    speed_hz: u32,
    delay_us: u16,
    bits_per_word: u8,
}

impl<'a> Transfer<'a> {
    /// Build an exchange over the given buffers
    ///
    /// The length is taken from the buffers. Fails with
    /// [`io::ErrorKind::InvalidInput`] when both buffers are absent or when
    /// they differ in length.
    pub fn new(
        tx: Option<&'a [u8]>,
        rx: Option<&'a mut [u8]>,
        speed_hz: u32,
        delay_us: u16,
        bits_per_word: u8,
    ) -> io::Result<Self> {
        let len = match (tx.as_ref(), rx.as_ref()) {
            (Some(t), Some(r)) if t.len() != r.len() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("tx buffer is {} bytes, rx buffer is {}", t.len(), r.len()),
                ));
            }
            (Some(t), _) => t.len(),
            (None, Some(r)) => r.len(),
            (None, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "transfer needs at least one buffer",
                ));
            }
        };

        Ok(Self {
            tx,
            rx,
            len,
            speed_hz,
            delay_us,
            bits_per_word,
        })
    }

    /// Data to shift out
    pub fn tx(&self) -> Option<&[u8]> {
        self.tx
    }

    /// Buffer to shift into
    pub fn rx_mut(&mut self) -> Option<&mut [u8]> {
        self.rx.as_deref_mut()
    }

    /// Whether received data is kept
    pub fn has_rx(&self) -> bool {
        self.rx.is_some()
    }

    /// Number of bytes exchanged
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the exchange moves no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clock speed for this exchange
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Delay after the last word before chip select is released
    /// (`spi_ioc_transfer.delay_usecs`)
    pub fn delay_us(&self) -> u16 {
        self.delay_us
    }

    /// Word size for this exchange
    pub fn bits_per_word(&self) -> u8 {
        self.bits_per_word
    }
}

/// An open device handle
pub trait SpiHandle {
    /// Write the packed mode byte
    fn write_mode(&mut self, mode: u8) -> io::Result<()>;

    /// Write the word size
    fn write_bits_per_word(&mut self, bits: u8) -> io::Result<()>;

    /// Write the maximum clock speed
    fn write_max_speed_hz(&mut self, hz: u32) -> io::Result<()>;

    /// Perform one atomic exchange, returning the driver's status value
    /// (bytes transferred)
    fn transfer(&mut self, xfer: &mut Transfer<'_>) -> io::Result<usize>;

    /// Largest exchange the driver accepts in one call, if known
    fn max_transfer_len(&self) -> Option<usize> {
        None
    }
}

/// Something that can open device handles by path
pub trait SpiDriver {
    /// Handle type produced by [`SpiDriver::open`]
    type Handle: SpiHandle;

    /// Acquire a read-write handle for `path`
    fn open(&mut self, path: &str) -> io::Result<Self::Handle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_len_from_buffers() {
        let tx = [1u8, 2, 3];
        let xfer = Transfer::new(Some(&tx[..]), None, 1_000_000, 0, 8).unwrap();
        assert_eq!(xfer.len(), 3);
        assert!(!xfer.has_rx());

        let mut rx = [0u8; 5];
        let xfer = Transfer::new(None, Some(&mut rx[..]), 1_000_000, 0, 8).unwrap();
        assert_eq!(xfer.len(), 5);
        assert!(xfer.tx().is_none());
    }

    #[test]
    fn test_transfer_rejects_mismatched_buffers() {
        let tx = [0u8; 2];
        let mut rx = [0u8; 1];
        let err = Transfer::new(Some(&tx[..]), Some(&mut rx[..]), 1_000_000, 0, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let mut big = [0u8; 4096];
        let err = Transfer::new(Some(&tx[..]), Some(&mut big[..]), 1_000_000, 0, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_transfer_requires_a_buffer() {
        let err = Transfer::new(None, None, 1_000_000, 0, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
