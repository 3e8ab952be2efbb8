//! Linux spidev driver implementation
//!
//! This module provides `LinuxSpidev`, which implements the `SpiDriver`
//! boundary using Linux's spidev interface.

use spilink_core::driver::{SpiDriver, SpiHandle, Transfer};

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    pub const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer (same on 32 and 64-bit)
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    ///
    /// SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(spi_ioc_transfer)])
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr), _IOC_WRITE = 1
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

const _: () = assert!(std::mem::size_of::<SpiIocTransfer>() == ioctl::SPI_IOC_TRANSFER_SIZE);

impl SpiIocTransfer {
    fn from_transfer(xfer: &mut Transfer<'_>) -> io::Result<Self> {
        let len = xfer.len();
        let tx_len = xfer.tx().map(<[u8]>::len);
        let rx_len = xfer.rx_mut().map(|buf| buf.len());
        if tx_len.is_some_and(|n| n != len) || rx_len.is_some_and(|n| n != len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer length does not match transfer length",
            ));
        }
        let len = u32::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "transfer too long"))?;

        Ok(Self {
            tx_buf: xfer.tx().map_or(0, |buf| buf.as_ptr() as u64),
            rx_buf: xfer.rx_mut().map_or(0, |buf| buf.as_mut_ptr() as u64),
            len,
            speed_hz: xfer.speed_hz(),
            delay_usecs: xfer.delay_us(),
            bits_per_word: xfer.bits_per_word(),
            ..Default::default()
        })
    }
}

fn errno_to_io(e: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

/// Linux spidev driver
///
/// Opens `/dev/spidevX.Y` character devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxSpidev;

impl LinuxSpidev {
    pub fn new() -> Self {
        Self
    }
}

impl SpiDriver for LinuxSpidev {
    type Handle = SpidevHandle;

    fn open(&mut self, path: &str) -> io::Result<SpidevHandle> {
        SpidevHandle::open(path)
    }
}

/// An open spidev device
///
/// The device is closed when the handle is dropped.
pub struct SpidevHandle {
    /// File handle for spidev device
    file: File,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
}

impl SpidevHandle {
    /// Open a spidev device read/write
    pub fn open(path: &str) -> io::Result<Self> {
        log::debug!("linux_spi: Opening device {}", path);

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            max_kernel_buf_size,
        })
    }
}

impl SpiHandle for SpidevHandle {
    fn write_mode(&mut self, mode: u8) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe { ioctl::spi_ioc_wr_mode(fd, &mode) }.map_err(errno_to_io)?;
        Ok(())
    }

    fn write_bits_per_word(&mut self, bits: u8) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe { ioctl::spi_ioc_wr_bits_per_word(fd, &bits) }.map_err(errno_to_io)?;
        Ok(())
    }

    fn write_max_speed_hz(&mut self, hz: u32) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe { ioctl::spi_ioc_wr_max_speed_hz(fd, &hz) }.map_err(errno_to_io)?;
        Ok(())
    }

    /// Perform a single SPI_IOC_MESSAGE(1) exchange
    fn transfer(&mut self, xfer: &mut Transfer<'_>) -> io::Result<usize> {
        let fd = self.file.as_raw_fd();
        let msg = SpiIocTransfer::from_transfer(xfer)?;

        let ioctl_num = ioctl::spi_ioc_message(1);
        // The buffers behind tx_buf/rx_buf are borrowed by `xfer` for the
        // duration of this call.
        let ret = unsafe { libc::ioctl(fd, ioctl_num, &msg as *const SpiIocTransfer) };

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(ret as usize)
    }

    fn max_transfer_len(&self) -> Option<usize> {
        Some(self.max_kernel_buf_size)
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Some(size) = parse_buf_size(&content) {
            log::debug!("linux_spi: Using buffer size {} from sysfs", size);
            return size;
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

fn parse_buf_size(content: &str) -> Option<usize> {
    content.trim().parse::<usize>().ok().filter(|&size| size > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_struct_layout() {
        assert_eq!(std::mem::size_of::<SpiIocTransfer>(), 32);
        assert_eq!(std::mem::offset_of!(SpiIocTransfer, len), 16);
        assert_eq!(std::mem::offset_of!(SpiIocTransfer, delay_usecs), 24);
        assert_eq!(std::mem::offset_of!(SpiIocTransfer, bits_per_word), 26);
    }

    #[test]
    fn test_message_ioctl_number() {
        // SPI_IOC_MESSAGE(1) on Linux
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6B00);
    }

    #[test]
    fn test_transfer_conversion() {
        let tx = [1u8, 2, 3];
        let mut xfer = Transfer::new(Some(&tx[..]), None, 500_000, 7, 8).unwrap();
        let msg = SpiIocTransfer::from_transfer(&mut xfer).unwrap();
        assert_eq!(msg.tx_buf, tx.as_ptr() as u64);
        assert_eq!(msg.rx_buf, 0);
        assert_eq!(msg.len, 3);
        assert_eq!(msg.speed_hz, 500_000);
        // The configured delay is the post-transfer delay, not per-word spacing
        assert_eq!(msg.delay_usecs, 7);
        assert_eq!(msg.word_delay_usecs, 0);
        assert_eq!(msg.bits_per_word, 8);
        assert_eq!(msg.cs_change, 0);
    }

    #[test]
    fn test_transfer_conversion_read_only() {
        let mut rx = [0u8; 4];
        let rx_ptr = rx.as_mut_ptr() as u64;
        let mut xfer = Transfer::new(None, Some(&mut rx[..]), 1_000_000, 0, 8).unwrap();
        let msg = SpiIocTransfer::from_transfer(&mut xfer).unwrap();
        assert_eq!(msg.tx_buf, 0);
        assert_eq!(msg.rx_buf, rx_ptr);
        assert_eq!(msg.len, 4);
    }

    #[test]
    fn test_short_rx_buffer_never_reaches_kernel() {
        let tx = [0u8; 4096];
        let mut rx = [0u8; 1];
        let err = Transfer::new(Some(&tx[..]), Some(&mut rx[..]), 1_000_000, 0, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_buf_size() {
        assert_eq!(parse_buf_size("4096\n"), Some(4096));
        assert_eq!(parse_buf_size("0"), None);
        assert_eq!(parse_buf_size("junk"), None);
    }

    #[test]
    fn test_open_missing_device() {
        let mut driver = LinuxSpidev::new();
        assert!(driver.open("/dev/spidev-does-not-exist").is_err());
    }
}
