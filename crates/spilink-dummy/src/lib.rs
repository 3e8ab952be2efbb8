//! spilink-dummy - Simulated spidev driver for testing
//!
//! This crate provides a driver that behaves like a spidev device without
//! any hardware behind it. Every driver call is recorded so tests can check
//! what a session pushed, and failures can be injected at each step.
//!
//! With the loopback bit set in the last pushed mode byte, received data
//! mirrors transmitted data. Otherwise the receive buffer is filled with the
//! idle MISO level.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use spilink_core::driver::{SpiDriver, SpiHandle, Transfer};
use spilink_core::ModeFlags;

/// Driver call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// `write_mode`
    Mode,
    /// `write_bits_per_word`
    BitsPerWord,
    /// `write_max_speed_hz`
    MaxSpeedHz,
}

/// Configuration for the dummy driver
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Paths that fail to open
    pub missing_paths: Vec<String>,
    /// Push that the device refuses
    pub reject: Option<Push>,
    /// Fail every transfer
    pub fail_transfers: bool,
    /// Byte shifted in when loopback is off
    pub miso_idle: u8,
    /// Largest transfer accepted, if limited
    pub max_transfer_len: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            missing_paths: Vec::new(),
            reject: None,
            fail_transfers: false,
            miso_idle: 0xFF,
            max_transfer_len: None,
        }
    }
}

/// A recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Device opened
    Open(String),
    /// Mode byte written
    Mode(u8),
    /// Bits per word written
    BitsPerWord(u8),
    /// Clock speed written
    MaxSpeedHz(u32),
    /// Transfer performed (or attempted)
    Transfer {
        /// Transmitted bytes (zeros when there was no write buffer)
        tx: Vec<u8>,
        /// Whether a receive buffer was supplied
        has_rx: bool,
        /// Clock speed used
        speed_hz: u32,
        /// Delay used
        delay_us: u16,
        /// Word size used
        bits_per_word: u8,
    },
    /// Device closed
    Close(String),
}

#[derive(Debug, Default)]
struct Bus {
    config: DummyConfig,
    events: Vec<Event>,
    open_handles: usize,
}

/// Simulated driver
///
/// Clones share state, so a test can keep one clone while a session owns
/// another and inspect the recorded events afterwards.
#[derive(Debug, Clone, Default)]
pub struct DummySpi {
    bus: Rc<RefCell<Bus>>,
}

impl DummySpi {
    /// Create a dummy driver with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            bus: Rc::new(RefCell::new(Bus {
                config,
                ..Default::default()
            })),
        }
    }

    /// Create a dummy driver that opens any path and never fails
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Change the failure configuration
    pub fn configure(&self, f: impl FnOnce(&mut DummyConfig)) {
        f(&mut self.bus.borrow_mut().config);
    }

    /// All driver calls recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.bus.borrow().events.clone()
    }

    /// Transfers recorded so far
    pub fn transfers(&self) -> Vec<Event> {
        self.bus
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Transfer { .. }))
            .cloned()
            .collect()
    }

    /// Forget recorded events
    pub fn clear_events(&self) {
        self.bus.borrow_mut().events.clear();
    }

    /// Number of handles not yet dropped
    pub fn open_handles(&self) -> usize {
        self.bus.borrow().open_handles
    }
}

impl SpiDriver for DummySpi {
    type Handle = DummyHandle;

    fn open(&mut self, path: &str) -> io::Result<DummyHandle> {
        let mut bus = self.bus.borrow_mut();
        if bus.config.missing_paths.iter().any(|p| p == path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such device", path),
            ));
        }

        bus.open_handles += 1;
        bus.events.push(Event::Open(path.to_string()));
        log::debug!("dummy_spi: Opened {}", path);

        Ok(DummyHandle {
            bus: Rc::clone(&self.bus),
            path: path.to_string(),
            mode: ModeFlags::empty(),
        })
    }
}

/// Open handle on the simulated device
#[derive(Debug)]
pub struct DummyHandle {
    bus: Rc<RefCell<Bus>>,
    path: String,
    mode: ModeFlags,
}

impl DummyHandle {
    fn check(&self, push: Push) -> io::Result<()> {
        if self.bus.borrow().config.reject == Some(push) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{:?} rejected", push),
            ));
        }
        Ok(())
    }

    fn record(&self, event: Event) {
        self.bus.borrow_mut().events.push(event);
    }
}

impl SpiHandle for DummyHandle {
    fn write_mode(&mut self, mode: u8) -> io::Result<()> {
        self.check(Push::Mode)?;
        self.mode = ModeFlags::from_bits_truncate(mode);
        self.record(Event::Mode(mode));
        Ok(())
    }

    fn write_bits_per_word(&mut self, bits: u8) -> io::Result<()> {
        self.check(Push::BitsPerWord)?;
        self.record(Event::BitsPerWord(bits));
        Ok(())
    }

    fn write_max_speed_hz(&mut self, hz: u32) -> io::Result<()> {
        self.check(Push::MaxSpeedHz)?;
        self.record(Event::MaxSpeedHz(hz));
        Ok(())
    }

    fn transfer(&mut self, xfer: &mut Transfer<'_>) -> io::Result<usize> {
        let len = xfer.len();
        let rx_len = xfer.rx_mut().map(|buf| buf.len());
        if xfer.tx().is_some_and(|buf| buf.len() != len) || rx_len.is_some_and(|n| n != len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer length does not match transfer length",
            ));
        }

        let tx = xfer.tx().map_or_else(|| vec![0u8; len], <[u8]>::to_vec);
        let (fail, idle) = {
            let bus = self.bus.borrow();
            (bus.config.fail_transfers, bus.config.miso_idle)
        };

        self.record(Event::Transfer {
            tx: tx.clone(),
            has_rx: xfer.has_rx(),
            speed_hz: xfer.speed_hz(),
            delay_us: xfer.delay_us(),
            bits_per_word: xfer.bits_per_word(),
        });

        if fail {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "transfer failed"));
        }

        if let Some(rx) = xfer.rx_mut() {
            if self.mode.contains(ModeFlags::LOOP) {
                rx.copy_from_slice(&tx);
            } else {
                rx.fill(idle);
            }
        }

        Ok(len)
    }

    fn max_transfer_len(&self) -> Option<usize> {
        self.bus.borrow().config.max_transfer_len
    }
}

impl Drop for DummyHandle {
    fn drop(&mut self) {
        let mut bus = self.bus.borrow_mut();
        bus.open_handles -= 1;
        bus.events.push(Event::Close(self.path.clone()));
        log::debug!("dummy_spi: Closed {}", self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spilink_core::{parse_options, BitOrder, ChipSelect, ClockMode, Error, Setting, SpiSession};

    const DEV: &str = "/dev/spidev1.1";

    fn open_session(dummy: &DummySpi) -> SpiSession<DummySpi> {
        let mut spi = SpiSession::new(dummy.clone());
        spi.open(DEV).unwrap();
        spi
    }

    #[test]
    fn test_pushes_in_order() {
        let dummy = DummySpi::new_default();
        let mut spi = SpiSession::new(dummy.clone());
        spi.set_clock_mode(3).unwrap();
        spi.set_chip_select(ChipSelect::ActiveHigh).unwrap();
        spi.set_word_size_bits(16).unwrap();
        spi.set_max_clock_hz(500_000).unwrap();
        spi.open(DEV).unwrap();

        assert_eq!(
            dummy.events(),
            vec![
                Event::Open(DEV.into()),
                Event::Mode(0x07),
                Event::BitsPerWord(16),
                Event::MaxSpeedHz(500_000),
            ]
        );
    }

    #[test]
    fn test_defaults_used_for_transfer() {
        let dummy = DummySpi::new_default();
        let mut spi = open_session(&dummy);

        let mut rx = [0u8; 4];
        assert_eq!(
            spi.transfer(Some(&[1, 2, 3, 4][..]), Some(&mut rx[..])).unwrap(),
            4
        );

        let events = dummy.events();
        assert_eq!(events[1], Event::Mode(0));
        assert_eq!(events[2], Event::BitsPerWord(8));
        assert_eq!(events[3], Event::MaxSpeedHz(1_000_000));
        assert_eq!(
            events[4],
            Event::Transfer {
                tx: vec![1, 2, 3, 4],
                has_rx: true,
                speed_hz: 1_000_000,
                delay_us: 0,
                bits_per_word: 8,
            }
        );
    }

    #[test]
    fn test_loopback_round_trip() {
        let dummy = DummySpi::new_default();
        let mut spi = open_session(&dummy);

        spi.set_loopback(true).unwrap();
        assert_eq!(dummy.events().last(), Some(&Event::Mode(0x20)));

        let mut rx = [0u8; 2];
        spi.transfer(Some(&[0x55, 0xAA][..]), Some(&mut rx[..]))
            .unwrap();
        assert_eq!(rx, [0x55, 0xAA]);

        spi.set_loopback(false).unwrap();
        let rx = spi.exchange(&[0x55, 0xAA]).unwrap();
        assert_eq!(rx, vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_loopback_configured_before_open() {
        let dummy = DummySpi::new_default();
        let mut spi = SpiSession::new(dummy.clone());
        spi.set_loopback(true).unwrap();
        spi.open(DEV).unwrap();
        assert_eq!(spi.exchange(&[0x12, 0x34, 0x56]).unwrap(), vec![0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_write_only_discards_read_data() {
        let dummy = DummySpi::new_default();
        let mut spi = open_session(&dummy);
        spi.set_loopback(true).unwrap();

        assert_eq!(spi.write(&[9, 8, 7]).unwrap(), 3);
        match &dummy.transfers()[..] {
            [Event::Transfer { tx, has_rx, .. }] => {
                assert_eq!(tx, &vec![9, 8, 7]);
                assert!(!has_rx);
            }
            other => panic!("unexpected transfers: {:?}", other),
        }
    }

    #[test]
    fn test_read_only_shifts_zeros() {
        let dummy = DummySpi::new_default();
        let mut spi = open_session(&dummy);
        spi.set_loopback(true).unwrap();

        let mut buf = [0xEEu8; 5];
        assert_eq!(spi.read(&mut buf).unwrap(), 5);
        assert_eq!(buf, [0; 5]);
    }

    #[test]
    fn test_open_failure_is_not_latched() {
        let dummy = DummySpi::new(DummyConfig {
            missing_paths: vec!["/dev/spidev9.9".into()],
            ..Default::default()
        });
        let mut spi = SpiSession::new(dummy.clone());

        assert!(matches!(
            spi.open("/dev/spidev9.9"),
            Err(Error::OpenFailed { .. })
        ));
        assert!(!spi.is_open());
        assert_eq!(dummy.open_handles(), 0);

        spi.open(DEV).unwrap();
        assert!(spi.is_open());
        assert_eq!(dummy.open_handles(), 1);
    }

    #[test]
    fn test_rejected_push_releases_handle() {
        for (push, setting) in [
            (Push::Mode, Setting::Mode),
            (Push::BitsPerWord, Setting::BitsPerWord),
            (Push::MaxSpeedHz, Setting::MaxSpeedHz),
        ] {
            let dummy = DummySpi::new(DummyConfig {
                reject: Some(push),
                ..Default::default()
            });
            let mut spi = SpiSession::new(dummy.clone());

            match spi.open(DEV) {
                Err(Error::ConfigurationRejected { setting: s, .. }) => assert_eq!(s, setting),
                other => panic!("expected rejection, got {:?}", other),
            }
            assert!(!spi.is_open());
            assert_eq!(dummy.open_handles(), 0);
            assert_eq!(dummy.events().last(), Some(&Event::Close(DEV.into())));

            // Once the device accepts the push, opening works again
            dummy.configure(|c| c.reject = None);
            spi.open(DEV).unwrap();
        }
    }

    #[test]
    fn test_rejected_toggle_keeps_value() {
        let dummy = DummySpi::new_default();
        let mut spi = open_session(&dummy);
        dummy.configure(|c| c.reject = Some(Push::Mode));

        assert!(matches!(
            spi.set_half_duplex(true),
            Err(Error::ConfigurationRejected { .. })
        ));
        assert!(!spi.config().half_duplex());
        assert!(spi.is_open());
    }

    #[test]
    fn test_toggles_while_closed_are_not_pushed() {
        let dummy = DummySpi::new_default();
        let mut spi = SpiSession::new(dummy.clone());
        spi.set_bit_order(BitOrder::LsbFirst).unwrap();
        spi.set_half_duplex(true).unwrap();
        assert!(dummy.events().is_empty());

        spi.open(DEV).unwrap();
        assert_eq!(dummy.events()[1], Event::Mode(0x08 | 0x10));
    }

    #[test]
    fn test_transfer_failure_keeps_session_open() {
        let dummy = DummySpi::new(DummyConfig {
            fail_transfers: true,
            ..Default::default()
        });
        let mut spi = open_session(&dummy);

        assert!(matches!(
            spi.write(&[1, 2]),
            Err(Error::TransferFailed(_))
        ));
        assert!(spi.is_open());

        dummy.configure(|c| c.fail_transfers = false);
        assert_eq!(spi.write(&[1, 2]).unwrap(), 2);
    }

    #[test]
    fn test_transfer_uses_session_timing() {
        let dummy = DummySpi::new_default();
        let mut spi = SpiSession::new(dummy.clone());
        spi.set_max_clock_hz(250_000).unwrap();
        spi.set_inter_word_delay_us(15).unwrap();
        spi.set_word_size_bits(12).unwrap();
        spi.open(DEV).unwrap();
        spi.write(&[0xAB, 0xCD]).unwrap();

        assert_eq!(
            dummy.transfers(),
            vec![Event::Transfer {
                tx: vec![0xAB, 0xCD],
                has_rx: false,
                speed_hz: 250_000,
                delay_us: 15,
                bits_per_word: 12,
            }]
        );
    }

    #[test]
    fn test_transfer_limit_from_driver() {
        let dummy = DummySpi::new(DummyConfig {
            max_transfer_len: Some(8),
            ..Default::default()
        });
        let mut spi = open_session(&dummy);
        assert!(spi.write(&[0; 8]).is_ok());
        assert!(matches!(
            spi.write(&[0; 9]),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(dummy.transfers().len(), 1);
    }

    #[test]
    fn test_close_and_reopen_applies_new_config() {
        let dummy = DummySpi::new_default();
        let mut spi = open_session(&dummy);

        spi.close();
        spi.close();
        assert_eq!(dummy.open_handles(), 0);
        let closes = dummy
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Close(_)))
            .count();
        assert_eq!(closes, 1);

        spi.set_clock_mode(1).unwrap();
        dummy.clear_events();
        spi.open(DEV).unwrap();
        assert_eq!(dummy.events()[1], Event::Mode(0x01));
        assert_eq!(spi.config().clock_mode(), ClockMode::Mode1);
    }

    #[test]
    fn test_dropping_session_closes_device() {
        let dummy = DummySpi::new_default();
        {
            let _spi = open_session(&dummy);
            assert_eq!(dummy.open_handles(), 1);
        }
        assert_eq!(dummy.open_handles(), 0);
    }

    #[test]
    fn test_session_from_options() {
        let dummy = DummySpi::new_default();
        let options = parse_options(&[("dev", DEV), ("mode", "2"), ("loop", "1")]).unwrap();
        let mut spi = SpiSession::from_options(dummy.clone(), options);
        spi.open_configured().unwrap();

        assert_eq!(dummy.events()[0], Event::Open(DEV.into()));
        assert_eq!(dummy.events()[1], Event::Mode(0x02 | 0x20));
        assert_eq!(spi.exchange(&[0x5A]).unwrap(), vec![0x5A]);
    }

    #[test]
    fn test_handle_rejects_mismatched_buffers() {
        let mut dummy = DummySpi::new_default();
        let mut handle = dummy.open(DEV).unwrap();
        handle.write_mode(ModeFlags::LOOP.bits()).unwrap();

        let tx = [0x11u8, 0x22];
        let mut short = [0u8; 1];
        let err = Transfer::new(Some(&tx[..]), Some(&mut short[..]), 1_000_000, 0, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(dummy.transfers().is_empty());

        let mut rx = [0u8; 2];
        let mut xfer = Transfer::new(Some(&tx[..]), Some(&mut rx[..]), 1_000_000, 0, 8).unwrap();
        assert_eq!(handle.transfer(&mut xfer).unwrap(), 2);
        assert_eq!(rx, tx);
    }
}
