//! Command implementations
//!
//! Each command opens the session from its backend options, performs one
//! transfer and closes the device again.

use spilink_core::{SessionOptions, SpiDriver, SpiSession};

/// A single transfer to run against a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Full-duplex: send these bytes and keep what comes back
    Transfer(Vec<u8>),
    /// Send these bytes, discard what comes back
    Write(Vec<u8>),
    /// Clock in this many bytes
    Read(usize),
}

/// Open the session, run the action and close it
///
/// Returns the received bytes for `Transfer` and `Read`.
pub fn run<D: SpiDriver>(
    mut session: SpiSession<D>,
    action: &Action,
) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    session.open_configured()?;
    log::debug!("Configuration: {}", session.config());

    let result = match action {
        Action::Transfer(data) => session.exchange(data).map(Some),
        Action::Write(data) => session.write(data).map(|n| {
            log::info!("Wrote {} bytes", n);
            None
        }),
        Action::Read(len) => {
            let mut buf = vec![0u8; *len];
            session.read(&mut buf).map(|_| Some(buf))
        }
    };

    session.close();
    Ok(result?)
}

/// Format bytes as space-separated hex
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the configuration a backend string resolves to
pub fn show_config(name: &str, options: &SessionOptions) {
    let config = &options.config;

    println!("Backend:        {}", name);
    println!(
        "Device:         {}",
        options.device.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Clock mode:     {} (CPOL={}, CPHA={})",
        config.clock_mode(),
        config.clock_mode().cpol() as u8,
        config.clock_mode().cpha() as u8
    );
    println!("Chip select:    {}", config.chip_select());
    println!("Bit order:      {}", config.bit_order());
    println!("Word size:      {} bits", config.word_size_bits());
    println!("Max clock:      {} Hz", config.max_clock_hz());
    println!("Delay:          {} us", config.inter_word_delay_us());
    println!("3-wire:         {}", config.half_duplex());
    println!("Loopback:       {}", config.loopback());
    println!("Mode byte:      0x{:02X}", config.mode_byte());
}

/// List all available backends
pub fn list_backends() {
    print!("{}", crate::backends::backend_help());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x55, 0xAA, 0x01]), "55 aa 01");
        assert_eq!(format_hex(&[]), "");
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_run_closes_device() {
        use spilink_core::parse_options;
        use spilink_dummy::DummySpi;

        let dummy = DummySpi::new_default();
        let options = parse_options(&[("dev", "/dev/spidev0.0"), ("loop", "1")]).unwrap();
        let session = SpiSession::from_options(dummy.clone(), options);

        let rx = run(session, &Action::Transfer(vec![1, 2, 3])).unwrap();
        assert_eq!(rx, Some(vec![1, 2, 3]));
        assert_eq!(dummy.open_handles(), 0);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_run_reports_empty_write() {
        use spilink_dummy::DummySpi;

        let options = SessionOptions {
            device: Some("/dev/spidev0.0".into()),
            ..Default::default()
        };
        let session = SpiSession::from_options(DummySpi::new_default(), options);
        assert!(run(session, &Action::Write(Vec::new())).is_err());
    }
}
