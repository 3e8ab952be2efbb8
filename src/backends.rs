//! Backend registration and dispatch
//!
//! A backend string has the form `name` or `name:key1=value1,key2=value2`.
//! The name picks the driver; the options become the session configuration.

use crate::commands::{self, Action};
use spilink_core::{parse_options, split_options, SessionOptions};

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "Simulated device for testing (loop=1 echoes data back)",
    });

    #[cfg(feature = "linux-spi")]
    backends.push(BackendInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev interface (dev=/dev/spidevX.Y,mode=<0-3>,speed=<Hz>)",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let backends = available_backends();

    if backends.is_empty() {
        return "No backends available (recompile with backend features enabled)".to_string();
    }

    let mut help = String::from("Available backends:\n");
    for b in &backends {
        help.push_str(&format!("  {:12} - {}\n", b.name, b.description));
        if !b.aliases.is_empty() {
            help.push_str(&format!("  {:12}   aliases: {}\n", "", b.aliases.join(", ")));
        }
    }
    help.push_str(
        "\nOptions: dev, mode, cs=low|high|none, bits, speed, spispeed, delay, \
         bit_order=msb|lsb, lsb, 3wire, loop\n",
    );

    help
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}

/// Resolve a name or alias to the canonical backend name
pub fn find_backend(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.iter().any(|a| *a == name))
        .map(|b| b.name)
}

/// Parsed backend string
#[derive(Debug)]
pub struct BackendParams {
    /// Canonical backend name
    pub name: &'static str,
    /// Device path and configuration
    pub options: SessionOptions,
}

/// Parse a backend string into name and session options
pub fn parse_backend(s: &str) -> Result<BackendParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    let name = find_backend(name).ok_or_else(|| format!("Unknown backend: {}", name))?;

    let pairs = split_options(opts_str)?;
    let options =
        parse_options(&pairs).map_err(|e| format!("Invalid {} parameters: {}", name, e))?;

    Ok(BackendParams { name, options })
}

/// Open the backend, run the action and close the device again
///
/// Returns the received bytes for actions that read.
pub fn run_on_backend(
    backend: &str,
    action: &Action,
) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    let params = parse_backend(backend)?;

    match params.name {
        #[cfg(feature = "dummy")]
        "dummy" => run_dummy(params.options, action),

        #[cfg(feature = "linux-spi")]
        "linux_spi" => run_linux_spi(params.options, action),

        other => Err(format!("Unknown backend: {}", other).into()),
    }
}

#[cfg(feature = "dummy")]
fn run_dummy(
    mut options: SessionOptions,
    action: &Action,
) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    use spilink_core::SpiSession;
    use spilink_dummy::DummySpi;

    log::info!("Opening dummy SPI device...");

    if options.device.is_none() {
        options.device = Some("dummy0".to_string());
    }

    let session = SpiSession::from_options(DummySpi::new_default(), options);
    commands::run(session, action)
}

#[cfg(feature = "linux-spi")]
fn run_linux_spi(
    options: SessionOptions,
    action: &Action,
) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    use spilink_core::{Error, SpiSession};
    use spilink_linux_spi::LinuxSpidev;

    log::info!("Opening Linux SPI device...");

    let session = SpiSession::from_options(LinuxSpidev::new(), options);
    commands::run(session, action).map_err(|e| {
        if let Some(Error::OpenFailed { .. }) = e.downcast_ref::<Error>() {
            format!(
                "Failed to open Linux SPI device: {}\n\
                 Make sure the device exists and you have read/write permissions.\n\
                 You may need to: sudo usermod -aG spi $USER",
                e
            )
            .into()
        } else {
            e
        }
    })
}
