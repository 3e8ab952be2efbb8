//! `key=value` option parsing
//!
//! Backends are selected on the command line with strings such as
//! `linux_spi:dev=/dev/spidev0.0,mode=3,speed=500000`. The part after the
//! colon is split into pairs by the caller and turned into a
//! [`SessionOptions`] here.

use crate::config::{BitOrder, ChipSelect, DeviceConfiguration};
use crate::error::{Error, Result};

/// Device path plus the configuration to apply when opening it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: Option<String>,
    /// Configuration pushed at open
    pub config: DeviceConfiguration,
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid(format!("Invalid {} value: {}", key, value))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid(format!("Invalid {} value: {}", key, value)))
}

/// Parse session options from a list of key-value pairs
///
/// Recognized keys:
///
/// - `dev=/dev/spidev0.0` - device path
/// - `mode=0` - clock mode 0-3
/// - `cs=low|high|none` - chip select polarity
/// - `bits=8` - bits per word
/// - `speed=1000000` - clock speed in Hz
/// - `spispeed=1000` - clock speed in kHz
/// - `delay=10` - inter-word delay in microseconds
/// - `bit_order=msb|lsb`, or `lsb=1`
/// - `3wire=1` - half duplex
/// - `loop=1` - loopback
///
/// Unknown keys are logged and skipped.
pub fn parse_options(options: &[(&str, &str)]) -> Result<SessionOptions> {
    let mut parsed = SessionOptions::default();
    let config = &mut parsed.config;

    for (key, value) in options {
        match *key {
            "dev" => {
                parsed.device = Some(value.to_string());
            }
            "mode" => {
                config.set_clock_mode(parse_num(key, value)?)?;
            }
            "cs" => {
                let cs = match *value {
                    "low" => ChipSelect::ActiveLow,
                    "high" => ChipSelect::ActiveHigh,
                    "none" => ChipSelect::None,
                    _ => {
                        return Err(Error::invalid(format!(
                            "Invalid cs value: {} (expected low, high or none)",
                            value
                        )))
                    }
                };
                config.set_chip_select(cs);
            }
            "bits" => {
                config.set_word_size_bits(parse_num(key, value)?)?;
            }
            "speed" => {
                config.set_max_clock_hz(parse_num(key, value)?)?;
            }
            "spispeed" => {
                let speed_khz: u32 = parse_num(key, value)?;
                let speed_hz = speed_khz
                    .checked_mul(1000)
                    .ok_or_else(|| Error::invalid(format!("spispeed too large: {}", value)))?;
                config.set_max_clock_hz(speed_hz)?;
            }
            "delay" => {
                config.set_inter_word_delay_us(parse_num(key, value)?)?;
            }
            "bit_order" => {
                let order = match *value {
                    "msb" => BitOrder::MsbFirst,
                    "lsb" => BitOrder::LsbFirst,
                    _ => {
                        return Err(Error::invalid(format!(
                            "Invalid bit_order value: {} (expected msb or lsb)",
                            value
                        )))
                    }
                };
                config.set_bit_order(order);
            }
            "lsb" => {
                let order = if parse_bool(key, value)? {
                    BitOrder::LsbFirst
                } else {
                    BitOrder::MsbFirst
                };
                config.set_bit_order(order);
            }
            "3wire" => {
                config.set_half_duplex(parse_bool(key, value)?);
            }
            "loop" => {
                config.set_loopback(parse_bool(key, value)?);
            }
            _ => {
                log::warn!("spi: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(parsed)
}

/// Split `key=value,key=value` into pairs
pub fn split_options(s: &str) -> Result<Vec<(&str, &str)>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|opt| {
            opt.split_once('=').ok_or_else(|| {
                Error::invalid(format!(
                    "Invalid parameter format: '{}' (expected key=value)",
                    opt
                ))
            })
        })
        .collect()
}
