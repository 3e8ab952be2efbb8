//! CLI argument parsing

use crate::backends;
use clap::{Parser, Subcommand};

/// Parse a hex byte string such as "55aa", "0x55 0xAA" or "55:aa"
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let mut digits = String::new();
    for token in s.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        digits.push_str(token);
    }

    if !digits.is_ascii() {
        return Err(format!("Invalid hex string '{}'", s));
    }
    if digits.is_empty() {
        return Err("No data given".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{}'", s));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("Invalid hex value '{}': {}", &digits[i..i + 2], e))
        })
        .collect()
}

/// Bytes given on the command line as hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexData(pub Vec<u8>);

fn parse_hex_data(s: &str) -> Result<HexData, String> {
    parse_hex_bytes(s).map(HexData)
}

/// Generate dynamic help text for the backend argument
fn backend_help() -> String {
    format!(
        "Backend to use, e.g. linux_spi:dev=/dev/spidev0.0,mode=0 [available: {}]",
        backends::backend_names_short()
    )
}

#[derive(Parser)]
#[command(name = "spilink")]
#[command(author, version, about = "SPI device exchange tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full-duplex transfer: send data and print what was received
    Transfer {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,

        /// Bytes to send, in hex
        #[arg(short, long, value_parser = parse_hex_data)]
        data: HexData,
    },

    /// Send data and discard what is received
    Write {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,

        /// Bytes to send, in hex
        #[arg(short, long, value_parser = parse_hex_data)]
        data: HexData,
    },

    /// Clock in bytes while sending zeros
    Read {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,

        /// Number of bytes to read
        #[arg(short = 'n', long)]
        len: usize,
    },

    /// Show the configuration a backend string resolves to
    Config {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,
    },

    /// List available backends
    ListBackends,
}
