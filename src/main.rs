//! spilink - Configure a spidev device and exchange data with it
//!
//! Every command takes a backend string naming the driver and the device
//! configuration, for example:
//!
//! ```text
//! spilink transfer -b linux_spi:dev=/dev/spidev0.0,mode=3,speed=500000 -d "9f 00 00 00"
//! spilink read -b spidev:dev=/dev/spidev1.1,cs=high -n 4
//! spilink transfer -b dummy:loop=1 -d 55aa
//! ```

mod backends;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Action;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger, RUST_LOG still overrides the verbosity flags
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let (backend, action) = match cli.command {
        Commands::Transfer { backend, data } => (backend, Action::Transfer(data.0)),
        Commands::Write { backend, data } => (backend, Action::Write(data.0)),
        Commands::Read { backend, len } => (backend, Action::Read(len)),
        Commands::Config { backend } => {
            let params = backends::parse_backend(&backend)?;
            commands::show_config(params.name, &params.options);
            return Ok(());
        }
        Commands::ListBackends => {
            commands::list_backends();
            return Ok(());
        }
    };

    if let Some(rx) = backends::run_on_backend(&backend, &action)? {
        println!("{}", commands::format_hex(&rx));
    }

    Ok(())
}
