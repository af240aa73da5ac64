//! bttag - Write Bluetooth pairing data to NFC tags
//!
//! A phone touching the tag reads the device address, name and class of
//! device and can start pairing without discovery.
//!
//! # Architecture
//!
//! - `bttag-core` builds the payload (BSSP, NDEF, TLV) and holds one writer
//!   per tag technology
//! - `bttag-writer` runs a write on a background thread and reports a
//!   status code, and opens tags by backend name
//! - `bttag-dummy` emulates tags in memory for testing without a reader

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Write { tag, info, timeout } => {
            let info = commands::load_info(&info)?;
            commands::run_write(&tag, &info, Duration::from_secs(timeout))
        }
        Commands::Encode {
            info,
            capacity,
            raw,
        } => {
            let info = commands::load_info(&info)?;
            commands::run_encode(&info, capacity.map(|c| c as usize), raw)
        }
        Commands::Decode { hex, input, toml } => {
            commands::run_decode(hex.as_deref(), input.as_deref(), toml)
        }
        Commands::ListTags => {
            commands::list_tags();
            Ok(())
        }
    }
}
