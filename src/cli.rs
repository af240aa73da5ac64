//! CLI argument parsing

use bttag_core::config::parse_number;
use bttag_core::{BtAddress, TagFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Generate dynamic help text for the tag argument
fn tag_help() -> String {
    format!(
        "Tag backend to use [available: {}]",
        bttag_writer::tag_names_short()
    )
}

#[derive(Parser)]
#[command(name = "bttag")]
#[command(author, version, about = "Bluetooth pairing NFC tag writer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Tag information options shared across commands
///
/// Flags override the values loaded from `--info`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct InfoArgs {
    /// Tag information file (TOML format)
    #[arg(long)]
    pub info: Option<PathBuf>,

    /// Bluetooth device address (XX:XX:XX:XX:XX:XX)
    #[arg(short, long)]
    pub address: Option<BtAddress>,

    /// Device display name
    #[arg(short, long)]
    pub name: Option<String>,

    /// 24-bit class of device (hex, e.g. 0x240404, or decimal)
    #[arg(long, value_parser = parse_number)]
    pub device_class: Option<u32>,

    /// Legacy pairing PIN
    #[arg(long)]
    pub pin: Option<String>,

    /// Lock the tag after writing
    #[arg(long)]
    pub read_only: bool,

    /// NDEF layout: simplified or handover
    #[arg(long)]
    pub format: Option<TagFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write pairing data to a tag
    Write {
        /// Tag backend to use
        #[arg(short, long, help = tag_help())]
        tag: String,

        #[command(flatten)]
        info: InfoArgs,

        /// Seconds to wait before cancelling the write
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Print the bytes that would be written, as hex
    Encode {
        #[command(flatten)]
        info: InfoArgs,

        /// Tag capacity in bytes (unbounded if not specified)
        #[arg(long, value_parser = parse_number)]
        capacity: Option<u32>,

        /// Print the bare NDEF message instead of the TLV framed payload
        #[arg(long)]
        raw: bool,
    },

    /// Decode pairing data read from a tag
    Decode {
        /// Tag contents as hex
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        hex: Option<String>,

        /// Binary file with the tag contents
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print as a TOML tag information file
        #[arg(long)]
        toml: bool,
    },

    /// List supported tag backends
    ListTags,
}
