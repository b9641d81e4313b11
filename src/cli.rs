//! CLI argument parsing

use clap::{Parser, Subcommand};
use sashal_core::image::RegionType;
use std::path::PathBuf;

/// Parse a flash table region name (bl, fw1, fw2, config, ...)
fn parse_region(s: &str) -> Result<RegionType, String> {
    RegionType::from_short_name(s).ok_or_else(|| {
        format!(
            "Unknown region '{}' (expected bl, fw1, fw2, config, log, oem, coredump or mfg)",
            s
        )
    })
}

/// Generate dynamic help text for the transport argument
fn transport_help() -> String {
    format!(
        "Transport to use, as name[:key=value,...] [available: {}]",
        sashal_device::transport_names_short()
    )
}

#[derive(Parser)]
#[command(name = "sashal")]
#[command(author, version, about = "Broadcom SAS expander diagnostics", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the expander behind a transport
    Qualify {
        /// Transport to use
        #[arg(short, long, help = transport_help())]
        device: String,

        /// Print the identity as TOML
        #[arg(long)]
        toml: bool,
    },

    /// Show the active firmware version
    Firmware {
        /// Transport to use
        #[arg(short, long, help = transport_help())]
        device: String,

        /// Show the state of every firmware-bearing region
        #[arg(long)]
        all: bool,
    },

    /// Show the boot loader flash table
    FlashTable {
        /// Transport to use
        #[arg(short, long, help = transport_help())]
        device: String,
    },

    /// List the chained images of a region
    Chain {
        /// Transport to use
        #[arg(short, long, help = transport_help())]
        device: String,

        /// Region to walk (bl, fw1, fw2)
        #[arg(short, long, value_parser = parse_region)]
        region: RegionType,
    },

    /// Read a flash region to a file
    ReadRegion {
        /// Transport to use
        #[arg(short, long, help = transport_help())]
        device: String,

        /// Region to read
        #[arg(short, long, value_parser = parse_region)]
        region: RegionType,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Qualify every device in an inventory file
    Scan {
        /// Inventory file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List available transports
    ListTransports,

    /// List supported expander chips
    ListChips {
        /// Filter by family (margay, cobra, cub)
        #[arg(short, long)]
        family: Option<String>,
    },
}
