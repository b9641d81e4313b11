//! sashal - Broadcom SAS expander diagnostics
//!
//! Identifies Broadcom SAS expanders and reports the firmware they boot.
//!
//! # Architecture
//!
//! An expander is reached through one of three transport capabilities:
//! - **Register access** (emulator, offline flash dumps) - direct 32-bit
//!   reads of the expander address space
//! - **SCSI passthrough** (`/dev/sgN`) - vendor READ/WRITE BUFFER commands
//!   to the expander's enclosure processor
//! - **SMP passthrough** (`/dev/bsg/expander-H:N`) - SMP functions through
//!   the HBA
//!
//! Every command goes through the capability-tagged device handle, so the
//! same qualification and flash navigation code serves all of them.

mod cli;
mod commands;
mod inventory;

use clap::Parser;
use cli::{Cli, Commands};
use sashal_device::open_device;

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
        Commands::Qualify { device, toml } => {
            let mut expander = open_device(&device)?;
            commands::run_qualify(&mut expander, toml)
        }
        Commands::Firmware { device, all } => {
            let mut expander = open_device(&device)?;
            commands::run_firmware(&mut expander, all)
        }
        Commands::FlashTable { device } => {
            let mut expander = open_device(&device)?;
            commands::run_flash_table(&mut expander)
        }
        Commands::Chain { device, region } => {
            let mut expander = open_device(&device)?;
            commands::run_chain(&mut expander, region)
        }
        Commands::ReadRegion {
            device,
            region,
            output,
        } => {
            let mut expander = open_device(&device)?;
            commands::run_read_region(&mut expander, region, &output)
        }
        Commands::Scan { config } => commands::run_scan(&config),
        Commands::ListTransports => {
            commands::list_transports();
            Ok(())
        }
        Commands::ListChips { family } => {
            commands::list_chips(family.as_deref());
            Ok(())
        }
    }
}
