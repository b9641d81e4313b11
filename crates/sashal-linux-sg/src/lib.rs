//! sashal-linux-sg - Linux passthrough transports
//!
//! This crate reaches Broadcom SAS expanders through the two kernel
//! interfaces that expose them:
//!
//! - `/dev/sgN`: SCSI generic node of the expander's enclosure processor
//!   (SG_IO v3). Provides [`ScsiPassthrough`](sashal_core::transport::ScsiPassthrough).
//! - `/dev/bsg/expander-H:N`: SAS transport-class bsg node of an expander
//!   behind an HBA (sg_io_v4). Provides
//!   [`SmpPassthrough`](sashal_core::transport::SmpPassthrough).
//!
//! # Usage with sashal CLI
//!
//! ```bash
//! # Qualify an expander through its SES processor
//! sashal qualify -d sg:dev=/dev/sg3
//!
//! # Qualify an expander through the HBA
//! sashal qualify -d bsg:dev=/dev/bsg/expander-6:0,timeout=5000
//! ```
//!
//! # System Requirements
//!
//! - Read/write access to the device node (usually root or the `disk` group)
//! - `CONFIG_CHR_DEV_SG` for sg nodes, `CONFIG_BLK_DEV_BSG` and
//!   `CONFIG_SCSI_SAS_ATTRS` for expander bsg nodes

pub mod bsg;
pub mod error;
pub mod sg;
pub mod sysfs;

// Re-exports
pub use bsg::{LinuxBsg, LinuxBsgConfig};
pub use error::{LinuxSgError, Result};
pub use sg::{LinuxSg, LinuxSgConfig, DEFAULT_TIMEOUT_MS};

/// Open an sg node and return a boxed ScsiPassthrough
///
/// # Example Options
///
/// - `dev=/dev/sg3` - Required: device path
/// - `timeout=5000` - Optional: command timeout in ms (default: 30000)
pub fn open_sg(
    options: &[(&str, &str)],
) -> std::result::Result<
    Box<dyn sashal_core::transport::ScsiPassthrough>,
    Box<dyn std::error::Error>,
> {
    let config = sg::parse_options(options)?;
    let dev = LinuxSg::open(&config)?;
    Ok(Box::new(dev))
}

/// Open a bsg node and return a boxed SmpPassthrough
///
/// # Example Options
///
/// - `dev=/dev/bsg/expander-6:0` - Required: device path
/// - `timeout=5000` - Optional: request timeout in ms (default: 30000)
pub fn open_bsg(
    options: &[(&str, &str)],
) -> std::result::Result<
    Box<dyn sashal_core::transport::SmpPassthrough>,
    Box<dyn std::error::Error>,
> {
    let config = bsg::parse_options(options)?;
    let dev = LinuxBsg::open(&config)?;
    Ok(Box::new(dev))
}
