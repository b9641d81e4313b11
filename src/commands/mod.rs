//! CLI command implementations
//!
//! Every command takes an opened [`ExpanderHandle`](sashal_device::ExpanderHandle)
//! and goes through the capability-tagged device handle, so the same code
//! serves register, SCSI and SMP transports.

mod firmware;
mod flash;
mod list;
mod qualify;
mod scan;

pub use firmware::run_firmware;
pub use flash::{run_chain, run_flash_table, run_read_region};
pub use list::{list_chips, list_transports};
pub use qualify::run_qualify;
pub use scan::run_scan;
