//! sashal-core - Core library for Broadcom SAS expander diagnostics
//!
//! This crate identifies Broadcom SAS expander chips (the "Cobra/Cub" and
//! "Margay" families) across several transports and recovers the active
//! firmware version from the chained flash image format those chips use.
//! It is `no_std` compatible but requires `alloc`.
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error`, serde)
//!
//! # Example
//!
//! ```ignore
//! use sashal_core::{qualify_expander, DeviceHandle, Qualification};
//!
//! fn identify(regs: &mut dyn sashal_core::transport::RegisterAccess) {
//!     match qualify_expander(DeviceHandle::RegisterAccess(regs)) {
//!         Ok(Qualification::Success(id)) => println!("{}", id),
//!         Ok(Qualification::Ignore) => println!("not an expander we know"),
//!         Err(e) => println!("qualification failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod error;
pub mod flash;
pub mod identity;
pub mod image;
pub mod qualify;
pub mod regs;
pub mod sas;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result, Status};
pub use flash::{get_active_firmware_version, upload_bootloader_flash_table, ActiveFirmware};
pub use identity::{ExpanderIdentity, FwVersion, SasAddress};
pub use qualify::{qualify_expander, Qualification};
pub use transport::DeviceHandle;
