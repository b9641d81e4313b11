//! Transports and the capability-tagged device handle
//!
//! A device is reached through exactly one transport capability. The
//! capability is fixed when the [`DeviceHandle`] is built; callers never
//! switch strategies on the same handle.
//!
//! Register access over the passthrough transports is encoded by the
//! [`ScsiMemory`] and [`SmpMemory`] adapters, so everything above this
//! module only ever talks to [`RegisterAccess`].

pub mod scsi;
pub mod smp;
mod traits;

use core::fmt;

use crate::error::{Error, Result};

pub use scsi::ScsiMemory;
pub use smp::SmpMemory;
pub use traits::*;

/// Transport capability of a device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Direct memory-mapped registers
    RegisterAccess,
    /// SCSI generic passthrough
    ScsiPassthrough,
    /// SMP passthrough through a SAS controller
    SmpPassthrough,
    /// Anything else
    Unrecognized,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RegisterAccess => "register access",
            Self::ScsiPassthrough => "SCSI passthrough",
            Self::SmpPassthrough => "SMP passthrough",
            Self::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

/// Borrowed reference to a physical chip, tagged with its transport
///
/// The caller owns the underlying transport for the duration of a call.
/// Calls against the same transport must be serialized by the caller.
pub enum DeviceHandle<'a> {
    /// Direct register access
    RegisterAccess(&'a mut dyn RegisterAccess),
    /// SCSI generic passthrough
    ScsiPassthrough(&'a mut dyn ScsiPassthrough),
    /// SMP passthrough
    SmpPassthrough(&'a mut dyn SmpPassthrough),
    /// A handle type this crate has no strategy for
    Unrecognized,
}

impl<'a> DeviceHandle<'a> {
    /// Capability this handle was built with
    pub fn capability(&self) -> Capability {
        match self {
            Self::RegisterAccess(_) => Capability::RegisterAccess,
            Self::ScsiPassthrough(_) => Capability::ScsiPassthrough,
            Self::SmpPassthrough(_) => Capability::SmpPassthrough,
            Self::Unrecognized => Capability::Unrecognized,
        }
    }

    /// Run `f` against the register-equivalent path of this handle
    ///
    /// Passthrough handles are wrapped in their memory adapter. A SCSI
    /// handle must pass the flash pre-check first
    /// ([`ScsiMemory::check_boot_image`]); `f` is not run otherwise.
    pub fn with_registers<R>(
        self,
        f: impl FnOnce(&mut dyn RegisterAccess) -> Result<R>,
    ) -> Result<R> {
        match self {
            Self::RegisterAccess(regs) => f(regs),
            Self::ScsiPassthrough(dev) => {
                let mut mem = ScsiMemory::new(dev);
                mem.check_boot_image()?;
                f(&mut mem)
            }
            Self::SmpPassthrough(dev) => f(&mut SmpMemory::new(dev)),
            Self::Unrecognized => Err(Error::Unsupported),
        }
    }
}

impl fmt::Debug for DeviceHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceHandle").field(&self.capability()).finish()
    }
}
