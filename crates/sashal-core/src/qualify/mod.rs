//! Device qualification
//!
//! Decides whether a device handle points at a supported Broadcom SAS
//! expander and, if so, builds its [`ExpanderIdentity`]. Each transport
//! capability has its own strategy; the capability is taken from the
//! handle and never switched mid-call.
//!
//! Until a chip signature has matched, every failure means "not ours" and
//! is reported as [`Qualification::Ignore`] so callers can move on to the
//! next device. Once the chip is known, failures are real errors.

mod registers;
mod scsi;
mod smp;

use crate::error::{Result, Status};
use crate::identity::ExpanderIdentity;
use crate::transport::DeviceHandle;

/// Outcome of a successful qualification call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Qualification {
    /// Supported expander; the identity is complete
    Success(ExpanderIdentity),
    /// Not a device this crate handles
    Ignore,
}

impl Qualification {
    /// Caller-facing status
    pub fn status(&self) -> Status {
        match self {
            Self::Success(_) => Status::Success,
            Self::Ignore => Status::Ignore,
        }
    }

    /// Identity, if qualified
    pub fn identity(&self) -> Option<&ExpanderIdentity> {
        match self {
            Self::Success(identity) => Some(identity),
            Self::Ignore => None,
        }
    }

    /// Consume into the identity, if qualified
    pub fn into_identity(self) -> Option<ExpanderIdentity> {
        match self {
            Self::Success(identity) => Some(identity),
            Self::Ignore => None,
        }
    }
}

/// Qualify the device behind `handle`
pub fn qualify_expander(handle: DeviceHandle<'_>) -> Result<Qualification> {
    let capability = handle.capability();
    log::debug!("qualify: {} handle", capability);

    let result = match handle {
        DeviceHandle::RegisterAccess(regs) => registers::qualify(regs),
        DeviceHandle::ScsiPassthrough(dev) => scsi::qualify(dev),
        DeviceHandle::SmpPassthrough(dev) => smp::qualify(dev),
        DeviceHandle::Unrecognized => Ok(Qualification::Ignore),
    };

    match &result {
        Ok(Qualification::Success(identity)) => log::info!("qualified {}", identity),
        Ok(Qualification::Ignore) => log::info!("{} device ignored", capability),
        Err(e) => log::warn!("{} qualification failed: {}", capability, e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_handle_ignored() {
        let q = qualify_expander(DeviceHandle::Unrecognized).unwrap();
        assert_eq!(q, Qualification::Ignore);
        assert_eq!(q.status(), Status::Ignore);
        assert!(q.identity().is_none());
    }
}
