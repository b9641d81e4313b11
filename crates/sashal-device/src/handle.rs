//! ExpanderHandle - an opened transport plus its name
//!
//! The handle owns exactly one transport. Its capability is fixed when the
//! transport is opened; every call borrows it as a fresh
//! [`DeviceHandle`] for the duration of that call.

use sashal_core::transport::{Capability, RegisterAccess, ScsiPassthrough, SmpPassthrough};
use sashal_core::DeviceHandle;

/// Owned transport of an opened expander
pub enum Transport {
    /// Direct register access
    Registers(Box<dyn RegisterAccess>),
    /// SCSI generic passthrough
    Scsi(Box<dyn ScsiPassthrough>),
    /// SMP passthrough
    Smp(Box<dyn SmpPassthrough>),
}

impl Transport {
    /// Capability this transport provides
    pub fn capability(&self) -> Capability {
        match self {
            Self::Registers(_) => Capability::RegisterAccess,
            Self::Scsi(_) => Capability::ScsiPassthrough,
            Self::Smp(_) => Capability::SmpPassthrough,
        }
    }
}

/// An opened expander
///
/// The handle is not shareable: concurrent use of one transport must be
/// serialized by the owner, which `&mut self` enforces.
pub struct ExpanderHandle {
    name: String,
    transport: Transport,
}

impl ExpanderHandle {
    /// Wrap an opened transport
    pub fn new(name: impl Into<String>, transport: Transport) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    /// Transport string the handle was opened from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capability of the owned transport
    pub fn capability(&self) -> Capability {
        self.transport.capability()
    }

    /// Borrow the transport as a capability-tagged device handle
    pub fn device_handle(&mut self) -> DeviceHandle<'_> {
        match &mut self.transport {
            Transport::Registers(regs) => DeviceHandle::RegisterAccess(regs.as_mut()),
            Transport::Scsi(dev) => DeviceHandle::ScsiPassthrough(dev.as_mut()),
            Transport::Smp(dev) => DeviceHandle::SmpPassthrough(dev.as_mut()),
        }
    }
}

impl std::fmt::Debug for ExpanderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpanderHandle")
            .field("name", &self.name)
            .field("capability", &self.capability())
            .finish()
    }
}
