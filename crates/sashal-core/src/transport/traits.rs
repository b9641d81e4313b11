//! Transport trait definitions
//!
//! These are the primitives supplied by the OS/transport collaborators.
//! Every call is blocking; timeout and retry policy belong to the
//! implementation, not to the callers in this crate.

use core::fmt;

use crate::error::{Error, Result};

/// PCI function that hosts a device (or the HBA in front of it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct PciAddress {
    /// PCI segment/domain
    pub domain: u16,
    /// Bus number
    pub bus: u8,
    /// Device number (0-31)
    pub device: u8,
    /// Function number (0-7)
    pub function: u8,
}

impl PciAddress {
    /// Parse `DDDD:BB:DD.F` or `BB:DD.F` (hex fields, sysfs style)
    pub fn parse(s: &str) -> Option<Self> {
        let (head, function) = s.rsplit_once('.')?;
        let mut parts = head.rsplitn(3, ':');
        let device = parts.next()?;
        let bus = parts.next()?;
        let domain = parts.next().unwrap_or("0");

        let addr = Self {
            domain: u16::from_str_radix(domain, 16).ok()?,
            bus: u8::from_str_radix(bus, 16).ok()?,
            device: u8::from_str_radix(device, 16).ok()?,
            function: u8::from_str_radix(function, 16).ok()?,
        };
        if addr.device > 31 || addr.function > 7 {
            return None;
        }
        Some(addr)
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

/// Direct 32-bit register and memory access
///
/// Values are little-endian in the expander's address space: `read32(a)`
/// returns the word whose lowest byte is at address `a`.
pub trait RegisterAccess {
    /// Read a 32-bit word
    fn read32(&mut self, addr: u32) -> Result<u32>;

    /// Write a 32-bit word
    fn write32(&mut self, addr: u32, value: u32) -> Result<()>;

    /// Read a block of bytes starting at `addr`
    ///
    /// The default implementation issues aligned `read32` calls. Transports
    /// with a cheaper bulk path should override it.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let mut done = 0usize;
        while done < buf.len() {
            let cur = addr
                .checked_add(done as u32)
                .ok_or(Error::InvalidParameter)?;
            let aligned = cur & !3;
            let word = self.read32(aligned)?.to_le_bytes();
            let skip = (cur - aligned) as usize;
            let n = core::cmp::min(4 - skip, buf.len() - done);
            buf[done..done + n].copy_from_slice(&word[skip..skip + n]);
            done += n;
        }
        Ok(())
    }

    /// PCI location of the device, if the transport knows it
    fn pci_address(&self) -> Option<PciAddress> {
        None
    }
}

/// Data transfer direction of a SCSI command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    /// No data phase
    None,
    /// Data-out (host to device)
    ToDevice,
    /// Data-in (device to host)
    FromDevice,
}

/// SCSI generic passthrough
pub trait ScsiPassthrough {
    /// Execute one CDB with an optional data phase in `buf`
    fn passthrough(&mut self, cdb: &[u8], direction: DataDirection, buf: &mut [u8]) -> Result<()>;

    /// PCI location of the host adapter, if known
    fn pci_address(&self) -> Option<PciAddress> {
        None
    }
}

/// SMP passthrough through a SAS controller
pub trait SmpPassthrough {
    /// Send an SMP request frame and receive the response frame
    ///
    /// `response.len()` is the requested response length. Returns the
    /// number of response bytes actually received. Frames are passed
    /// through unmodified: multi-byte fields are big-endian.
    fn smp_passthrough(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize>;

    /// PCI location of the SAS controller, if known
    fn pci_address(&self) -> Option<PciAddress> {
        None
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for alloc::boxed::Box<T> {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        (**self).read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        (**self).write32(addr, value)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn pci_address(&self) -> Option<PciAddress> {
        (**self).pci_address()
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &mut T {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        (**self).read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        (**self).write32(addr, value)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn pci_address(&self) -> Option<PciAddress> {
        (**self).pci_address()
    }
}
