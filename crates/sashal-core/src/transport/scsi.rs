//! Expander memory access over SCSI passthrough
//!
//! The expander's SES/processor LUN exposes its internal address space
//! through the vendor-specific mode of READ BUFFER and WRITE BUFFER:
//!
//! - READ BUFFER(16), mode 0x01: the 64-bit BUFFER OFFSET is the address,
//!   the ALLOCATION LENGTH the byte count.
//! - WRITE BUFFER(10), mode 0x01: an 8-byte parameter list
//!   `{address: u32 BE, value: u32 BE}` performs one word write.

use super::{DataDirection, PciAddress, RegisterAccess, ScsiPassthrough};
use crate::error::{Error, Result};
use crate::regs::{is_arm_branch, FLASH_ALIAS_BASE};

/// READ BUFFER(16) operation code
pub const READ_BUFFER_16: u8 = 0x9B;
/// WRITE BUFFER(10) operation code
pub const WRITE_BUFFER_10: u8 = 0x3B;
/// Vendor-specific buffer mode
pub const MODE_VENDOR: u8 = 0x01;
/// Buffer id selecting the memory window
pub const MEMORY_BUFFER_ID: u8 = 0x00;
/// Largest single READ BUFFER transfer
pub const MAX_READ_LEN: usize = 4096;

/// Build a READ BUFFER(16) CDB for a memory read
pub fn read_buffer_cdb(addr: u32, len: u32) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = READ_BUFFER_16;
    cdb[1] = MODE_VENDOR;
    cdb[2..10].copy_from_slice(&(addr as u64).to_be_bytes());
    cdb[10..14].copy_from_slice(&len.to_be_bytes());
    cdb[14] = MEMORY_BUFFER_ID;
    cdb
}

/// Build a WRITE BUFFER(10) CDB and its parameter list for a word write
pub fn write_buffer_cdb(addr: u32, value: u32) -> ([u8; 10], [u8; 8]) {
    let mut cdb = [0u8; 10];
    cdb[0] = WRITE_BUFFER_10;
    cdb[1] = MODE_VENDOR;
    cdb[2] = MEMORY_BUFFER_ID;
    // Parameter list length (24-bit)
    cdb[8] = 8;

    let mut data = [0u8; 8];
    data[0..4].copy_from_slice(&addr.to_be_bytes());
    data[4..8].copy_from_slice(&value.to_be_bytes());
    (cdb, data)
}

/// Decode the address and length of a memory READ BUFFER(16) CDB
///
/// Returns `None` for anything that is not a vendor-mode memory read.
pub fn parse_read_buffer_cdb(cdb: &[u8]) -> Option<(u32, u32)> {
    if cdb.len() < 16 || cdb[0] != READ_BUFFER_16 || cdb[1] & 0x1F != MODE_VENDOR {
        return None;
    }
    if cdb[14] != MEMORY_BUFFER_ID {
        return None;
    }
    let offset = u64::from_be_bytes(cdb[2..10].try_into().ok()?);
    let len = u32::from_be_bytes(cdb[10..14].try_into().ok()?);
    Some((u32::try_from(offset).ok()?, len))
}

/// Decode a memory WRITE BUFFER(10) parameter list
pub fn parse_write_buffer(cdb: &[u8], data: &[u8]) -> Option<(u32, u32)> {
    if cdb.len() < 10 || cdb[0] != WRITE_BUFFER_10 || cdb[1] & 0x1F != MODE_VENDOR {
        return None;
    }
    if data.len() < 8 {
        return None;
    }
    let addr = u32::from_be_bytes(data[0..4].try_into().ok()?);
    let value = u32::from_be_bytes(data[4..8].try_into().ok()?);
    Some((addr, value))
}

/// [`RegisterAccess`] over a SCSI passthrough transport
pub struct ScsiMemory<'a> {
    dev: &'a mut dyn ScsiPassthrough,
}

impl<'a> ScsiMemory<'a> {
    /// Wrap a SCSI passthrough transport
    pub fn new(dev: &'a mut dyn ScsiPassthrough) -> Self {
        Self { dev }
    }

    /// Check that the first flash word is an ARM reset branch
    ///
    /// A SCSI generic node may belong to any vendor's processor device, and
    /// the expander register block collides with registers that trip the
    /// watchdog on other chips. Nothing outside the flash alias window may
    /// be read over SCSI until this passes. A foreign boot word fails with
    /// [`Error::Unsupported`]; a failed read propagates.
    pub fn check_boot_image(&mut self) -> Result<()> {
        let word = self.read32(FLASH_ALIAS_BASE)?;
        if is_arm_branch(word) {
            Ok(())
        } else {
            log::debug!("scsi: flash word 0x{:08X} is not a boot image", word);
            Err(Error::Unsupported)
        }
    }
}

impl RegisterAccess for ScsiMemory<'_> {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        let (cdb, mut data) = write_buffer_cdb(addr, value);
        log::trace!("scsi: write32 0x{:08X} = 0x{:08X}", addr, value);
        self.dev
            .passthrough(&cdb, DataDirection::ToDevice, &mut data)
            .map_err(|_| Error::RegisterWriteFailed { addr })
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let mut done = 0usize;
        for chunk in buf.chunks_mut(MAX_READ_LEN) {
            let cur = addr
                .checked_add(done as u32)
                .ok_or(Error::InvalidParameter)?;
            let cdb = read_buffer_cdb(cur, chunk.len() as u32);
            log::trace!("scsi: read 0x{:08X} len {}", cur, chunk.len());
            self.dev
                .passthrough(&cdb, DataDirection::FromDevice, chunk)
                .map_err(|_| Error::RegisterReadFailed { addr: cur })?;
            done += chunk.len();
        }
        Ok(())
    }

    fn pci_address(&self) -> Option<PciAddress> {
        self.dev.pci_address()
    }
}
