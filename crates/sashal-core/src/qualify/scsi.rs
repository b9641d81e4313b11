//! SCSI passthrough qualification strategy
//!
//! A SCSI generic node may belong to any vendor's processor device, and
//! reading the component-id register on the wrong chip can trip its
//! watchdog. The first flash word is checked for the ARM reset branch
//! before anything else is touched.

use super::{registers, Qualification};
use crate::error::Result;
use crate::transport::{ScsiMemory, ScsiPassthrough};

pub(super) fn qualify(dev: &mut dyn ScsiPassthrough) -> Result<Qualification> {
    let mut mem = ScsiMemory::new(dev);

    if let Err(e) = mem.check_boot_image() {
        log::debug!("qualify: flash pre-check failed: {}", e);
        return Ok(Qualification::Ignore);
    }

    registers::qualify(&mut mem)
}
