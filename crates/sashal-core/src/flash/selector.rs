//! Active firmware selection
//!
//! Walks the firmware-bearing regions of the flash table in table order
//! and reports the first one whose status image is flagged active. That is
//! the copy the boot loader would run.

use alloc::vec::Vec;
use core::fmt;

use super::navigator::{
    locate_chained_image, read_firmware_header, upload_bootloader_flash_table,
    BootloaderFlashTable,
};
use crate::error::{Error, Result};
use crate::identity::FwVersion;
use crate::image::{
    is_no_chain, ChainedImageType, FlashRegionEntry, FwStatusImage, RegionType, FW_STATUS_SIZE,
};
use crate::transport::{DeviceHandle, RegisterAccess};

/// The firmware copy the chip boots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct ActiveFirmware {
    /// Version from the region's firmware header
    pub version: FwVersion,
    /// Region the copy lives in
    #[cfg_attr(feature = "std", serde(serialize_with = "serialize_region"))]
    pub region_type: RegionType,
    /// Flash-relative offset of the region
    pub region_offset: u32,
}

#[cfg(feature = "std")]
fn serialize_region<S: serde::Serializer>(
    region: &RegionType,
    serializer: S,
) -> core::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(region.short_name())
}

/// State of one firmware-bearing region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    /// Firmware header signature did not match
    InvalidHeader,
    /// Header carries no chain
    NoChain,
    /// Chain could not produce a status image
    NoStatus(Error),
    /// Status image present, copy is active
    Active,
    /// Status image present, copy is not active
    Superseded(u32),
}

impl fmt::Display for RegionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::NoChain => write!(f, "no chained images"),
            Self::NoStatus(e) => write!(f, "no status ({})", e),
            Self::Active => write!(f, "active"),
            Self::Superseded(state) => write!(f, "superseded (state 0x{:08X})", state),
        }
    }
}

/// Per-region result of [`scan_firmware_regions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionReport {
    /// Flash table entry
    pub entry: FlashRegionEntry,
    /// Version from the firmware header, when it validated
    pub version: Option<FwVersion>,
    /// Region state
    pub state: RegionState,
}

fn probe_region(
    regs: &mut dyn RegisterAccess,
    flash_base: u32,
    entry: &FlashRegionEntry,
) -> Result<RegionReport> {
    let report = |version, state| RegionReport {
        entry: *entry,
        version,
        state,
    };

    let Some(addr) = flash_base.checked_add(entry.region_offset) else {
        return Ok(report(None, RegionState::InvalidHeader));
    };
    let header = match read_firmware_header(regs, addr) {
        Ok(header) => header,
        Err(Error::InvalidSignature) => {
            log::warn!(
                "{} at 0x{:08X}: bad firmware header signature, skipping",
                entry.region_type,
                entry.region_offset
            );
            return Ok(report(None, RegionState::InvalidHeader));
        }
        Err(e) => return Err(e),
    };
    let version = Some(header.fw_version);

    if is_no_chain(header.next_image_offset) {
        log::debug!("{}: no chained images", entry.region_type);
        return Ok(report(version, RegionState::NoChain));
    }

    let window = entry.region_offset..entry.region_end();
    let located = entry
        .region_offset
        .checked_add(header.next_image_offset)
        .ok_or(Error::ChainOutOfBounds {
            offset: entry.region_offset,
        })
        .and_then(|first| {
            locate_chained_image(regs, flash_base, first, window, ChainedImageType::FwStatus)
        });

    let payload = match located {
        Ok(payload) => payload,
        Err(e) if e.is_chain_error() => {
            log::warn!("{}: {}, skipping", entry.region_type, e);
            return Ok(report(version, RegionState::NoStatus(e)));
        }
        Err(e) => return Err(e),
    };
    if payload.len() < FW_STATUS_SIZE {
        let e = Error::CorruptImage {
            offset: entry.region_offset,
        };
        log::warn!("{}: status image too short, skipping", entry.region_type);
        return Ok(report(version, RegionState::NoStatus(e)));
    }

    let status = FwStatusImage::parse(&payload)?;
    let state = if status.is_active() {
        RegionState::Active
    } else {
        RegionState::Superseded(status.current_state)
    };
    log::debug!(
        "{}: version {} {}",
        entry.region_type,
        header.fw_version,
        state
    );
    Ok(report(version, state))
}

/// Version of the firmware copy flagged active
///
/// Regions are tried in table order and the first active one wins; later
/// regions are not read. Regions with a bad header or an unusable chain
/// are skipped, transport errors abort.
pub fn select_active_firmware(regs: &mut dyn RegisterAccess) -> Result<ActiveFirmware> {
    let bft = upload_bootloader_flash_table(regs)?;

    for entry in bft.table.firmware_regions() {
        let report = probe_region(regs, bft.flash_base, entry)?;
        if let (RegionState::Active, Some(version)) = (report.state, report.version) {
            log::info!(
                "active firmware {} in {} at 0x{:08X}",
                version,
                entry.region_type,
                entry.region_offset
            );
            return Ok(ActiveFirmware {
                version,
                region_type: entry.region_type,
                region_offset: entry.region_offset,
            });
        }
    }

    Err(Error::NoActiveFirmware)
}

/// [`select_active_firmware`] through any qualified device handle
pub fn get_active_firmware_version(handle: DeviceHandle<'_>) -> Result<ActiveFirmware> {
    handle.with_registers(select_active_firmware)
}

/// State of every firmware-bearing region, without stopping at the first
/// active one
pub fn scan_firmware_regions(
    regs: &mut dyn RegisterAccess,
) -> Result<(BootloaderFlashTable, Vec<RegionReport>)> {
    let bft = upload_bootloader_flash_table(regs)?;
    let mut reports = Vec::new();
    for entry in bft.table.firmware_regions() {
        reports.push(probe_region(regs, bft.flash_base, entry)?);
    }
    Ok((bft, reports))
}
