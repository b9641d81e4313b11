//! SMP passthrough qualification strategy
//!
//! Identification comes from REPORT MANUFACTURER INFORMATION, which every
//! SAS expander answers. Phy count and SAS address come from REPORT
//! GENERAL. The active firmware is read over the vendor memory functions.

use super::Qualification;
use crate::chip::resolve_signature;
use crate::error::{Error, Result};
use crate::flash::select_active_firmware;
use crate::identity::{ExpanderIdentity, IdentString, SasAddress};
use crate::transport::smp::{be16, exchange, function};
use crate::transport::{SmpMemory, SmpPassthrough};

/// REPORT MANUFACTURER INFORMATION response size
const MANUFACTURER_INFO_LEN: usize = 64;
/// REPORT GENERAL response size requested
const REPORT_GENERAL_LEN: usize = 64;

/// Offsets into the REPORT MANUFACTURER INFORMATION response
mod info {
    pub const VENDOR: core::ops::Range<usize> = 12..20;
    pub const PRODUCT: core::ops::Range<usize> = 20..36;
    pub const REVISION: core::ops::Range<usize> = 36..40;
    pub const COMPONENT_VENDOR: core::ops::Range<usize> = 40..48;
    pub const COMPONENT_ID: usize = 48;
    pub const COMPONENT_REVISION: usize = 50;
}

/// Offsets into the REPORT GENERAL response
mod general {
    pub const NUM_PHYS: usize = 9;
    pub const ENCLOSURE_LOGICAL_ID: core::ops::Range<usize> = 12..20;
}

/// Component vendors that identify Broadcom (or LSI-era) silicon
const BROADCOM_COMPONENT_VENDORS: &[&str] = &["BROADCOM", "LSI"];

/// ASCII field with trailing blanks and NULs removed
fn ident(field: &[u8]) -> IdentString {
    let mut out = IdentString::new();
    let end = field
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    for &b in &field[..end] {
        let c = if b.is_ascii_graphic() || b == b' ' {
            b as char
        } else {
            '?'
        };
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

pub(super) fn qualify(dev: &mut dyn SmpPassthrough) -> Result<Qualification> {
    let response = match exchange(
        dev,
        function::REPORT_MANUFACTURER_INFO,
        &[],
        MANUFACTURER_INFO_LEN,
    ) {
        Ok(response) => response,
        Err(Error::NoMemory) => return Err(Error::NoMemory),
        Err(e) => {
            log::debug!("qualify: REPORT MANUFACTURER INFORMATION failed: {}", e);
            return Ok(Qualification::Ignore);
        }
    };
    if response.len() <= info::COMPONENT_REVISION {
        log::debug!(
            "qualify: manufacturer information too short ({} bytes)",
            response.len()
        );
        return Ok(Qualification::Ignore);
    }

    let component_id = be16(&response, info::COMPONENT_ID)?;
    let revision_id = response[info::COMPONENT_REVISION];

    let mut identity = ExpanderIdentity::new();
    if !resolve_signature(component_id, revision_id, &mut identity).is_match() {
        log::debug!(
            "qualify: SMP component 0x{:04X} is not a known expander",
            component_id
        );
        return Ok(Qualification::Ignore);
    }
    identity.vendor = ident(&response[info::VENDOR]);
    identity.product = ident(&response[info::PRODUCT]);
    identity.product_revision = ident(&response[info::REVISION]);
    identity.component_vendor = ident(&response[info::COMPONENT_VENDOR]);

    let general_frame = exchange(dev, function::REPORT_GENERAL, &[], REPORT_GENERAL_LEN)?;
    let eli = general_frame
        .get(general::ENCLOSURE_LOGICAL_ID)
        .ok_or(Error::ResponseTooShort)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(eli);
    identity.num_phys = general_frame[general::NUM_PHYS];
    identity.sas_address = SasAddress::from_u64(u64::from_be_bytes(raw));

    identity.is_broadcom_expander = BROADCOM_COMPONENT_VENDORS
        .iter()
        .any(|v| identity.component_vendor.eq_ignore_ascii_case(v));
    if identity.is_broadcom_expander {
        let mut mem = SmpMemory::new(dev);
        identity.fw_version = Some(select_active_firmware(&mut mem)?.version);
    } else {
        log::debug!(
            "qualify: component vendor '{}' is not Broadcom, skipping firmware query",
            identity.component_vendor
        );
    }
    identity.host_pci_address = dev.pci_address();
    Ok(Qualification::Success(identity))
}
