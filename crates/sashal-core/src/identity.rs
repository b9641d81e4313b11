//! Expander identity record
//!
//! An [`ExpanderIdentity`] starts out empty and is filled in step by step
//! by the qualifier. It only reaches the caller inside a successful
//! [`Qualification`](crate::qualify::Qualification).

use core::fmt;

use crate::chip::ChipFamily;
use crate::transport::PciAddress;

/// Capacity of the SMP vendor/product identification strings
pub const IDENT_LEN: usize = 16;

/// Fixed-capacity identification string
pub type IdentString = heapless::String<IDENT_LEN>;

/// Packed firmware version
///
/// Byte 0 is the dev number, byte 1 the unit, byte 2 the minor and byte 3
/// the major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct FwVersion(pub u32);

impl FwVersion {
    /// Build from components
    pub fn new(major: u8, minor: u8, unit: u8, dev: u8) -> Self {
        Self(u32::from_le_bytes([dev, unit, minor, major]))
    }

    /// Major version
    pub fn major(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Minor version
    pub fn minor(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Unit (maintenance) number
    pub fn unit(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Dev (build) number
    pub fn dev(&self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for FwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}.{:02}.{:02}.{:02}",
            self.major(),
            self.minor(),
            self.unit(),
            self.dev()
        )
    }
}

/// 64-bit SAS address kept as the two register halves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct SasAddress {
    /// Upper 32 bits
    pub high: u32,
    /// Lower 32 bits
    pub low: u32,
}

impl SasAddress {
    /// Build from a 64-bit value
    pub fn from_u64(value: u64) -> Self {
        Self {
            high: (value >> 32) as u32,
            low: value as u32,
        }
    }

    /// Combined 64-bit value
    pub fn as_u64(&self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }

    /// True if no address has been assigned
    pub fn is_zero(&self) -> bool {
        self.high == 0 && self.low == 0
    }
}

impl fmt::Display for SasAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}{:08x}", self.high, self.low)
    }
}

/// Broad product family of a qualified device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub enum ProductFamily {
    /// Not yet identified
    #[default]
    Unknown,
    /// SAS expander
    Expander,
}

/// Identity of a SAS expander
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct ExpanderIdentity {
    /// 12-bit component (family) code
    pub component_id: u16,
    /// Silicon revision
    pub revision_id: u8,
    /// Number of phys (24, 32, 40 or 48 from the signature table; REPORT
    /// GENERAL overrides it on SMP transports)
    pub num_phys: u8,
    /// Product family
    pub product_family: ProductFamily,
    /// Chip family, once a resolver has matched
    pub chip_family: Option<ChipFamily>,
    /// Set when a Broadcom signature matched
    pub is_broadcom_expander: bool,
    /// SAS address
    pub sas_address: SasAddress,
    /// Active firmware version
    pub fw_version: Option<FwVersion>,
    /// Host PCI function, when the transport knows it
    pub host_pci_address: Option<PciAddress>,
    /// SMP vendor identification
    pub vendor: IdentString,
    /// SMP product identification
    pub product: IdentString,
    /// SMP product revision level
    pub product_revision: IdentString,
    /// SMP component vendor identification
    pub component_vendor: IdentString,
}

impl ExpanderIdentity {
    /// An empty record
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for ExpanderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self.chip_family {
            Some(family) => family.name(),
            None => "unknown",
        };
        write!(
            f,
            "{} (component 0x{:03X} rev 0x{:02X}, {} phys, SAS address {}",
            family, self.component_id, self.revision_id, self.num_phys, self.sas_address
        )?;
        if let Some(version) = self.fw_version {
            write!(f, ", firmware {}", version)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_fw_version_packing() {
        let v = FwVersion(0x1003_0205);
        assert_eq!(v.major(), 0x10);
        assert_eq!(v.minor(), 0x03);
        assert_eq!(v.unit(), 0x02);
        assert_eq!(v.dev(), 0x05);
        assert_eq!(FwVersion::new(0x10, 3, 2, 5), v);
        assert_eq!(format!("{}", v), "16.03.02.05");
    }

    #[test]
    fn test_sas_address_halves() {
        let addr = SasAddress::from_u64(0x5000_605B_0123_4567);
        assert_eq!(addr.high, 0x5000_605B);
        assert_eq!(addr.low, 0x0123_4567);
        assert_eq!(addr.as_u64(), 0x5000_605B_0123_4567);
        assert_eq!(format!("{}", addr), "0x5000605b01234567");
        assert!(SasAddress::default().is_zero());
    }
}
