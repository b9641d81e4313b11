//! Boot loader flash table
//!
//! A 4-byte header `{version: u16, num_entries: u8, reserved: u8}` followed
//! by `num_entries` 12-byte region entries:
//!
//! | offset | field |
//! |--------|-------|
//! | 0 | region type (u8) |
//! | 1 | flags: bit 0 dev type, bits 1..3 chip select, bits 4..7 reserved |
//! | 2 | reserved (u16) |
//! | 4 | region size (u32) |
//! | 8 | region offset (u32) |

use alloc::vec::Vec;
use core::fmt;

use super::{le16, le32, put16, put32};
use crate::error::{Error, Result};

/// Size of the table header
pub const FLASH_TABLE_HEADER_SIZE: usize = 4;
/// Size of one region entry
pub const FLASH_REGION_ENTRY_SIZE: usize = 12;

/// Byte size of a table with `num_entries` entries
pub fn flash_table_size(num_entries: u8) -> usize {
    num_entries as usize * FLASH_REGION_ENTRY_SIZE + FLASH_TABLE_HEADER_SIZE
}

/// Entry count from the first table dword (bits [23:16])
pub fn flash_table_entry_count(header_word: u32) -> u8 {
    ((header_word >> 16) & 0xFF) as u8
}

/// Flash region type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionType {
    /// Boot loader
    BootLoader,
    /// First firmware copy
    FirmwareCopy1,
    /// Second firmware copy
    FirmwareCopy2,
    /// Configuration data
    Config,
    /// Event log
    Log,
    /// OEM data
    OemData,
    /// Core dump area
    Coredump,
    /// Manufacturing data
    ManufacturingData,
    /// Anything else
    Unknown(u8),
}

impl RegionType {
    /// Raw type code
    pub fn code(&self) -> u8 {
        match self {
            Self::BootLoader => 0,
            Self::FirmwareCopy1 => 1,
            Self::FirmwareCopy2 => 2,
            Self::Config => 3,
            Self::Log => 4,
            Self::OemData => 5,
            Self::Coredump => 6,
            Self::ManufacturingData => 7,
            Self::Unknown(code) => *code,
        }
    }

    /// True for regions that carry a firmware header and status image
    pub fn is_firmware_bearing(&self) -> bool {
        matches!(
            self,
            Self::BootLoader | Self::FirmwareCopy1 | Self::FirmwareCopy2
        )
    }

    /// Short name used on the command line
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::BootLoader => "bl",
            Self::FirmwareCopy1 => "fw1",
            Self::FirmwareCopy2 => "fw2",
            Self::Config => "config",
            Self::Log => "log",
            Self::OemData => "oem",
            Self::Coredump => "coredump",
            Self::ManufacturingData => "mfg",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Parse a short name
    pub fn from_short_name(name: &str) -> Option<Self> {
        let region = match name.to_ascii_lowercase().as_str() {
            "bl" | "bootloader" => Self::BootLoader,
            "fw1" | "firmware1" => Self::FirmwareCopy1,
            "fw2" | "firmware2" => Self::FirmwareCopy2,
            "config" => Self::Config,
            "log" => Self::Log,
            "oem" => Self::OemData,
            "coredump" => Self::Coredump,
            "mfg" => Self::ManufacturingData,
            _ => return None,
        };
        Some(region)
    }
}

impl From<u8> for RegionType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::BootLoader,
            1 => Self::FirmwareCopy1,
            2 => Self::FirmwareCopy2,
            3 => Self::Config,
            4 => Self::Log,
            5 => Self::OemData,
            6 => Self::Coredump,
            7 => Self::ManufacturingData,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BootLoader => write!(f, "boot loader"),
            Self::FirmwareCopy1 => write!(f, "firmware copy 1"),
            Self::FirmwareCopy2 => write!(f, "firmware copy 2"),
            Self::Config => write!(f, "config"),
            Self::Log => write!(f, "log"),
            Self::OemData => write!(f, "OEM data"),
            Self::Coredump => write!(f, "coredump"),
            Self::ManufacturingData => write!(f, "manufacturing data"),
            Self::Unknown(code) => write!(f, "unknown (0x{:02X})", code),
        }
    }
}

/// Region entry flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegionFlags(pub u8);

impl RegionFlags {
    /// Build from fields; reserved bits are zero
    pub fn new(dev_type: bool, chip_sel: u8) -> Self {
        Self(dev_type as u8 | ((chip_sel & 0x7) << 1))
    }

    /// Device type bit
    pub fn dev_type(&self) -> bool {
        self.0 & 0x1 != 0
    }

    /// Chip select (3 bits)
    pub fn chip_sel(&self) -> u8 {
        (self.0 >> 1) & 0x7
    }

    /// Reserved bits [7:4], shifted down
    pub fn reserved(&self) -> u8 {
        self.0 >> 4
    }
}

/// One flash region entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegionEntry {
    /// Region type
    pub region_type: RegionType,
    /// Flags byte
    pub flags: RegionFlags,
    /// Reserved halfword
    pub reserved: u16,
    /// Region size in bytes
    pub region_size: u32,
    /// Region offset from the flash base
    pub region_offset: u32,
}

impl FlashRegionEntry {
    /// Decode one entry
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FLASH_REGION_ENTRY_SIZE {
            return Err(Error::ResponseTooShort);
        }
        Ok(Self {
            region_type: RegionType::from(data[0]),
            flags: RegionFlags(data[1]),
            reserved: le16(data, 2)?,
            region_size: le32(data, 4)?,
            region_offset: le32(data, 8)?,
        })
    }

    /// Encode one entry
    pub fn to_bytes(&self) -> [u8; FLASH_REGION_ENTRY_SIZE] {
        let mut out = [0u8; FLASH_REGION_ENTRY_SIZE];
        out[0] = self.region_type.code();
        out[1] = self.flags.0;
        put16(&mut out, 2, self.reserved);
        put32(&mut out, 4, self.region_size);
        put32(&mut out, 8, self.region_offset);
        out
    }

    /// Offset one past the end of the region, saturating
    pub fn region_end(&self) -> u32 {
        self.region_offset.saturating_add(self.region_size)
    }
}

/// Decoded flash table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlashTable {
    /// Table format version
    pub version: u16,
    /// Reserved header byte
    pub reserved: u8,
    /// Region entries, in table order
    pub entries: Vec<FlashRegionEntry>,
}

impl FlashTable {
    /// Decode a table; `data` must hold at least the size the header implies
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = le32(data, 0)?;
        let count = flash_table_entry_count(header);
        let size = flash_table_size(count);
        if data.len() < size {
            return Err(Error::ResponseTooShort);
        }

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(count as usize)
            .map_err(|_| Error::NoMemory)?;
        for raw in data[FLASH_TABLE_HEADER_SIZE..size].chunks_exact(FLASH_REGION_ENTRY_SIZE) {
            entries.push(FlashRegionEntry::parse(raw)?);
        }

        Ok(Self {
            version: header as u16,
            reserved: (header >> 24) as u8,
            entries,
        })
    }

    /// Encode the table
    pub fn to_bytes(&self) -> Vec<u8> {
        let count = core::cmp::min(self.entries.len(), u8::MAX as usize) as u8;
        let mut out = alloc::vec![0u8; flash_table_size(count)];
        put32(
            &mut out,
            0,
            self.version as u32 | (count as u32) << 16 | (self.reserved as u32) << 24,
        );
        for (i, entry) in self.entries.iter().take(count as usize).enumerate() {
            let at = FLASH_TABLE_HEADER_SIZE + i * FLASH_REGION_ENTRY_SIZE;
            out[at..at + FLASH_REGION_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        }
        out
    }

    /// First entry of the given type
    pub fn find(&self, region_type: RegionType) -> Option<&FlashRegionEntry> {
        self.entries.iter().find(|e| e.region_type == region_type)
    }

    /// Entries that carry a firmware header
    pub fn firmware_regions(&self) -> impl Iterator<Item = &FlashRegionEntry> {
        self.entries
            .iter()
            .filter(|e| e.region_type.is_firmware_bearing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size() {
        assert_eq!(flash_table_size(2), 28);
        assert_eq!(flash_table_size(0), 4);
        assert_eq!(flash_table_entry_count(0x0002_0001), 2);
        assert_eq!(flash_table_entry_count(0xFF07_0001), 7);
    }

    #[test]
    fn test_flags_bitfields_preserved() {
        let flags = RegionFlags(0b1010_0111);
        assert!(flags.dev_type());
        assert_eq!(flags.chip_sel(), 0b011);
        assert_eq!(flags.reserved(), 0b1010);

        let entry = FlashRegionEntry {
            region_type: RegionType::Log,
            flags,
            reserved: 0xBEEF,
            region_size: 0x1_0000,
            region_offset: 0x8_0000,
        };
        let bytes = entry.to_bytes();
        assert_eq!(bytes[1], 0b1010_0111);
        assert_eq!(FlashRegionEntry::parse(&bytes).unwrap(), entry);
    }

    #[test]
    fn test_table_decode() {
        let table = FlashTable {
            version: 1,
            reserved: 0,
            entries: alloc::vec![
                FlashRegionEntry {
                    region_type: RegionType::BootLoader,
                    flags: RegionFlags::new(false, 0),
                    reserved: 0,
                    region_size: 0x1_0000,
                    region_offset: 0,
                },
                FlashRegionEntry {
                    region_type: RegionType::Unknown(0x20),
                    flags: RegionFlags::new(true, 5),
                    reserved: 0,
                    region_size: 0x1000,
                    region_offset: 0x1_0000,
                },
            ],
        };
        let bytes = table.to_bytes();
        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[0..4], &[0x01, 0x00, 0x02, 0x00]);

        let parsed = FlashTable::parse(&bytes).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(parsed.firmware_regions().count(), 1);
        assert_eq!(parsed.entries[1].flags.chip_sel(), 5);
    }

    #[test]
    fn test_truncated_table() {
        let bytes = [0x01, 0x00, 0x03, 0x00, 0, 0, 0, 0];
        assert_eq!(FlashTable::parse(&bytes), Err(Error::ResponseTooShort));
    }

    #[test]
    fn test_region_names() {
        assert_eq!(RegionType::from_short_name("FW2"), Some(RegionType::FirmwareCopy2));
        assert_eq!(RegionType::from(9), RegionType::Unknown(9));
        assert_eq!(RegionType::Unknown(9).code(), 9);
    }
}
