//! Firmware image header
//!
//! Sits at the start of the boot loader and of each firmware copy. Layout
//! (0x54 bytes, little-endian):
//!
//! | offset | field |
//! |--------|-------|
//! | 0x00 | ARM reset branch |
//! | 0x04 | signature 0 (0xC0EABAA0) |
//! | 0x08 | signature 1 (0xC0BAEAA0) |
//! | 0x0C | signature 2 (0xC0BAA0EA) |
//! | 0x10 | packed firmware version |
//! | 0x14 | checksum |
//! | 0x18 | image size |
//! | 0x1C | next image (chain) offset |
//! | 0x20 | flash table offset |
//! | 0x24 | product id (u16) |
//! | 0x26 | vendor id (u16) |
//! | 0x28 | version name, 32 bytes NUL padded |
//! | 0x48 | reserved, 3 words |

use super::{le16, le32, put16, put32};
use crate::error::{Error, Result};
use crate::identity::FwVersion;

/// Size of the firmware header
pub const FIRMWARE_HEADER_SIZE: usize = 0x54;

/// Expected signature words
pub const FIRMWARE_SIGNATURE: [u32; 3] = [0xC0EA_BAA0, 0xC0BA_EAA0, 0xC0BA_A0EA];

const VERSION_NAME_LEN: usize = 32;

/// Decoded firmware header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareHeader {
    /// ARM reset branch instruction
    pub arm_branch: u32,
    /// Packed firmware version
    pub fw_version: FwVersion,
    /// Image checksum
    pub checksum: u32,
    /// Image size in bytes
    pub image_size: u32,
    /// Offset of the first chained image, relative to this header
    pub next_image_offset: u32,
    /// Offset of the flash table, relative to this header
    pub flash_table_offset: u32,
    /// Product id
    pub product_id: u16,
    /// Vendor id
    pub vendor_id: u16,
    /// Version name bytes
    pub version_name: [u8; VERSION_NAME_LEN],
    /// Reserved words, kept for re-encoding
    pub reserved: [u32; 3],
}

/// Check the three signature words of a raw header
///
/// Nothing past the signature is looked at.
pub fn has_firmware_signature(data: &[u8]) -> bool {
    FIRMWARE_SIGNATURE
        .iter()
        .enumerate()
        .all(|(i, &sig)| le32(data, 4 + i * 4) == Ok(sig))
}

impl FirmwareHeader {
    /// Decode a header, validating the signature first
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !has_firmware_signature(data) {
            return Err(Error::InvalidSignature);
        }
        if data.len() < FIRMWARE_HEADER_SIZE {
            return Err(Error::ResponseTooShort);
        }

        let mut version_name = [0u8; VERSION_NAME_LEN];
        version_name.copy_from_slice(&data[0x28..0x28 + VERSION_NAME_LEN]);

        Ok(Self {
            arm_branch: le32(data, 0x00)?,
            fw_version: FwVersion(le32(data, 0x10)?),
            checksum: le32(data, 0x14)?,
            image_size: le32(data, 0x18)?,
            next_image_offset: le32(data, 0x1C)?,
            flash_table_offset: le32(data, 0x20)?,
            product_id: le16(data, 0x24)?,
            vendor_id: le16(data, 0x26)?,
            version_name,
            reserved: [le32(data, 0x48)?, le32(data, 0x4C)?, le32(data, 0x50)?],
        })
    }

    /// Encode into the on-flash layout
    pub fn to_bytes(&self) -> [u8; FIRMWARE_HEADER_SIZE] {
        let mut out = [0u8; FIRMWARE_HEADER_SIZE];
        put32(&mut out, 0x00, self.arm_branch);
        for (i, sig) in FIRMWARE_SIGNATURE.iter().enumerate() {
            put32(&mut out, 4 + i * 4, *sig);
        }
        put32(&mut out, 0x10, self.fw_version.0);
        put32(&mut out, 0x14, self.checksum);
        put32(&mut out, 0x18, self.image_size);
        put32(&mut out, 0x1C, self.next_image_offset);
        put32(&mut out, 0x20, self.flash_table_offset);
        put16(&mut out, 0x24, self.product_id);
        put16(&mut out, 0x26, self.vendor_id);
        out[0x28..0x28 + VERSION_NAME_LEN].copy_from_slice(&self.version_name);
        for (i, word) in self.reserved.iter().enumerate() {
            put32(&mut out, 0x48 + i * 4, *word);
        }
        out
    }

    /// Version name up to the first NUL, if it is valid ASCII
    pub fn version_name(&self) -> Option<&str> {
        let end = self
            .version_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(VERSION_NAME_LEN);
        let name = core::str::from_utf8(&self.version_name[..end]).ok()?;
        if name.is_empty() || !name.is_ascii() {
            None
        } else {
            Some(name)
        }
    }

    /// Set the version name, truncating to 31 bytes
    pub fn set_version_name(&mut self, name: &str) {
        self.version_name = [0u8; VERSION_NAME_LEN];
        let len = core::cmp::min(name.len(), VERSION_NAME_LEN - 1);
        self.version_name[..len].copy_from_slice(&name.as_bytes()[..len]);
    }
}

impl Default for FirmwareHeader {
    fn default() -> Self {
        Self {
            arm_branch: 0xEA00_0013,
            fw_version: FwVersion::default(),
            checksum: 0,
            image_size: FIRMWARE_HEADER_SIZE as u32,
            next_image_offset: 0,
            flash_table_offset: 0,
            product_id: 0,
            vendor_id: 0x1000,
            version_name: [0u8; VERSION_NAME_LEN],
            reserved: [0; 3],
        }
    }
}
