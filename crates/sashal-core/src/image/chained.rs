//! Chained (concatenated) sub-image header
//!
//! Auxiliary images are appended after a firmware image and linked through
//! `next_image_offset`. Layout (0x54 bytes, little-endian):
//!
//! | offset | field |
//! |--------|-------|
//! | 0x00 | signature word; bits [31:24] are the header type |
//! | 0x04 | preferred buffer id (u8) |
//! | 0x05 | image type (u8) |
//! | 0x06 | reserved (2 × u8) |
//! | 0x08 | version |
//! | 0x0C | firmware family (u16) |
//! | 0x0E | OEM family (u16) |
//! | 0x10 | header flags |
//! | 0x14 | image size, header included |
//! | 0x18 | offset to content |
//! | 0x1C | next image offset, relative to this header |
//! | 0x20 | checksum |
//! | 0x24 | reserved, 12 words |

use core::fmt;

use super::{le16, le32, put16, put32};
use crate::error::{Error, Result};

/// Size of a chained header
pub const CHAINED_HEADER_SIZE: usize = 0x54;

/// Who produced a chained image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderType {
    /// Firmware-generated image
    Firmware,
    /// OEM-supplied image
    Oem,
    /// Vendor (LSI) image
    Lsi,
}

impl HeaderType {
    /// Raw type tag
    pub fn code(&self) -> u8 {
        match self {
            Self::Firmware => 0xEA,
            Self::Oem => 0x7F,
            Self::Lsi => 0xFF,
        }
    }

    /// Decode a type tag; unknown tags are `None`
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0xEA => Some(Self::Firmware),
            0x7F => Some(Self::Oem),
            0xFF => Some(Self::Lsi),
            _ => None,
        }
    }
}

/// Chained image payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainedImageType {
    /// Manufacturing data
    ManufacturingData,
    /// Firmware status word
    FwStatus,
    /// Image signature
    Signature,
    /// Configuration pages
    Config,
    /// Anything else
    Unknown(u8),
}

impl ChainedImageType {
    /// Raw type code
    pub fn code(&self) -> u8 {
        match self {
            Self::ManufacturingData => 0x01,
            Self::FwStatus => 0x02,
            Self::Signature => 0x03,
            Self::Config => 0x04,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<u8> for ChainedImageType {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::ManufacturingData,
            0x02 => Self::FwStatus,
            0x03 => Self::Signature,
            0x04 => Self::Config,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ChainedImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManufacturingData => write!(f, "manufacturing data"),
            Self::FwStatus => write!(f, "firmware status"),
            Self::Signature => write!(f, "signature"),
            Self::Config => write!(f, "config"),
            Self::Unknown(code) => write!(f, "unknown (0x{:02X})", code),
        }
    }
}

/// Decoded chained header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainedHeader {
    /// Full signature word
    pub signature: u32,
    /// Header type taken from the signature word
    pub header_type: HeaderType,
    /// Preferred buffer id
    pub preferred_buffer_id: u8,
    /// Image type
    pub image_type: ChainedImageType,
    /// Reserved bytes
    pub reserved0: [u8; 2],
    /// Image version
    pub version: u32,
    /// Firmware family
    pub fw_family: u16,
    /// OEM family
    pub oem_family: u16,
    /// Header flags
    pub header_flags: u32,
    /// Image size in bytes, header included
    pub image_size: u32,
    /// Offset of the payload from the start of this header
    pub offset_to_content: u32,
    /// Offset of the next header, relative to this one
    pub next_image_offset: u32,
    /// Checksum
    pub checksum: u32,
}

impl ChainedHeader {
    /// Decode a header, validating the type tag first
    pub fn parse(data: &[u8]) -> Result<Self> {
        let signature = le32(data, 0x00)?;
        let header_type = HeaderType::from_code((signature >> 24) as u8)
            .ok_or(Error::InvalidChainedHeader { offset: 0 })?;
        if data.len() < CHAINED_HEADER_SIZE {
            return Err(Error::ResponseTooShort);
        }

        Ok(Self {
            signature,
            header_type,
            preferred_buffer_id: data[0x04],
            image_type: ChainedImageType::from(data[0x05]),
            reserved0: [data[0x06], data[0x07]],
            version: le32(data, 0x08)?,
            fw_family: le16(data, 0x0C)?,
            oem_family: le16(data, 0x0E)?,
            header_flags: le32(data, 0x10)?,
            image_size: le32(data, 0x14)?,
            offset_to_content: le32(data, 0x18)?,
            next_image_offset: le32(data, 0x1C)?,
            checksum: le32(data, 0x20)?,
        })
    }

    /// Build a header with the given type and sizes; the rest is zero
    pub fn new(header_type: HeaderType, image_type: ChainedImageType, payload_len: u32) -> Self {
        Self {
            signature: (header_type.code() as u32) << 24,
            header_type,
            preferred_buffer_id: 0,
            image_type,
            reserved0: [0; 2],
            version: 0,
            fw_family: 0,
            oem_family: 0,
            header_flags: 0,
            image_size: CHAINED_HEADER_SIZE as u32 + payload_len,
            offset_to_content: CHAINED_HEADER_SIZE as u32,
            next_image_offset: 0,
            checksum: 0,
        }
    }

    /// Encode into the on-flash layout
    pub fn to_bytes(&self) -> [u8; CHAINED_HEADER_SIZE] {
        let mut out = [0u8; CHAINED_HEADER_SIZE];
        let signature = (self.signature & 0x00FF_FFFF) | (self.header_type.code() as u32) << 24;
        put32(&mut out, 0x00, signature);
        out[0x04] = self.preferred_buffer_id;
        out[0x05] = self.image_type.code();
        out[0x06] = self.reserved0[0];
        out[0x07] = self.reserved0[1];
        put32(&mut out, 0x08, self.version);
        put16(&mut out, 0x0C, self.fw_family);
        put16(&mut out, 0x0E, self.oem_family);
        put32(&mut out, 0x10, self.header_flags);
        put32(&mut out, 0x14, self.image_size);
        put32(&mut out, 0x18, self.offset_to_content);
        put32(&mut out, 0x1C, self.next_image_offset);
        put32(&mut out, 0x20, self.checksum);
        out
    }

    /// Payload length: image size minus the header already read
    pub fn payload_len(&self) -> Option<u32> {
        self.image_size.checked_sub(CHAINED_HEADER_SIZE as u32)
    }
}
