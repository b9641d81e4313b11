//! Flash image layouts
//!
//! Fixed binary structures found in expander flash. Every structure is
//! decoded field by field from a little-endian byte slice and can be
//! encoded back, so the same definitions serve parsing and the synthetic
//! images built by [`builder`].

pub mod builder;
mod chained;
mod firmware_header;
mod flash_table;
mod status;

pub use chained::*;
pub use firmware_header::*;
pub use flash_table::*;
pub use status::*;

use crate::error::{Error, Result};

/// "No chain" sentinels for next-image offsets
pub const NO_CHAIN: [u32; 2] = [0, 0xFFFF_FFFF];

/// True if a next-image offset terminates the chain
pub fn is_no_chain(offset: u32) -> bool {
    NO_CHAIN.contains(&offset)
}

pub(crate) fn le16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(Error::ResponseTooShort)
}

pub(crate) fn le32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(Error::ResponseTooShort)
}

pub(crate) fn put16(out: &mut [u8], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
