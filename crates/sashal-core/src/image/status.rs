//! Firmware status sub-image

use super::{le32, put32};
use crate::error::Result;

/// Size of the firmware status payload
pub const FW_STATUS_SIZE: usize = 8;

/// `current_state` of the copy the boot loader runs (erased-flash default)
pub const FW_STATE_ACTIVE: u32 = 0xFFFF_FFFF;

/// Firmware status payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FwStatusImage {
    /// Current state word
    pub current_state: u32,
    /// Checksum adjustment word
    pub checksum_adjustment: u32,
}

impl FwStatusImage {
    /// Decode the payload
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            current_state: le32(data, 0)?,
            checksum_adjustment: le32(data, 4)?,
        })
    }

    /// Encode the payload
    pub fn to_bytes(&self) -> [u8; FW_STATUS_SIZE] {
        let mut out = [0u8; FW_STATUS_SIZE];
        put32(&mut out, 0, self.current_state);
        put32(&mut out, 4, self.checksum_adjustment);
        out
    }

    /// True if this copy is the active one
    pub fn is_active(&self) -> bool {
        self.current_state == FW_STATE_ACTIVE
    }
}
