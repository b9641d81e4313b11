//! Expander register and address map
//!
//! Addresses are in the expander's internal 32-bit address space, as seen
//! through any [`RegisterAccess`](crate::transport::RegisterAccess)
//! implementation (direct MMIO, SCSI READ BUFFER or vendor SMP functions).

use bitflags::bitflags;

/// Boot flash alias at the reset vector
///
/// The first word is the ARM reset branch of the boot image on every
/// supported family, which makes it safe to probe before the chip is known.
pub const FLASH_ALIAS_BASE: u32 = 0x0000_0000;

/// Flash window when the boot flash sits on the parallel (XMEM/CFI) bus
pub const XMEM_FLASH_BASE: u32 = 0x1000_0000;

/// Flash window when the boot flash sits on the SPI controller
pub const SPI_FLASH_BASE: u32 = 0x1800_0000;

/// Power-On-Sense strap register
pub const POWER_ON_SENSE: u32 = 0xC200_0010;

/// Component identification register
///
/// Bits [27:16] hold the component id, bits [7:0] the revision.
/// On unrelated chips with an overlapping address map this address can be
/// unmapped, and touching it trips the hardware watchdog. Transports that
/// might be talking to such a chip must pre-check the flash alias first.
pub const COMPONENT_ID: u32 = 0xC200_0000;

/// SAS address, upper 32 bits
pub const SAS_ADDRESS_HIGH: u32 = 0xC200_0100;

/// SAS address, lower 32 bits
pub const SAS_ADDRESS_LOW: u32 = 0xC200_0104;

/// Mask applied to the first flash word for the ARM branch pre-check
pub const ARM_BRANCH_MASK: u32 = 0xFFFF_FF00;

/// Expected value of the first flash word after masking
pub const ARM_BRANCH_SIGNATURE: u32 = 0xEA00_0000;

bitflags! {
    /// Power-On-Sense strap bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PowerOnSense: u32 {
        /// Boot flash is a CFI part on the XMEM bus
        const CFI_ENABLED   = 1 << 3;
        /// Debug UART strapped on
        const UART_ENABLED  = 1 << 8;
        /// Chip strapped into manufacturing mode
        const MFG_MODE      = 1 << 12;
    }
}

impl PowerOnSense {
    /// Flash window selected by the straps
    pub fn flash_base(self) -> u32 {
        if self.contains(Self::CFI_ENABLED) {
            XMEM_FLASH_BASE
        } else {
            SPI_FLASH_BASE
        }
    }
}

/// Split the component-id register into (component id, revision)
pub fn decode_component_id(value: u32) -> (u16, u8) {
    (((value >> 16) & 0x0FFF) as u16, (value & 0xFF) as u8)
}

/// Build a component-id register value
pub fn encode_component_id(component_id: u16, revision_id: u8) -> u32 {
    (((component_id as u32) & 0x0FFF) << 16) | revision_id as u32
}

/// Check the first flash word against the ARM reset branch signature
pub fn is_arm_branch(word: u32) -> bool {
    word & ARM_BRANCH_MASK == ARM_BRANCH_SIGNATURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_id_fields() {
        assert_eq!(decode_component_id(0x0242_0003), (0x242, 0x03));
        assert_eq!(decode_component_id(0xF240_00A1), (0x240, 0xA1));
        assert_eq!(encode_component_id(0x246, 2), 0x0246_0002);
    }

    #[test]
    fn test_arm_branch() {
        assert!(is_arm_branch(0xEA00_0014));
        assert!(is_arm_branch(0xEA00_00FF));
        assert!(!is_arm_branch(0xEA01_0000));
        assert!(!is_arm_branch(0x1234_5678));
    }

    #[test]
    fn test_flash_base_from_straps() {
        assert_eq!(PowerOnSense::CFI_ENABLED.flash_base(), XMEM_FLASH_BASE);
        assert_eq!(PowerOnSense::UART_ENABLED.flash_base(), SPI_FLASH_BASE);
        assert_eq!(PowerOnSense::from_bits_retain(0x8).flash_base(), XMEM_FLASH_BASE);
    }
}
