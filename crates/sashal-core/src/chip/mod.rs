//! Chip signature tables and resolvers
//!
//! Each resolver maps a component id onto a [`ChipSignature`]. A miss is
//! not an error: it only means "not this family", and the qualifier moves
//! on to the next resolver.

mod resolver;

use core::fmt;

pub use resolver::*;

/// Broadcom expander silicon family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub enum ChipFamily {
    /// SAS4 expander generation
    Margay,
    /// SAS3.5 expander, high phy counts
    Cobra,
    /// SAS3.5 expander, low phy counts
    Cub,
}

impl ChipFamily {
    /// Human-readable family name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Margay => "Margay",
            Self::Cobra => "Cobra",
            Self::Cub => "Cub",
        }
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a signature table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipSignature {
    /// 12-bit component id
    pub component_id: u16,
    /// Silicon family
    pub family: ChipFamily,
    /// Number of phys
    pub num_phys: u8,
    /// Part name
    pub name: &'static str,
}

/// Margay signatures
pub const MARGAY_SIGNATURES: &[ChipSignature] = &[
    ChipSignature {
        component_id: 0x240,
        family: ChipFamily::Margay,
        num_phys: 48,
        name: "SAS4x48",
    },
    ChipSignature {
        component_id: 0x242,
        family: ChipFamily::Margay,
        num_phys: 40,
        name: "SAS4x40",
    },
    ChipSignature {
        component_id: 0x244,
        family: ChipFamily::Margay,
        num_phys: 32,
        name: "SAS4x32",
    },
    ChipSignature {
        component_id: 0x246,
        family: ChipFamily::Margay,
        num_phys: 24,
        name: "SAS4x24",
    },
];

/// Cobra and Cub signatures
pub const COBRA_SIGNATURES: &[ChipSignature] = &[
    ChipSignature {
        component_id: 0x230,
        family: ChipFamily::Cobra,
        num_phys: 48,
        name: "SAS35x48",
    },
    ChipSignature {
        component_id: 0x232,
        family: ChipFamily::Cobra,
        num_phys: 40,
        name: "SAS35x40",
    },
    ChipSignature {
        component_id: 0x234,
        family: ChipFamily::Cub,
        num_phys: 32,
        name: "SAS35x32",
    },
    ChipSignature {
        component_id: 0x236,
        family: ChipFamily::Cub,
        num_phys: 24,
        name: "SAS35x24",
    },
];

/// Iterate over every known signature
pub fn all_signatures() -> impl Iterator<Item = &'static ChipSignature> {
    MARGAY_SIGNATURES.iter().chain(COBRA_SIGNATURES.iter())
}
