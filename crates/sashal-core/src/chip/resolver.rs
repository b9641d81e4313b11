//! Component id resolvers

use super::{ChipSignature, COBRA_SIGNATURES, MARGAY_SIGNATURES};
use crate::identity::{ExpanderIdentity, ProductFamily};

/// Outcome of a resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The id belongs to this family; the identity was updated
    Matched(ChipSignature),
    /// Not this family; the identity was left untouched
    Ignore,
}

impl Resolution {
    /// True on a match
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

fn lookup(table: &'static [ChipSignature], component_id: u16) -> Option<ChipSignature> {
    table
        .iter()
        .find(|sig| sig.component_id == component_id)
        .copied()
}

/// Look up a Margay component id
pub fn margay_signature(component_id: u16) -> Option<ChipSignature> {
    lookup(MARGAY_SIGNATURES, component_id)
}

/// Look up a Cobra/Cub component id
pub fn cobra_signature(component_id: u16) -> Option<ChipSignature> {
    lookup(COBRA_SIGNATURES, component_id)
}

fn commit(
    sig: ChipSignature,
    component_id: u16,
    revision_id: u8,
    identity: &mut ExpanderIdentity,
) -> Resolution {
    identity.num_phys = sig.num_phys;
    identity.product_family = ProductFamily::Expander;
    identity.component_id = component_id;
    identity.revision_id = revision_id;
    identity.is_broadcom_expander = true;
    identity.chip_family = Some(sig.family);
    Resolution::Matched(sig)
}

/// Resolve a Margay signature into `identity`
///
/// The revision does not take part in the match.
pub fn resolve_margay_signature(
    component_id: u16,
    revision_id: u8,
    identity: &mut ExpanderIdentity,
) -> Resolution {
    match margay_signature(component_id) {
        Some(sig) => commit(sig, component_id, revision_id, identity),
        None => Resolution::Ignore,
    }
}

/// Resolve a Cobra/Cub signature into `identity`
pub fn resolve_cobra_signature(
    component_id: u16,
    revision_id: u8,
    identity: &mut ExpanderIdentity,
) -> Resolution {
    match cobra_signature(component_id) {
        Some(sig) => commit(sig, component_id, revision_id, identity),
        None => Resolution::Ignore,
    }
}

/// Try the Margay table, then the Cobra/Cub table
pub fn resolve_signature(
    component_id: u16,
    revision_id: u8,
    identity: &mut ExpanderIdentity,
) -> Resolution {
    match resolve_margay_signature(component_id, revision_id, identity) {
        Resolution::Ignore => resolve_cobra_signature(component_id, revision_id, identity),
        matched => matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::ChipFamily;

    #[test]
    fn test_margay_phy_counts() {
        let expected = [(0x240, 48), (0x242, 40), (0x244, 32), (0x246, 24)];
        for (id, phys) in expected {
            let sig = margay_signature(id).unwrap();
            assert_eq!(sig.num_phys, phys);
            assert_eq!(sig.family, ChipFamily::Margay);
        }
    }

    #[test]
    fn test_margay_0x242_any_revision() {
        for rev in [0x00, 0x01, 0xA0, 0xFF] {
            let mut id = ExpanderIdentity::new();
            let res = resolve_margay_signature(0x242, rev, &mut id);
            assert!(res.is_match());
            assert_eq!(id.num_phys, 40);
            assert!(id.is_broadcom_expander);
            assert_eq!(id.product_family, ProductFamily::Expander);
            assert_eq!(id.component_id, 0x242);
            assert_eq!(id.revision_id, rev);
        }
    }

    #[test]
    fn test_unknown_id_leaves_identity_untouched() {
        let mut id = ExpanderIdentity::new();
        id.sas_address.high = 0x5000_0000;
        let before = id.clone();

        assert_eq!(resolve_margay_signature(0x241, 1, &mut id), Resolution::Ignore);
        assert_eq!(id, before);
        assert_eq!(resolve_margay_signature(0x241, 1, &mut id), Resolution::Ignore);
        assert_eq!(id, before);

        // Cobra ids are not Margay ids
        assert_eq!(resolve_margay_signature(0x230, 0, &mut id), Resolution::Ignore);
        assert_eq!(id, before);
    }

    #[test]
    fn test_resolve_falls_back_to_cobra() {
        let mut id = ExpanderIdentity::new();
        let res = resolve_signature(0x236, 2, &mut id);
        match res {
            Resolution::Matched(sig) => assert_eq!(sig.family, ChipFamily::Cub),
            Resolution::Ignore => panic!("expected a match"),
        }
        assert_eq!(id.num_phys, 24);
        assert_eq!(id.chip_family, Some(ChipFamily::Cub));

        let mut other = ExpanderIdentity::new();
        assert_eq!(resolve_signature(0x123, 0, &mut other), Resolution::Ignore);
        assert_eq!(other, ExpanderIdentity::new());
    }
}
