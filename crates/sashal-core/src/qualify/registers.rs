//! Register-access qualification strategy

use super::Qualification;
use crate::chip::resolve_signature;
use crate::error::Result;
use crate::flash::select_active_firmware;
use crate::identity::ExpanderIdentity;
use crate::regs::{decode_component_id, COMPONENT_ID};
use crate::sas::assign_sas_address;
use crate::transport::RegisterAccess;

pub(super) fn qualify(regs: &mut dyn RegisterAccess) -> Result<Qualification> {
    let raw = match regs.read32(COMPONENT_ID) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("qualify: component id unreadable: {}", e);
            return Ok(Qualification::Ignore);
        }
    };
    let (component_id, revision_id) = decode_component_id(raw);

    let mut identity = ExpanderIdentity::new();
    if !resolve_signature(component_id, revision_id, &mut identity).is_match() {
        log::debug!(
            "qualify: component 0x{:03X} rev 0x{:02X} is not a known expander",
            component_id,
            revision_id
        );
        return Ok(Qualification::Ignore);
    }

    assign_sas_address(regs, &mut identity)?;
    identity.fw_version = Some(select_active_firmware(regs)?.version);
    identity.host_pci_address = regs.pci_address();
    Ok(Qualification::Success(identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::ChipFamily;
    use crate::error::Error;
    use crate::identity::{FwVersion, ProductFamily};
    use crate::image::builder::dual_copy_image;
    use crate::regs::{encode_component_id, SAS_ADDRESS_HIGH, SAS_ADDRESS_LOW};
    use crate::testutil::MockRegisters;

    fn expander(component_id: u16, revision: u8) -> MockRegisters {
        let image = dual_copy_image(2, FwVersion(0x0100_0000), FwVersion(0x1003_0205));
        let mut mock = MockRegisters::with_flash(&image, true);
        mock.set_register(COMPONENT_ID, encode_component_id(component_id, revision));
        mock.set_register(SAS_ADDRESS_HIGH, 0x5000_605B);
        mock.set_register(SAS_ADDRESS_LOW, 0x0000_00FF);
        mock
    }

    #[test]
    fn test_margay_qualifies() {
        let mut mock = expander(0x242, 0x01);
        let id = match qualify(&mut mock).unwrap() {
            Qualification::Success(id) => id,
            Qualification::Ignore => panic!("expected a match"),
        };
        assert_eq!(id.chip_family, Some(ChipFamily::Margay));
        assert_eq!(id.num_phys, 40);
        assert_eq!(id.product_family, ProductFamily::Expander);
        assert_eq!(id.sas_address.as_u64(), 0x5000_605B_0000_00FF);
        assert_eq!(id.fw_version, Some(FwVersion(0x1003_0205)));
        assert_eq!(id.host_pci_address, None);
    }

    #[test]
    fn test_unreadable_component_id_ignored() {
        let mut mock = expander(0x242, 0x01);
        mock.fail_register(COMPONENT_ID);
        assert_eq!(qualify(&mut mock).unwrap(), Qualification::Ignore);
        assert_eq!(mock.reads32, [COMPONENT_ID]);
    }

    #[test]
    fn test_unknown_component_ignored_without_further_reads() {
        let mut mock = expander(0x111, 0x01);
        assert_eq!(qualify(&mut mock).unwrap(), Qualification::Ignore);
        assert_eq!(mock.total_accesses(), 1);
    }

    #[test]
    fn test_failure_after_match_is_an_error() {
        let mut mock = expander(0x230, 0x00);
        mock.fail_register(SAS_ADDRESS_LOW);
        assert_eq!(
            qualify(&mut mock),
            Err(Error::RegisterReadFailed {
                addr: SAS_ADDRESS_LOW
            })
        );

        let mut blank = MockRegisters::new();
        blank.set_register(COMPONENT_ID, encode_component_id(0x230, 0));
        blank.set_register(SAS_ADDRESS_HIGH, 1);
        blank.set_register(SAS_ADDRESS_LOW, 2);
        assert!(qualify(&mut blank).is_err());
    }
}
