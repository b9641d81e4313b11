//! SAS address readout

use crate::error::Result;
use crate::identity::{ExpanderIdentity, SasAddress};
use crate::regs::{SAS_ADDRESS_HIGH, SAS_ADDRESS_LOW};
use crate::transport::RegisterAccess;

/// Read both SAS address halves, high first
pub fn read_sas_address(regs: &mut dyn RegisterAccess) -> Result<SasAddress> {
    let high = regs.read32(SAS_ADDRESS_HIGH)?;
    let low = regs.read32(SAS_ADDRESS_LOW)?;
    Ok(SasAddress { high, low })
}

/// Read the SAS address into `identity`
///
/// The identity is only written once both halves were read.
pub fn assign_sas_address(
    regs: &mut dyn RegisterAccess,
    identity: &mut ExpanderIdentity,
) -> Result<()> {
    let address = read_sas_address(regs)?;
    log::debug!("sas: address {}", address);
    identity.sas_address = address;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testutil::MockRegisters;

    #[test]
    fn test_reads_high_then_low() {
        let mut mock = MockRegisters::new();
        mock.set_register(SAS_ADDRESS_HIGH, 0x5000_605B);
        mock.set_register(SAS_ADDRESS_LOW, 0x0123_4567);

        let mut id = ExpanderIdentity::new();
        assign_sas_address(&mut mock, &mut id).unwrap();
        assert_eq!(id.sas_address.as_u64(), 0x5000_605B_0123_4567);
        assert_eq!(mock.reads32, [SAS_ADDRESS_HIGH, SAS_ADDRESS_LOW]);
    }

    #[test]
    fn test_high_failure_stops_before_low() {
        let mut mock = MockRegisters::new();
        mock.fail_register(SAS_ADDRESS_HIGH);
        mock.set_register(SAS_ADDRESS_LOW, 0x0123_4567);

        let mut id = ExpanderIdentity::new();
        assert_eq!(
            assign_sas_address(&mut mock, &mut id),
            Err(Error::RegisterReadFailed {
                addr: SAS_ADDRESS_HIGH
            })
        );
        assert_eq!(mock.reads32, [SAS_ADDRESS_HIGH]);
        assert!(id.sas_address.is_zero());
    }

    #[test]
    fn test_low_failure_leaves_no_partial_address() {
        let mut mock = MockRegisters::new();
        mock.set_register(SAS_ADDRESS_HIGH, 0x5000_605B);
        mock.fail_register(SAS_ADDRESS_LOW);

        let mut id = ExpanderIdentity::new();
        assert!(assign_sas_address(&mut mock, &mut id).is_err());
        assert!(id.sas_address.is_zero());
    }
}
