//! Qualify command implementation

use sashal_core::{qualify_expander, ExpanderIdentity, Qualification};
use sashal_device::ExpanderHandle;

/// Print an identity in the labelled block format
fn print_identity(id: &ExpanderIdentity) {
    let family = id.chip_family.map_or("unknown", |f| f.name());
    println!("Family:          {}", family);
    println!(
        "Component:       0x{:03X} rev 0x{:02X}",
        id.component_id, id.revision_id
    );
    println!("Phys:            {}", id.num_phys);
    println!("SAS address:     {}", id.sas_address);
    match id.fw_version {
        Some(version) => println!("Firmware:        {}", version),
        None => println!("Firmware:        unknown"),
    }
    if let Some(pci) = id.host_pci_address {
        println!("Host PCI:        {}", pci);
    }
    if !id.vendor.is_empty() {
        println!(
            "Vendor/product:  {} {} {}",
            id.vendor, id.product, id.product_revision
        );
    }
    if !id.component_vendor.is_empty() {
        println!("Component vendor: {}", id.component_vendor);
    }
}

/// Qualify the expander and print what was found
pub fn run_qualify(
    expander: &mut ExpanderHandle,
    as_toml: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match qualify_expander(expander.device_handle())? {
        Qualification::Success(id) => {
            if as_toml {
                print!("{}", toml::to_string(&id)?);
            } else {
                println!("Expander found on {}", expander.name());
                println!();
                print_identity(&id);
            }
        }
        Qualification::Ignore => {
            println!("{}: ignored (not a supported Broadcom expander)", expander.name());
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use sashal_device::open_device;

    #[test]
    fn test_identity_serializes_to_toml() {
        let mut expander = open_device("dummy:family=cub,transport=scsi").unwrap();
        let id = qualify_expander(expander.device_handle())
            .unwrap()
            .into_identity()
            .unwrap();
        let text = toml::to_string(&id).unwrap();
        assert!(text.contains("component_id = 566"));
        assert!(text.contains("chip_family = \"Cub\""));
    }

    #[test]
    fn test_run_qualify_ignores_unknown_component() {
        let mut expander = open_device("dummy:family=unknown").unwrap();
        run_qualify(&mut expander, false).unwrap();
    }
}
