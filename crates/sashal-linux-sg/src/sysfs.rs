//! Host PCI function lookup through sysfs

use std::path::Path;

use sashal_core::transport::PciAddress;

/// Class directory of sg nodes
pub const SG_CLASS: &str = "/sys/class/scsi_generic";
/// Class directory of bsg nodes
pub const BSG_CLASS: &str = "/sys/class/bsg";

/// Last `DDDD:BB:DD.F` component of a resolved sysfs device path
///
/// The deepest PCI component is the function closest to the device, i.e.
/// the HBA rather than an upstream bridge.
pub fn pci_address_in_path(path: &Path) -> Option<PciAddress> {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .filter(|c| c.matches(':').count() == 2 && c.contains('.'))
        .filter_map(PciAddress::parse)
        .last()
}

/// PCI function behind a device node such as `/dev/sg3` or
/// `/dev/bsg/expander-6:0`
pub fn pci_address_for_node(class: &str, node: &Path) -> Option<PciAddress> {
    let name = node.file_name()?.to_str()?;
    let device = Path::new(class).join(name).join("device");
    let resolved = std::fs::canonicalize(&device).ok()?;
    let addr = pci_address_in_path(&resolved);
    log::debug!("{}: sysfs {} -> {:?}", name, resolved.display(), addr);
    addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deepest_pci_component_wins() {
        let path = Path::new(
            "/sys/devices/pci0000:00/0000:00:01.0/0000:03:00.0/host6/port-6:0/expander-6:0",
        );
        let addr = pci_address_in_path(path).unwrap();
        assert_eq!(addr.to_string(), "0000:03:00.0");
    }

    #[test]
    fn test_no_pci_component() {
        let path = Path::new("/sys/devices/virtual/host0/target0:0:0/0:0:0:0");
        assert_eq!(pci_address_in_path(path), None);
    }
}
