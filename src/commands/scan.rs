//! Scan command implementation
//!
//! Visits every enabled inventory entry in file order. A device that is
//! ignored, fails to open or fails qualification is reported and the scan
//! moves on; the command fails at the end if any device failed.

use crate::inventory::Inventory;
use sashal_core::{qualify_expander, Qualification};
use sashal_device::open_device;
use std::path::Path;

/// Outcome of one inventory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanOutcome {
    Found,
    Ignored,
    Failed,
}

fn scan_one(name: &str, transport: &str) -> ScanOutcome {
    let mut expander = match open_device(transport) {
        Ok(expander) => expander,
        Err(e) => {
            log::error!("{}: failed to open {}: {}", name, transport, e);
            println!("{:<20} open failed: {}", name, e);
            return ScanOutcome::Failed;
        }
    };

    match qualify_expander(expander.device_handle()) {
        Ok(Qualification::Success(id)) => {
            println!("{:<20} {}", name, id);
            ScanOutcome::Found
        }
        Ok(Qualification::Ignore) => {
            println!("{:<20} ignored", name);
            ScanOutcome::Ignored
        }
        Err(e) => {
            println!("{:<20} qualification failed: {} ({})", name, e, e.status());
            ScanOutcome::Failed
        }
    }
}

/// Qualify every enabled device of an inventory file
pub fn run_scan(config: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let inventory = Inventory::from_toml_file(config)?;
    log::info!(
        "Loaded {} devices from {}",
        inventory.devices.len(),
        config.display()
    );

    let mut found = 0usize;
    let mut ignored = 0usize;
    let mut failed = 0usize;
    for device in inventory.enabled() {
        match scan_one(&device.name, &device.transport) {
            ScanOutcome::Found => found += 1,
            ScanOutcome::Ignored => ignored += 1,
            ScanOutcome::Failed => failed += 1,
        }
    }

    println!();
    println!(
        "{} expanders found, {} ignored, {} failed",
        found, ignored, failed
    );
    if failed > 0 {
        return Err(format!("{} devices failed", failed).into());
    }
    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_scan_outcomes() {
        assert_eq!(scan_one("a", "dummy:family=cobra"), ScanOutcome::Found);
        assert_eq!(scan_one("b", "dummy:family=unknown"), ScanOutcome::Ignored);
        assert_eq!(
            scan_one("c", "dummy:foreign=1,transport=scsi"),
            ScanOutcome::Ignored
        );
        assert_eq!(scan_one("d", "nonexistent"), ScanOutcome::Failed);
    }

    #[test]
    fn test_scan_inventory_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[[device]]\nname = \"bench\"\ntransport = \"dummy:transport=smp\"\n\n\
             [[device]]\nname = \"broken\"\ntransport = \"nonexistent\"\nenabled = false\n"
        )
        .unwrap();
        run_scan(file.path()).unwrap();
    }
}
