//! Firmware command implementation

use sashal_core::flash::{get_active_firmware_version, scan_firmware_regions, RegionState};
use sashal_device::ExpanderHandle;

/// Print the active firmware, or every firmware region with `all`
pub fn run_firmware(
    expander: &mut ExpanderHandle,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !all {
        let active = get_active_firmware_version(expander.device_handle())?;
        println!(
            "Active firmware: {} ({} at 0x{:08X})",
            active.version, active.region_type, active.region_offset
        );
        return Ok(());
    }

    let (bft, reports) = expander
        .device_handle()
        .with_registers(scan_firmware_regions)?;

    println!("Flash base:      0x{:08X}", bft.flash_base);
    println!("Boot loader:     {}", bft.header.fw_version);
    println!();
    println!("{:<14} {:>10} {:>12}  State", "Region", "Offset", "Version");
    println!("{}", "-".repeat(60));
    for report in &reports {
        let version = report
            .version
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "{:<14} 0x{:08X} {:>12}  {}",
            report.entry.region_type.to_string(),
            report.entry.region_offset,
            version,
            report.state
        );
    }

    // First active region in table order
    let active = reports.iter().find_map(|r| match (r.state, r.version) {
        (RegionState::Active, Some(version)) => Some((r, version)),
        _ => None,
    });
    println!();
    match active {
        Some((report, version)) => println!(
            "Active firmware: {} ({})",
            version, report.entry.region_type
        ),
        None => println!("Active firmware: none"),
    }
    Ok(())
}
