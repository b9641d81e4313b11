//! List commands implementation

use sashal_core::chip;
use sashal_device::available_transports;

/// List all transports compiled into this build
pub fn list_transports() {
    let transports = available_transports();

    if transports.is_empty() {
        println!("No transports available (recompile with transport features enabled)");
        return;
    }

    println!("Available transports:");
    println!();
    for t in &transports {
        println!("  {:8} - {}", t.name, t.description);
        if !t.aliases.is_empty() {
            println!("  {:8}   aliases: {}", "", t.aliases.join(", "));
        }
    }
}

/// List all supported expander chips
pub fn list_chips(family_filter: Option<&str>) {
    println!("Supported expander chips:");
    println!();
    println!("{:<10} {:<12} {:>6} {:>12}", "Family", "Name", "Phys", "Component");
    println!("{}", "-".repeat(44));

    for chip in chip::all_signatures() {
        if let Some(family) = family_filter {
            if !chip.family.name().eq_ignore_ascii_case(family) {
                continue;
            }
        }

        println!(
            "{:<10} {:<12} {:>6} {:>12}",
            chip.family.name(),
            chip.name,
            chip.num_phys,
            format!("0x{:03X}", chip.component_id)
        );
    }
}
