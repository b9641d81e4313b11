//! Flash table, chain and region read commands

use indicatif::{ProgressBar, ProgressStyle};
use sashal_core::flash::{upload_bootloader_flash_table, walk_region_chain};
use sashal_core::image::{FlashRegionEntry, HeaderType, RegionType};
use sashal_core::Error;
use sashal_device::ExpanderHandle;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Bytes fetched per transport read
const READ_CHUNK_SIZE: usize = 4096;

fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Create a standard progress bar style
fn create_progress_bar_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
        .progress_chars("#>-"))
}

/// Look up a region in the flash table
fn find_region(
    expander: &mut ExpanderHandle,
    region: RegionType,
) -> Result<(u32, FlashRegionEntry), Box<dyn std::error::Error>> {
    let bft = expander
        .device_handle()
        .with_registers(upload_bootloader_flash_table)?;
    let entry = bft
        .table
        .find(region)
        .copied()
        .ok_or_else(|| format!("Region {} is not in the flash table", region))?;
    Ok((bft.flash_base, entry))
}

/// Print the boot loader flash table
pub fn run_flash_table(expander: &mut ExpanderHandle) -> Result<(), Box<dyn std::error::Error>> {
    let bft = expander
        .device_handle()
        .with_registers(upload_bootloader_flash_table)?;

    println!("Flash base:      0x{:08X}", bft.flash_base);
    println!("Boot loader:     {}", bft.header.fw_version);
    if let Some(name) = bft.header.version_name() {
        println!("Version name:    {}", name);
    }
    println!(
        "Flash table:     0x{:08X} (version {}, {} entries)",
        bft.header.flash_table_offset,
        bft.table.version,
        bft.table.entries.len()
    );
    println!();
    println!(
        "{:<20} {:>10} {:>10} {:>10}  Bus",
        "Region", "Offset", "Size", "End"
    );
    println!("{}", "-".repeat(62));
    for entry in &bft.table.entries {
        let bus = if entry.flags.dev_type() { "xmem" } else { "spi" };
        println!(
            "{:<20} 0x{:08X} {:>10} 0x{:08X}  {} cs{}",
            entry.region_type.to_string(),
            entry.region_offset,
            format_size(entry.region_size),
            entry.region_end(),
            bus,
            entry.flags.chip_sel()
        );
    }
    Ok(())
}

/// List the chained images of one region
pub fn run_chain(
    expander: &mut ExpanderHandle,
    region: RegionType,
) -> Result<(), Box<dyn std::error::Error>> {
    if !region.is_firmware_bearing() {
        return Err(format!("Region {} carries no firmware header", region).into());
    }
    let (flash_base, entry) = find_region(expander, region)?;
    let (header, chain) = expander
        .device_handle()
        .with_registers(|regs| walk_region_chain(regs, flash_base, &entry))?;

    println!(
        "{} at 0x{:08X}: firmware {}",
        region, entry.region_offset, header.fw_version
    );
    if chain.is_empty() {
        println!("No chained images");
        return Ok(());
    }
    println!();
    println!(
        "{:>10}  {:<6} {:<22} {:>10} {:>10}",
        "Offset", "Header", "Image", "Size", "Next"
    );
    println!("{}", "-".repeat(64));
    for link in &chain {
        let kind = match link.header.header_type {
            HeaderType::Firmware => "fw",
            HeaderType::Oem => "oem",
            HeaderType::Lsi => "lsi",
        };
        println!(
            "0x{:08X}  {:<6} {:<22} {:>10} 0x{:08X}",
            link.offset,
            kind,
            link.header.image_type.to_string(),
            format!("0x{:X}", link.header.image_size),
            link.header.next_image_offset
        );
    }
    Ok(())
}

/// Read one flash table region into a file
pub fn run_read_region(
    expander: &mut ExpanderHandle,
    region: RegionType,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let (flash_base, entry) = find_region(expander, region)?;
    let start = flash_base
        .checked_add(entry.region_offset)
        .ok_or(Error::CorruptImage {
            offset: entry.region_offset,
        })?;
    let total = entry.region_size as usize;

    println!(
        "Reading {} ({}) from 0x{:08X}...",
        region,
        format_size(entry.region_size),
        start
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(create_progress_bar_style()?);

    let mut data = Vec::new();
    data.try_reserve_exact(total).map_err(|_| Error::NoMemory)?;
    data.resize(total, 0);

    expander.device_handle().with_registers(|regs| {
        for (index, chunk) in data.chunks_mut(READ_CHUNK_SIZE).enumerate() {
            let addr = start
                .checked_add((index * READ_CHUNK_SIZE) as u32)
                .ok_or(Error::InvalidParameter)?;
            regs.read(addr, chunk)?;
            pb.inc(chunk.len() as u64);
        }
        Ok(())
    })?;

    pb.finish_with_message("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0x6_0000), "384 KiB");
        assert_eq!(format_size(0x10_0000), "1 MiB");
        assert_eq!(format_size(0x54), "84 B");
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_read_region_from_dummy() {
        let mut expander = sashal_device::open_device("dummy:active=2").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("fw2.bin");

        run_read_region(&mut expander, RegionType::FirmwareCopy2, &out).unwrap();
        let data = std::fs::read(&out).unwrap();
        assert_eq!(data.len(), 0x6_0000);
        assert!(sashal_core::image::has_firmware_signature(&data));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_foreign_scsi_device_refused() {
        let mut expander = sashal_device::open_device("dummy:foreign=1,transport=scsi").unwrap();
        let err = run_flash_table(&mut expander).unwrap_err();
        assert_eq!(err.to_string(), Error::Unsupported.to_string());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_chain_rejects_data_regions() {
        let mut expander = sashal_device::open_device("dummy").unwrap();
        assert!(run_chain(&mut expander, RegionType::Config).is_err());
        assert!(run_chain(&mut expander, RegionType::FirmwareCopy1).is_ok());
    }
}
