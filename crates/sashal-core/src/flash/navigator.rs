//! Flash table and image chain navigation
//!
//! All offsets handed in and out of this module are relative to the flash
//! base returned by [`flash_base`]. Every step that turns an offset into a
//! bus address uses checked arithmetic, and chain walks are bounded both
//! in step count and by the window of the region they belong to.

use alloc::vec::Vec;
use core::ops::Range;

use crate::error::{Error, Result};
use crate::image::{
    flash_table_entry_count, flash_table_size, is_no_chain, ChainedHeader, ChainedImageType,
    FirmwareHeader, FlashRegionEntry, FlashTable, CHAINED_HEADER_SIZE, FIRMWARE_HEADER_SIZE,
};
use crate::regs::{PowerOnSense, POWER_ON_SENSE};
use crate::transport::RegisterAccess;

/// Upper bound on chained headers visited in one walk
pub const MAX_CHAIN_STEPS: usize = 32;

/// Boot loader header and flash table, as read from the chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootloaderFlashTable {
    /// Bus address of the flash window
    pub flash_base: u32,
    /// Boot loader firmware header
    pub header: FirmwareHeader,
    /// Decoded flash table
    pub table: FlashTable,
}

/// One visited chain link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    /// Flash-relative offset of the header
    pub offset: u32,
    /// Decoded header
    pub header: ChainedHeader,
}

/// Flash window selected by the Power-On-Sense straps
pub fn flash_base(regs: &mut dyn RegisterAccess) -> Result<u32> {
    let pos = PowerOnSense::from_bits_retain(regs.read32(POWER_ON_SENSE)?);
    let base = pos.flash_base();
    log::debug!("flash: POS 0x{:08X}, flash base 0x{:08X}", pos.bits(), base);
    Ok(base)
}

/// Read and validate the firmware header at `addr`
pub fn read_firmware_header(regs: &mut dyn RegisterAccess, addr: u32) -> Result<FirmwareHeader> {
    let mut raw = [0u8; FIRMWARE_HEADER_SIZE];
    regs.read(addr, &mut raw)?;
    FirmwareHeader::parse(&raw)
}

/// Read the boot loader header and its flash table
///
/// The first table dword gives the entry count; the whole table is then
/// fetched with a single block read of exactly `count * 12 + 4` bytes.
pub fn upload_bootloader_flash_table(
    regs: &mut dyn RegisterAccess,
) -> Result<BootloaderFlashTable> {
    let base = flash_base(regs)?;
    let header = read_firmware_header(regs, base)?;

    let table_addr = base
        .checked_add(header.flash_table_offset)
        .ok_or(Error::CorruptImage {
            offset: header.flash_table_offset,
        })?;
    let count = flash_table_entry_count(regs.read32(table_addr)?);
    let size = flash_table_size(count);
    log::debug!(
        "flash: table at 0x{:08X}, {} entries ({} bytes)",
        table_addr,
        count,
        size
    );

    let raw = read_exact(regs, table_addr, size)?;
    let table = FlashTable::parse(&raw)?;

    Ok(BootloaderFlashTable {
        flash_base: base,
        header,
        table,
    })
}

fn read_exact(regs: &mut dyn RegisterAccess, addr: u32, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::NoMemory)?;
    buf.resize(len, 0);
    regs.read(addr, &mut buf)?;
    Ok(buf)
}

fn check_window(offset: u32, len: usize, window: &Range<u32>) -> Result<()> {
    let end = offset
        .checked_add(len as u32)
        .ok_or(Error::ChainOutOfBounds { offset })?;
    if offset < window.start || end > window.end {
        return Err(Error::ChainOutOfBounds { offset });
    }
    Ok(())
}

/// Walk a chain, handing each valid header to `visit` until it returns true
///
/// Returns the entry `visit` stopped on, or `None` when the chain ended.
fn walk(
    regs: &mut dyn RegisterAccess,
    flash_base: u32,
    first_offset: u32,
    window: &Range<u32>,
    mut visit: impl FnMut(&ChainEntry) -> bool,
) -> Result<Option<ChainEntry>> {
    let mut offset = first_offset;

    for _ in 0..MAX_CHAIN_STEPS {
        check_window(offset, CHAINED_HEADER_SIZE, window)?;
        let addr = flash_base
            .checked_add(offset)
            .ok_or(Error::ChainOutOfBounds { offset })?;

        let mut raw = [0u8; CHAINED_HEADER_SIZE];
        regs.read(addr, &mut raw)?;
        let header = ChainedHeader::parse(&raw).map_err(|e| match e {
            Error::InvalidChainedHeader { .. } => Error::InvalidChainedHeader { offset },
            other => other,
        })?;
        log::debug!(
            "chain: 0x{:08X} {:?} {} size 0x{:X} next 0x{:X}",
            offset,
            header.header_type,
            header.image_type,
            header.image_size,
            header.next_image_offset
        );

        let entry = ChainEntry { offset, header };
        if visit(&entry) {
            return Ok(Some(entry));
        }
        if is_no_chain(header.next_image_offset) {
            return Ok(None);
        }
        offset = offset
            .checked_add(header.next_image_offset)
            .ok_or(Error::ChainOutOfBounds { offset })?;
    }

    log::warn!("chain: more than {} images", MAX_CHAIN_STEPS);
    Err(Error::ChainTooLong)
}

/// Find the first chained image of `image_type` and read its payload
///
/// `first_offset` is the flash-relative offset of the first chained header
/// and `window` the flash-relative span the chain must stay inside.
pub fn locate_chained_image(
    regs: &mut dyn RegisterAccess,
    flash_base: u32,
    first_offset: u32,
    window: Range<u32>,
    image_type: ChainedImageType,
) -> Result<Vec<u8>> {
    if is_no_chain(first_offset) {
        return Err(Error::ChainEmpty);
    }

    let entry = walk(regs, flash_base, first_offset, &window, |e| {
        e.header.image_type == image_type
    })?
    .ok_or(Error::ImageNotFound)?;

    let offset = entry.offset;
    let len = entry
        .header
        .payload_len()
        .ok_or(Error::CorruptImage { offset })?;
    let content = offset
        .checked_add(entry.header.offset_to_content)
        .ok_or(Error::CorruptImage { offset })?;
    check_window(content, len as usize, &window).map_err(|_| Error::CorruptImage { offset })?;
    let addr = flash_base
        .checked_add(content)
        .ok_or(Error::CorruptImage { offset })?;

    read_exact(regs, addr, len as usize)
}

/// Every header of a chain, in order
///
/// A sentinel `first_offset` yields an empty list.
pub fn walk_chain(
    regs: &mut dyn RegisterAccess,
    flash_base: u32,
    first_offset: u32,
    window: Range<u32>,
) -> Result<Vec<ChainEntry>> {
    let mut entries = Vec::new();
    if is_no_chain(first_offset) {
        return Ok(entries);
    }
    walk(regs, flash_base, first_offset, &window, |e| {
        entries.push(*e);
        false
    })?;
    Ok(entries)
}

/// Firmware header of a flash table region and the chain behind it
///
/// The chain starts `next_image_offset` bytes into the region and must
/// stay inside it.
pub fn walk_region_chain(
    regs: &mut dyn RegisterAccess,
    flash_base: u32,
    entry: &FlashRegionEntry,
) -> Result<(FirmwareHeader, Vec<ChainEntry>)> {
    let addr = flash_base
        .checked_add(entry.region_offset)
        .ok_or(Error::CorruptImage {
            offset: entry.region_offset,
        })?;
    let header = read_firmware_header(regs, addr)?;
    if is_no_chain(header.next_image_offset) {
        return Ok((header, Vec::new()));
    }
    let first = entry
        .region_offset
        .checked_add(header.next_image_offset)
        .ok_or(Error::ChainOutOfBounds {
            offset: entry.region_offset,
        })?;
    let window = entry.region_offset..entry.region_end();
    let entries = walk_chain(regs, flash_base, first, window)?;
    Ok((header, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FwVersion;
    use crate::image::builder::{chained_header_offset, dual_copy_image, DEFAULT_TABLE_OFFSET};
    use crate::image::{FwStatusImage, HeaderType, RegionType, FW_STATUS_SIZE};
    use crate::regs::{SPI_FLASH_BASE, XMEM_FLASH_BASE};
    use crate::testutil::MockRegisters;
    use alloc::vec;

    fn chained_bytes(headers: &[(u32, ChainedHeader)], payload: &[(u32, &[u8])]) -> Vec<u8> {
        let mut image = vec![0xFFu8; 0x4000];
        for (at, hdr) in headers {
            let at = *at as usize;
            image[at..at + CHAINED_HEADER_SIZE].copy_from_slice(&hdr.to_bytes());
        }
        for (at, bytes) in payload {
            let at = *at as usize;
            image[at..at + bytes.len()].copy_from_slice(bytes);
        }
        image
    }

    fn link(image_type: ChainedImageType, payload_len: u32, next: u32) -> ChainedHeader {
        let mut hdr = ChainedHeader::new(HeaderType::Lsi, image_type, payload_len);
        hdr.next_image_offset = next;
        hdr
    }

    fn header_reads(mock: &MockRegisters) -> usize {
        mock.block_reads
            .iter()
            .filter(|(_, len)| *len == CHAINED_HEADER_SIZE)
            .count()
    }

    #[test]
    fn test_flash_base_follows_straps() {
        let image = dual_copy_image(1, FwVersion(1), FwVersion(2));
        let mut spi = MockRegisters::with_flash(&image, false);
        assert_eq!(flash_base(&mut spi).unwrap(), SPI_FLASH_BASE);
        let mut xmem = MockRegisters::with_flash(&image, true);
        assert_eq!(flash_base(&mut xmem).unwrap(), XMEM_FLASH_BASE);
    }

    #[test]
    fn test_flash_base_read_failure_propagates() {
        let mut mock = MockRegisters::new();
        mock.fail_register(POWER_ON_SENSE);
        assert_eq!(
            flash_base(&mut mock),
            Err(Error::RegisterReadFailed {
                addr: POWER_ON_SENSE
            })
        );
    }

    #[test]
    fn test_two_entry_table_read_is_28_bytes() {
        let image = crate::image::builder::FlashImageBuilder::new(0x4000)
            .region(RegionType::Config, 0x1000, 0x1000)
            .region(RegionType::Log, 0x2000, 0x1000)
            .build();
        let mut mock = MockRegisters::with_flash(&image, false);

        let bft = upload_bootloader_flash_table(&mut mock).unwrap();
        assert_eq!(bft.flash_base, SPI_FLASH_BASE);
        assert_eq!(bft.table.entries.len(), 2);
        assert_eq!(bft.table.entries[1].region_type, RegionType::Log);

        let table_addr = SPI_FLASH_BASE + DEFAULT_TABLE_OFFSET;
        let table_reads: Vec<_> = mock
            .block_reads
            .iter()
            .filter(|(addr, _)| *addr == table_addr)
            .collect();
        assert_eq!(table_reads, [&(table_addr, 28)]);
    }

    #[test]
    fn test_bad_boot_signature_fails_before_table() {
        let mut image = dual_copy_image(1, FwVersion(1), FwVersion(2));
        image[0x08] ^= 0xFF;
        let mut mock = MockRegisters::with_flash(&image, false);

        assert_eq!(
            upload_bootloader_flash_table(&mut mock),
            Err(Error::InvalidSignature)
        );
        assert_eq!(mock.block_reads.len(), 1);
        assert_eq!(mock.reads32, [POWER_ON_SENSE]);
    }

    #[test]
    fn test_finds_image_in_k_steps() {
        let image = chained_bytes(
            &[
                (0x100, link(ChainedImageType::Signature, 0x10, 0x100)),
                (0x200, link(ChainedImageType::Config, 0x10, 0x100)),
                (0x300, link(ChainedImageType::FwStatus, 8, 0)),
            ],
            &[(0x300 + CHAINED_HEADER_SIZE as u32, &[0xFF; 8])],
        );
        let mut mock = MockRegisters::new();
        mock.map_bytes(0, &image);

        let payload =
            locate_chained_image(&mut mock, 0, 0x100, 0..0x4000, ChainedImageType::FwStatus)
                .unwrap();
        assert_eq!(payload.len(), FW_STATUS_SIZE);
        assert!(FwStatusImage::parse(&payload).unwrap().is_active());
        assert_eq!(header_reads(&mock), 3);

        let mut mock = MockRegisters::new();
        mock.map_bytes(0, &image);
        locate_chained_image(&mut mock, 0, 0x100, 0..0x4000, ChainedImageType::Config).unwrap();
        assert_eq!(header_reads(&mock), 2);
    }

    #[test]
    fn test_sentinel_offsets() {
        let mut mock = MockRegisters::new();
        for sentinel in [0, 0xFFFF_FFFF] {
            assert_eq!(
                locate_chained_image(&mut mock, 0, sentinel, 0..0x4000, ChainedImageType::FwStatus),
                Err(Error::ChainEmpty)
            );
        }
        assert_eq!(mock.total_accesses(), 0);

        let image = chained_bytes(&[(0x100, link(ChainedImageType::Config, 4, 0))], &[]);
        mock.map_bytes(0, &image);
        assert_eq!(
            locate_chained_image(&mut mock, 0, 0x100, 0..0x4000, ChainedImageType::FwStatus),
            Err(Error::ImageNotFound)
        );
    }

    #[test]
    fn test_runaway_chain_hits_step_bound() {
        let headers: Vec<_> = (1..40u32)
            .map(|i| (i * 0x60, link(ChainedImageType::Config, 4, 0x60)))
            .collect();
        let image = chained_bytes(&headers, &[]);
        let mut mock = MockRegisters::new();
        mock.map_bytes(0, &image);
        assert_eq!(
            locate_chained_image(&mut mock, 0, 0x60, 0..0x4000, ChainedImageType::FwStatus),
            Err(Error::ChainTooLong)
        );
        assert_eq!(header_reads(&mock), MAX_CHAIN_STEPS);
    }

    #[test]
    fn test_unknown_header_type_stops_walk() {
        let mut image = chained_bytes(&[(0x100, link(ChainedImageType::Config, 4, 0x100))], &[]);
        image[0x203] = 0x12;
        let mut mock = MockRegisters::new();
        mock.map_bytes(0, &image);
        assert_eq!(
            locate_chained_image(&mut mock, 0, 0x100, 0..0x4000, ChainedImageType::FwStatus),
            Err(Error::InvalidChainedHeader { offset: 0x200 })
        );
    }

    #[test]
    fn test_wrapping_offset_rejected() {
        let image = chained_bytes(&[(0x100, link(ChainedImageType::Config, 4, 0xFFFF_FF00))], &[]);
        let mut mock = MockRegisters::new();
        mock.map_bytes(0, &image);
        assert_eq!(
            locate_chained_image(&mut mock, 0, 0x100, 0..0x4000, ChainedImageType::FwStatus),
            Err(Error::ChainOutOfBounds { offset: 0x100 })
        );
        assert_eq!(header_reads(&mock), 1);
    }

    #[test]
    fn test_chain_leaving_window_rejected() {
        let image = chained_bytes(&[(0x100, link(ChainedImageType::Config, 4, 0x1000))], &[]);
        let mut mock = MockRegisters::new();
        mock.map_bytes(0, &image);
        assert_eq!(
            locate_chained_image(&mut mock, 0, 0x100, 0x100..0x800, ChainedImageType::FwStatus),
            Err(Error::ChainOutOfBounds { offset: 0x1100 })
        );
        assert_eq!(header_reads(&mock), 1);
    }

    #[test]
    fn test_undersized_image_is_corrupt() {
        let mut hdr = link(ChainedImageType::FwStatus, 8, 0);
        hdr.image_size = 0x20;
        let image = chained_bytes(&[(0x100, hdr)], &[]);
        let mut mock = MockRegisters::new();
        mock.map_bytes(0, &image);
        assert_eq!(
            locate_chained_image(&mut mock, 0, 0x100, 0..0x4000, ChainedImageType::FwStatus),
            Err(Error::CorruptImage { offset: 0x100 })
        );
    }

    #[test]
    fn test_walk_chain_lists_region() {
        let image = dual_copy_image(1, FwVersion(1), FwVersion(2));
        let mut mock = MockRegisters::with_flash(&image, false);
        let first = chained_header_offset(0x2_0000, &[]);
        let entries = walk_chain(&mut mock, SPI_FLASH_BASE, first, 0x2_0000..0x8_0000).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].offset, first);
        assert_eq!(entries[0].header.image_type, ChainedImageType::Signature);
        assert_eq!(entries[1].header.image_type, ChainedImageType::FwStatus);
        assert_eq!(entries[1].offset, chained_header_offset(0x2_0000, &[16]));

        assert!(walk_chain(&mut mock, SPI_FLASH_BASE, 0, 0..0x10_0000)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_walk_region_chain() {
        let image = dual_copy_image(2, FwVersion(1), FwVersion(2));
        let mut mock = MockRegisters::with_flash(&image, true);
        let bft = upload_bootloader_flash_table(&mut mock).unwrap();

        let fw2 = bft.table.find(RegionType::FirmwareCopy2).unwrap();
        let (header, entries) = walk_region_chain(&mut mock, XMEM_FLASH_BASE, fw2).unwrap();
        assert_eq!(header.fw_version, FwVersion(2));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].offset, chained_header_offset(fw2.region_offset, &[]));

        let bl = bft.table.find(RegionType::BootLoader).unwrap();
        let (_, bl_entries) = walk_region_chain(&mut mock, XMEM_FLASH_BASE, bl).unwrap();
        assert_eq!(bl_entries.len(), 1);
        assert_eq!(
            bl_entries[0].header.image_type,
            ChainedImageType::ManufacturingData
        );
    }
}
