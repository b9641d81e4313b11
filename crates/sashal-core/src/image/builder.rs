//! Synthetic flash image builder
//!
//! Produces flash contents in the on-chip format: a boot header at offset
//! 0 pointing to the flash table, firmware headers at the start of each
//! firmware-bearing region, and a chain of sub-images behind each header.
//! Used by the emulator and by tests.

use alloc::vec;
use alloc::vec::Vec;

use super::{
    flash_table_size, ChainedHeader, ChainedImageType, FirmwareHeader, FlashRegionEntry,
    FlashTable, FwStatusImage, HeaderType, RegionFlags, RegionType, CHAINED_HEADER_SIZE,
    FW_STATE_ACTIVE,
};
use crate::identity::FwVersion;

/// Default flash table offset, relative to the boot header
pub const DEFAULT_TABLE_OFFSET: u32 = 0x100;

/// Default chain start, relative to the region's firmware header
pub const DEFAULT_CHAIN_START: u32 = 0x400;

const CHAIN_ALIGN: usize = 16;

/// One sub-image to append to a region's chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedImage {
    /// Header type tag
    pub header_type: HeaderType,
    /// Image type
    pub image_type: ChainedImageType,
    /// Payload bytes
    pub payload: Vec<u8>,
}

impl ChainedImage {
    /// Arbitrary sub-image
    pub fn new(header_type: HeaderType, image_type: ChainedImageType, payload: &[u8]) -> Self {
        Self {
            header_type,
            image_type,
            payload: payload.to_vec(),
        }
    }

    /// Firmware status image; `active` leaves the state at the erased value
    pub fn fw_status(active: bool) -> Self {
        let status = FwStatusImage {
            current_state: if active { FW_STATE_ACTIVE } else { 0 },
            checksum_adjustment: 0,
        };
        Self::new(
            HeaderType::Firmware,
            ChainedImageType::FwStatus,
            &status.to_bytes(),
        )
    }
}

#[derive(Debug, Clone)]
struct RegionSpec {
    entry: FlashRegionEntry,
    firmware: Option<(FwVersion, Vec<ChainedImage>)>,
}

/// Builder for a complete flash image
#[derive(Debug, Clone)]
pub struct FlashImageBuilder {
    size: usize,
    table_offset: u32,
    chain_start: u32,
    boot_version: FwVersion,
    regions: Vec<RegionSpec>,
    patches: Vec<(usize, Vec<u8>)>,
}

impl FlashImageBuilder {
    /// Start an image of `size` bytes, erased to 0xFF
    pub fn new(size: usize) -> Self {
        Self {
            size,
            table_offset: DEFAULT_TABLE_OFFSET,
            chain_start: DEFAULT_CHAIN_START,
            boot_version: FwVersion::default(),
            regions: Vec::new(),
            patches: Vec::new(),
        }
    }

    /// Override the flash table offset
    pub fn table_offset(mut self, offset: u32) -> Self {
        self.table_offset = offset;
        self
    }

    /// Override where chains start inside each firmware region
    pub fn chain_start(mut self, offset: u32) -> Self {
        self.chain_start = offset;
        self
    }

    /// Version written into the boot header when no region sits at offset 0
    pub fn boot_version(mut self, version: FwVersion) -> Self {
        self.boot_version = version;
        self
    }

    /// Add a plain region (table entry only)
    pub fn region(mut self, region_type: RegionType, offset: u32, size: u32) -> Self {
        self.regions.push(RegionSpec {
            entry: entry(region_type, offset, size),
            firmware: None,
        });
        self
    }

    /// Add a firmware-bearing region with a header and a chain
    pub fn firmware(
        mut self,
        region_type: RegionType,
        offset: u32,
        size: u32,
        version: FwVersion,
        chain: Vec<ChainedImage>,
    ) -> Self {
        self.regions.push(RegionSpec {
            entry: entry(region_type, offset, size),
            firmware: Some((version, chain)),
        });
        self
    }

    /// Overwrite bytes after everything else has been laid out
    pub fn patch(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.patches.push((offset, bytes.to_vec()));
        self
    }

    /// Lay out the image
    ///
    /// Anything that does not fit inside the image is clipped.
    pub fn build(&self) -> Vec<u8> {
        let mut image = vec![0xFFu8; self.size];

        let has_boot_firmware = self
            .regions
            .iter()
            .any(|r| r.firmware.is_some() && r.entry.region_offset == 0);
        if !has_boot_firmware {
            let header = FirmwareHeader {
                fw_version: self.boot_version,
                flash_table_offset: self.table_offset,
                ..Default::default()
            };
            write_at(&mut image, 0, &header.to_bytes());
        }

        for spec in &self.regions {
            if let Some((version, chain)) = &spec.firmware {
                self.write_firmware(&mut image, &spec.entry, *version, chain);
            }
        }

        let table = FlashTable {
            version: 1,
            reserved: 0,
            entries: self.regions.iter().map(|r| r.entry).collect(),
        };
        debug_assert!(table.entries.len() <= u8::MAX as usize);
        let table_bytes = table.to_bytes();
        debug_assert_eq!(
            table_bytes.len(),
            flash_table_size(table.entries.len() as u8)
        );
        write_at(&mut image, self.table_offset as usize, &table_bytes);

        for (offset, bytes) in &self.patches {
            write_at(&mut image, *offset, bytes);
        }

        image
    }

    fn write_firmware(
        &self,
        image: &mut [u8],
        entry: &FlashRegionEntry,
        version: FwVersion,
        chain: &[ChainedImage],
    ) {
        let base = entry.region_offset as usize;
        let header = FirmwareHeader {
            fw_version: version,
            image_size: entry.region_size,
            next_image_offset: if chain.is_empty() { 0 } else { self.chain_start },
            flash_table_offset: if base == 0 { self.table_offset } else { 0 },
            ..Default::default()
        };
        write_at(image, base, &header.to_bytes());

        let mut at = base + self.chain_start as usize;
        for (i, sub) in chain.iter().enumerate() {
            let mut hdr = ChainedHeader::new(sub.header_type, sub.image_type, sub.payload.len() as u32);
            let span = align_up(CHAINED_HEADER_SIZE + sub.payload.len(), CHAIN_ALIGN);
            hdr.next_image_offset = if i + 1 < chain.len() { span as u32 } else { 0 };
            write_at(image, at, &hdr.to_bytes());
            write_at(image, at + CHAINED_HEADER_SIZE, &sub.payload);
            at += span;
        }
    }
}

fn entry(region_type: RegionType, offset: u32, size: u32) -> FlashRegionEntry {
    FlashRegionEntry {
        region_type,
        flags: RegionFlags::new(false, 0),
        reserved: 0,
        region_size: size,
        region_offset: offset,
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

fn write_at(image: &mut [u8], offset: usize, bytes: &[u8]) {
    if offset >= image.len() {
        return;
    }
    let end = core::cmp::min(image.len(), offset + bytes.len());
    image[offset..end].copy_from_slice(&bytes[..end - offset]);
}

/// Offset of the `index`-th chained header inside a region built with the
/// default chain start, given the payload lengths of the images before it
pub fn chained_header_offset(region_offset: u32, payload_lens: &[usize]) -> u32 {
    let span: usize = payload_lens
        .iter()
        .map(|len| align_up(CHAINED_HEADER_SIZE + len, CHAIN_ALIGN))
        .sum();
    region_offset + DEFAULT_CHAIN_START + span as u32
}

/// Two firmware copies plus a boot loader, the layout every test starts from
///
/// `active` selects which copy (1 or 2) carries the active status image;
/// any other value leaves both superseded.
pub fn dual_copy_image(active: u8, fw1: FwVersion, fw2: FwVersion) -> Vec<u8> {
    FlashImageBuilder::new(0x10_0000)
        .firmware(
            RegionType::BootLoader,
            0,
            0x2_0000,
            FwVersion::new(1, 0, 0, 0),
            vec![ChainedImage::new(
                HeaderType::Lsi,
                ChainedImageType::ManufacturingData,
                &[0u8; 32],
            )],
        )
        .firmware(
            RegionType::FirmwareCopy1,
            0x2_0000,
            0x6_0000,
            fw1,
            vec![
                ChainedImage::new(HeaderType::Lsi, ChainedImageType::Signature, &[0xA5; 16]),
                ChainedImage::fw_status(active == 1),
            ],
        )
        .firmware(
            RegionType::FirmwareCopy2,
            0x8_0000,
            0x6_0000,
            fw2,
            vec![
                ChainedImage::new(HeaderType::Lsi, ChainedImageType::Signature, &[0x5A; 16]),
                ChainedImage::fw_status(active == 2),
            ],
        )
        .region(RegionType::Config, 0xE_0000, 0x1_0000)
        .region(RegionType::Log, 0xF_0000, 0x1_0000)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{FirmwareHeader, FlashTable, FIRMWARE_HEADER_SIZE};

    #[test]
    fn test_layout_of_dual_copy_image() {
        let image = dual_copy_image(2, FwVersion::new(2, 0, 0, 0), FwVersion::new(3, 0, 0, 0));

        let boot = FirmwareHeader::parse(&image).unwrap();
        assert_eq!(boot.flash_table_offset, DEFAULT_TABLE_OFFSET);

        let table = FlashTable::parse(&image[DEFAULT_TABLE_OFFSET as usize..]).unwrap();
        assert_eq!(table.entries.len(), 5);
        assert_eq!(table.firmware_regions().count(), 3);

        let fw2 = FirmwareHeader::parse(&image[0x8_0000..]).unwrap();
        assert_eq!(fw2.fw_version, FwVersion::new(3, 0, 0, 0));
        assert_eq!(fw2.next_image_offset, DEFAULT_CHAIN_START);

        let status_at = chained_header_offset(0x8_0000, &[16]) as usize;
        let hdr = ChainedHeader::parse(&image[status_at..]).unwrap();
        assert_eq!(hdr.image_type, ChainedImageType::FwStatus);
        assert_eq!(hdr.next_image_offset, 0);
        let status = FwStatusImage::parse(&image[status_at + CHAINED_HEADER_SIZE..]).unwrap();
        assert!(status.is_active());
    }

    #[test]
    fn test_boot_header_written_without_boot_region() {
        let image = FlashImageBuilder::new(0x1000)
            .boot_version(FwVersion::new(9, 9, 9, 9))
            .region(RegionType::Log, 0x800, 0x800)
            .build();
        let boot = FirmwareHeader::parse(&image).unwrap();
        assert_eq!(boot.fw_version, FwVersion::new(9, 9, 9, 9));
        assert_eq!(&image[FIRMWARE_HEADER_SIZE..FIRMWARE_HEADER_SIZE + 4], &[0xFF; 4]);
    }
}
