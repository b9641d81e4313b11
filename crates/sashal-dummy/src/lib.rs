//! sashal-dummy - In-memory SAS expander emulator for testing
//!
//! This crate provides an emulated Broadcom SAS expander. It answers
//! register reads, vendor READ/WRITE BUFFER commands and SMP functions from
//! an in-memory register file and a synthetic dual-copy flash image, so
//! every transport path can be exercised without hardware.

use std::collections::HashMap;

use sashal_core::chip::{cobra_signature, margay_signature};
use sashal_core::error::{Error, Result};
use sashal_core::identity::FwVersion;
use sashal_core::image::builder::dual_copy_image;
use sashal_core::regs::{
    encode_component_id, PowerOnSense, COMPONENT_ID, FLASH_ALIAS_BASE, POWER_ON_SENSE,
    SAS_ADDRESS_HIGH, SAS_ADDRESS_LOW,
};
use sashal_core::transport::scsi::{
    parse_read_buffer_cdb, parse_write_buffer, READ_BUFFER_16, WRITE_BUFFER_10,
};
use sashal_core::transport::smp::{
    be32, function, FRAME_TYPE_RESPONSE, FUNCTION_ACCEPTED,
};
use sashal_core::transport::{
    DataDirection, PciAddress, RegisterAccess, ScsiPassthrough, SmpPassthrough,
};

/// SMP function result: unknown SMP function
const UNKNOWN_SMP_FUNCTION: u8 = 0x01;

/// First flash word reported by a foreign (non-expander) device
pub const FOREIGN_FLASH_WORD: u32 = 0x1234_5678;

/// Register block that collides with watchdog registers on foreign chips
const FAMILY_BLOCK_MASK: u32 = 0xFFFF_0000;

/// Emulated silicon family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyFamily {
    /// SAS4x48 Margay
    Margay,
    /// SAS3x48 Cobra
    Cobra,
    /// SAS3x24 Cub
    Cub,
    /// A component id no resolver knows
    Unknown,
}

impl DummyFamily {
    /// Component id reported in the id register
    pub fn component_id(&self) -> u16 {
        match self {
            Self::Margay => 0x240,
            Self::Cobra => 0x230,
            Self::Cub => 0x236,
            Self::Unknown => 0x100,
        }
    }

    /// Parse a family name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "margay" => Some(Self::Margay),
            "cobra" => Some(Self::Cobra),
            "cub" => Some(Self::Cub),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Configuration for the emulated expander
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Component id in the id register
    pub component_id: u16,
    /// Silicon revision
    pub revision_id: u8,
    /// Boot flash on the CFI/XMEM bus instead of SPI
    pub cfi: bool,
    /// Firmware copy flagged active (1 or 2; anything else: none)
    pub active_copy: u8,
    /// Versions of firmware copies 1 and 2
    pub fw_versions: [FwVersion; 2],
    /// SAS address
    pub sas_address: u64,
    /// Host PCI function reported to callers
    pub pci_address: Option<PciAddress>,
    /// Behave like an unrelated chip: foreign boot word, and touching any
    /// register in the expander register block trips the watchdog
    pub foreign: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            component_id: DummyFamily::Margay.component_id(),
            revision_id: 0x01,
            cfi: false,
            active_copy: 1,
            fw_versions: [FwVersion::new(16, 0, 1, 0), FwVersion::new(15, 0, 0, 0)],
            sas_address: 0x5000_605B_0000_1234,
            pci_address: None,
            foreign: false,
        }
    }
}

impl DummyConfig {
    /// Default configuration for `family`
    pub fn for_family(family: DummyFamily) -> Self {
        Self {
            component_id: family.component_id(),
            ..Self::default()
        }
    }
}

/// Emulated SAS expander
pub struct DummyExpander {
    config: DummyConfig,
    flash: Vec<u8>,
    regs: HashMap<u32, u32>,
    transactions: usize,
    watchdog_tripped: bool,
}

impl DummyExpander {
    /// Create an expander with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let [fw1, fw2] = config.fw_versions;
        let flash = dual_copy_image(config.active_copy, fw1, fw2);
        Self::with_flash(config, flash)
    }

    /// Create an expander with the default configuration (Margay, SPI
    /// boot flash, copy 1 active)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create an expander backed by an explicit flash image
    pub fn with_flash(config: DummyConfig, flash: Vec<u8>) -> Self {
        let pos = if config.cfi {
            PowerOnSense::CFI_ENABLED
        } else {
            PowerOnSense::empty()
        };
        let mut regs = HashMap::new();
        regs.insert(POWER_ON_SENSE, pos.bits());
        regs.insert(
            COMPONENT_ID,
            encode_component_id(config.component_id, config.revision_id),
        );
        regs.insert(SAS_ADDRESS_HIGH, (config.sas_address >> 32) as u32);
        regs.insert(SAS_ADDRESS_LOW, config.sas_address as u32);

        Self {
            config,
            flash,
            regs,
            transactions: 0,
            watchdog_tripped: false,
        }
    }

    /// Get a reference to the flash data
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Get a mutable reference to the flash data
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Number of transport transactions served so far
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    /// True once a foreign device had its watchdog tripped
    pub fn watchdog_tripped(&self) -> bool {
        self.watchdog_tripped
    }

    fn flash_base(&self) -> u32 {
        let pos = self.regs.get(&POWER_ON_SENSE).copied().unwrap_or(0);
        PowerOnSense::from_bits_retain(pos).flash_base()
    }

    /// Offset into the flash image if `[addr, addr + len)` is inside a
    /// flash window
    fn flash_offset(&self, addr: u32, len: usize) -> Option<usize> {
        [FLASH_ALIAS_BASE, self.flash_base()]
            .into_iter()
            .find_map(|base| {
                let offset = addr.checked_sub(base)? as usize;
                (offset.checked_add(len)? <= self.flash.len()).then_some(offset)
            })
    }

    fn read_word(&mut self, addr: u32) -> Result<u32> {
        if self.config.foreign {
            if addr == FLASH_ALIAS_BASE {
                return Ok(FOREIGN_FLASH_WORD);
            }
            if self.trips_watchdog(addr) {
                return Err(Error::RegisterReadFailed { addr });
            }
        }
        if let Some(value) = self.regs.get(&addr) {
            return Ok(*value);
        }
        let offset = self
            .flash_offset(addr, 4)
            .ok_or(Error::RegisterReadFailed { addr })?;
        let b = &self.flash[offset..offset + 4];
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_span(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if !self.config.foreign {
            if let Some(offset) = self.flash_offset(addr, buf.len()) {
                buf.copy_from_slice(&self.flash[offset..offset + buf.len()]);
                return Ok(());
            }
        }
        for (i, chunk) in buf.chunks_mut(4).enumerate() {
            let cur = addr
                .checked_add(i as u32 * 4)
                .ok_or(Error::InvalidParameter)?;
            let word = self.read_word(cur)?.to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        Ok(())
    }

    fn trips_watchdog(&mut self, addr: u32) -> bool {
        if addr & FAMILY_BLOCK_MASK != COMPONENT_ID & FAMILY_BLOCK_MASK {
            return false;
        }
        log::error!("dummy: foreign device watchdog tripped at 0x{:08X}", addr);
        self.watchdog_tripped = true;
        true
    }

    fn write_word(&mut self, addr: u32, value: u32) -> Result<()> {
        if self.config.foreign && self.trips_watchdog(addr) {
            return Err(Error::RegisterWriteFailed { addr });
        }
        match addr {
            SAS_ADDRESS_HIGH | SAS_ADDRESS_LOW => {
                self.regs.insert(addr, value);
                Ok(())
            }
            _ => Err(Error::RegisterWriteFailed { addr }),
        }
    }

    fn product_name(&self) -> &'static str {
        margay_signature(self.config.component_id)
            .or_else(|| cobra_signature(self.config.component_id))
            .map_or("UNKNOWN", |sig| sig.name)
    }

    fn num_phys(&self) -> u8 {
        margay_signature(self.config.component_id)
            .or_else(|| cobra_signature(self.config.component_id))
            .map_or(0, |sig| sig.num_phys)
    }

    fn manufacturer_info(&self, response: &mut [u8]) {
        fn field(out: &mut [u8], value: &str) {
            out.fill(b' ');
            let len = value.len().min(out.len());
            out[..len].copy_from_slice(&value.as_bytes()[..len]);
        }
        if response.len() < 64 {
            return;
        }
        field(&mut response[12..20], "LSI");
        field(&mut response[20..36], self.product_name());
        field(&mut response[36..40], "0001");
        field(&mut response[40..48], "BROADCOM");
        response[48..50].copy_from_slice(&self.config.component_id.to_be_bytes());
        response[50] = self.config.revision_id;
    }

    fn report_general(&self, response: &mut [u8]) {
        if response.len() < 20 {
            return;
        }
        response[9] = self.num_phys();
        let high = self.regs.get(&SAS_ADDRESS_HIGH).copied().unwrap_or(0);
        let low = self.regs.get(&SAS_ADDRESS_LOW).copied().unwrap_or(0);
        response[12..16].copy_from_slice(&high.to_be_bytes());
        response[16..20].copy_from_slice(&low.to_be_bytes());
    }
}

impl RegisterAccess for DummyExpander {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        self.transactions += 1;
        self.read_word(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.transactions += 1;
        self.write_word(addr, value)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.transactions += 1;
        self.read_span(addr, buf)
    }

    fn pci_address(&self) -> Option<PciAddress> {
        self.config.pci_address
    }
}

impl ScsiPassthrough for DummyExpander {
    fn passthrough(&mut self, cdb: &[u8], dir: DataDirection, buf: &mut [u8]) -> Result<()> {
        self.transactions += 1;
        let opcode = cdb.first().copied().unwrap_or(0);
        log::trace!("dummy: CDB {:02X?}", cdb);

        match (opcode, dir) {
            (READ_BUFFER_16, DataDirection::FromDevice) => {
                let (addr, len) =
                    parse_read_buffer_cdb(cdb).ok_or(Error::ScsiCommandFailed { opcode })?;
                if len as usize != buf.len() {
                    return Err(Error::ScsiCommandFailed { opcode });
                }
                self.read_span(addr, buf)
                    .map_err(|_| Error::ScsiCommandFailed { opcode })
            }
            (WRITE_BUFFER_10, DataDirection::ToDevice) => {
                let (addr, value) =
                    parse_write_buffer(cdb, buf).ok_or(Error::ScsiCommandFailed { opcode })?;
                self.write_word(addr, value)
                    .map_err(|_| Error::ScsiCommandFailed { opcode })
            }
            _ => Err(Error::ScsiCommandFailed { opcode }),
        }
    }

    fn pci_address(&self) -> Option<PciAddress> {
        self.config.pci_address
    }
}

impl SmpPassthrough for DummyExpander {
    fn smp_passthrough(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize> {
        self.transactions += 1;
        if request.len() < 8 || response.len() < 8 {
            return Err(Error::ResponseTooShort);
        }
        let func = request[1];
        response.fill(0);
        response[0] = FRAME_TYPE_RESPONSE;
        response[1] = func;
        response[2] = FUNCTION_ACCEPTED;
        response[3] = ((response.len() - 8) / 4) as u8;

        match func {
            function::REPORT_MANUFACTURER_INFO => self.manufacturer_info(response),
            function::REPORT_GENERAL => self.report_general(response),
            function::READ_MEMORY => {
                let addr = be32(request, 4)?;
                let len = be32(request, 8)? as usize;
                let Some(data) = response.get_mut(4..4 + len) else {
                    return Err(Error::ResponseTooShort);
                };
                if self.read_span(addr, data).is_err() {
                    response[2] = 0x02;
                }
            }
            function::WRITE_MEMORY => {
                let addr = be32(request, 4)?;
                let value = be32(request, 8)?;
                if self.write_word(addr, value).is_err() {
                    response[2] = 0x02;
                }
            }
            _ => response[2] = UNKNOWN_SMP_FUNCTION,
        }
        Ok(response.len())
    }

    fn pci_address(&self) -> Option<PciAddress> {
        self.config.pci_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sashal_core::chip::ChipFamily;
    use sashal_core::image::RegionType;
    use sashal_core::regs::{SPI_FLASH_BASE, XMEM_FLASH_BASE};
    use sashal_core::{get_active_firmware_version, qualify_expander, DeviceHandle, Qualification};

    #[test]
    fn test_flash_windows() {
        let mut dev = DummyExpander::new_default();
        let first = dev.read32(FLASH_ALIAS_BASE).unwrap();
        assert_eq!(dev.read32(SPI_FLASH_BASE).unwrap(), first);
        assert!(dev.read32(XMEM_FLASH_BASE).is_err());

        let mut cfi = DummyExpander::new(DummyConfig {
            cfi: true,
            ..DummyConfig::default()
        });
        assert_eq!(cfi.read32(XMEM_FLASH_BASE).unwrap(), first);
    }

    #[test]
    fn test_qualify_over_every_transport() {
        for family in [DummyFamily::Margay, DummyFamily::Cobra, DummyFamily::Cub] {
            let mut dev = DummyExpander::new(DummyConfig::for_family(family));
            let via_regs = qualify_expander(DeviceHandle::RegisterAccess(&mut dev)).unwrap();
            let via_scsi = qualify_expander(DeviceHandle::ScsiPassthrough(&mut dev)).unwrap();
            let via_smp = qualify_expander(DeviceHandle::SmpPassthrough(&mut dev)).unwrap();

            let id = via_regs.identity().unwrap();
            assert!(id.is_broadcom_expander);
            assert_eq!(id.fw_version, Some(FwVersion::new(16, 0, 1, 0)));
            assert_eq!(via_scsi.identity().unwrap(), id);
            let smp = via_smp.identity().unwrap();
            assert_eq!(smp.component_id, id.component_id);
            assert_eq!(smp.sas_address, id.sas_address);
            assert_eq!(smp.fw_version, id.fw_version);
        }
    }

    #[test]
    fn test_unknown_family_ignored() {
        let mut dev = DummyExpander::new(DummyConfig::for_family(DummyFamily::Unknown));
        assert_eq!(
            qualify_expander(DeviceHandle::RegisterAccess(&mut dev)).unwrap(),
            Qualification::Ignore
        );
        assert_eq!(
            qualify_expander(DeviceHandle::SmpPassthrough(&mut dev)).unwrap(),
            Qualification::Ignore
        );
    }

    #[test]
    fn test_foreign_device_not_probed_over_scsi() {
        let mut dev = DummyExpander::new(DummyConfig {
            foreign: true,
            ..DummyConfig::default()
        });
        assert_eq!(
            qualify_expander(DeviceHandle::ScsiPassthrough(&mut dev)).unwrap(),
            Qualification::Ignore
        );
        assert_eq!(dev.transactions(), 1);
        assert!(!dev.watchdog_tripped());
    }

    #[test]
    fn test_foreign_device_firmware_query_over_scsi() {
        let mut dev = DummyExpander::new(DummyConfig {
            foreign: true,
            ..DummyConfig::default()
        });
        assert_eq!(
            get_active_firmware_version(DeviceHandle::ScsiPassthrough(&mut dev)),
            Err(Error::Unsupported)
        );
        assert_eq!(dev.transactions(), 1);
        assert!(!dev.watchdog_tripped());
    }

    #[test]
    fn test_foreign_watchdog_covers_register_block() {
        let mut dev = DummyExpander::new(DummyConfig {
            foreign: true,
            ..DummyConfig::default()
        });
        assert_eq!(dev.read32(FLASH_ALIAS_BASE).unwrap(), FOREIGN_FLASH_WORD);
        assert!(!dev.watchdog_tripped());

        assert!(dev.read32(POWER_ON_SENSE).is_err());
        assert!(dev.watchdog_tripped());

        let mut dev = DummyExpander::new(DummyConfig {
            foreign: true,
            ..DummyConfig::default()
        });
        assert!(dev.write32(SAS_ADDRESS_LOW, 1).is_err());
        assert!(dev.watchdog_tripped());
    }

    #[test]
    fn test_second_copy_over_smp() {
        let mut dev = DummyExpander::new(DummyConfig {
            active_copy: 2,
            cfi: true,
            ..DummyConfig::for_family(DummyFamily::Cobra)
        });
        let active = get_active_firmware_version(DeviceHandle::SmpPassthrough(&mut dev)).unwrap();
        assert_eq!(active.version, FwVersion::new(15, 0, 0, 0));
        assert_eq!(active.region_type, RegionType::FirmwareCopy2);

        let q = qualify_expander(DeviceHandle::SmpPassthrough(&mut dev)).unwrap();
        let id = q.identity().unwrap();
        assert_eq!(id.chip_family, Some(ChipFamily::Cobra));
        assert_eq!(id.product.as_str(), "SAS35x48");
        assert_eq!(id.num_phys, 48);
    }

    #[test]
    fn test_sas_address_write() {
        let mut dev = DummyExpander::new_default();
        dev.write32(SAS_ADDRESS_LOW, 0xAABB_CCDD).unwrap();
        assert_eq!(dev.read32(SAS_ADDRESS_LOW).unwrap(), 0xAABB_CCDD);
        assert!(dev.write32(COMPONENT_ID, 0).is_err());
    }
}
