//! Flash dump device implementation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};
use sashal_core::error::{Error as CoreError, Result as CoreResult};
use sashal_core::regs::{
    encode_component_id, PowerOnSense, COMPONENT_ID, FLASH_ALIAS_BASE, POWER_ON_SENSE,
    SAS_ADDRESS_HIGH, SAS_ADDRESS_LOW, SPI_FLASH_BASE, XMEM_FLASH_BASE,
};
use sashal_core::transport::RegisterAccess;

use crate::error::{DumpError, Result};

/// Largest dump accepted: the gap between the XMEM and SPI windows
pub const MAX_DUMP_LEN: usize = (SPI_FLASH_BASE - XMEM_FLASH_BASE) as usize;

/// Bus the dumped flash was attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashBus {
    /// Parallel CFI flash on the XMEM bus
    Xmem,
    /// SPI flash
    #[default]
    Spi,
}

impl FlashBus {
    fn straps(self) -> PowerOnSense {
        match self {
            Self::Xmem => PowerOnSense::CFI_ENABLED,
            Self::Spi => PowerOnSense::empty(),
        }
    }
}

/// Configuration for a flash dump
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// Raw flash image
    pub file: PathBuf,
    /// Flash bus reported through the strap register
    pub bus: FlashBus,
    /// Component id to report; without it the id register is unreadable
    pub component_id: Option<u16>,
    /// Silicon revision reported with the component id
    pub revision_id: u8,
    /// SAS address to report
    pub sas_address: Option<u64>,
}

impl DumpConfig {
    /// Configuration for `file` with an SPI flash and no identity registers
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            bus: FlashBus::default(),
            component_id: None,
            revision_id: 0,
            sas_address: None,
        }
    }
}

/// Read-only expander view backed by a flash dump
///
/// The image is visible at the boot alias and at the strapped flash base.
/// The strap register always reads back; the identity registers only when
/// configured. Every other address, and every write, fails.
#[derive(Debug)]
pub struct FlashDump {
    image: Vec<u8>,
    regs: BTreeMap<u32, u32>,
    flash_base: u32,
}

impl FlashDump {
    /// Load a dump from disk
    pub fn open(config: &DumpConfig) -> Result<Self> {
        let image = std::fs::read(&config.file).map_err(|e| DumpError::OpenFailed {
            path: config.file.display().to_string(),
            source: e,
        })?;
        if image.is_empty() {
            return Err(DumpError::Empty(config.file.display().to_string()));
        }
        info!(
            "Loaded {} byte flash dump from {}",
            image.len(),
            config.file.display()
        );
        Self::from_image(config, image)
    }

    /// Wrap an in-memory image; `config.file` is ignored
    pub fn from_image(config: &DumpConfig, image: Vec<u8>) -> Result<Self> {
        if image.len() > MAX_DUMP_LEN {
            return Err(DumpError::TooLarge {
                len: image.len(),
                max: MAX_DUMP_LEN,
            });
        }

        let straps = config.bus.straps();
        let mut regs = BTreeMap::new();
        regs.insert(POWER_ON_SENSE, straps.bits());
        if let Some(component_id) = config.component_id {
            regs.insert(
                COMPONENT_ID,
                encode_component_id(component_id, config.revision_id),
            );
        }
        if let Some(sas) = config.sas_address {
            regs.insert(SAS_ADDRESS_HIGH, (sas >> 32) as u32);
            regs.insert(SAS_ADDRESS_LOW, sas as u32);
        }
        debug!(
            "dump: {:?} flash at 0x{:08X}, {} fixed registers",
            config.bus,
            straps.flash_base(),
            regs.len()
        );

        Ok(Self {
            image,
            regs,
            flash_base: straps.flash_base(),
        })
    }

    /// Dumped flash contents
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Image slice behind `[addr, addr + len)`, if it lies in a flash window
    fn span(&self, addr: u32, len: usize) -> Option<&[u8]> {
        [FLASH_ALIAS_BASE, self.flash_base]
            .into_iter()
            .find_map(|base| {
                let offset = addr.checked_sub(base)? as usize;
                self.image.get(offset..offset.checked_add(len)?)
            })
    }
}

impl RegisterAccess for FlashDump {
    fn read32(&mut self, addr: u32) -> CoreResult<u32> {
        if let Some(value) = self.regs.get(&addr) {
            trace!("dump: reg 0x{:08X} = 0x{:08X}", addr, value);
            return Ok(*value);
        }
        let b = self
            .span(addr, 4)
            .ok_or(CoreError::RegisterReadFailed { addr })?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn write32(&mut self, addr: u32, _value: u32) -> CoreResult<()> {
        warn!("dump: write to 0x{:08X} refused, dumps are read-only", addr);
        Err(CoreError::RegisterWriteFailed { addr })
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> CoreResult<()> {
        if buf.len() == 4 && self.regs.contains_key(&addr) {
            let value = self.read32(addr)?;
            buf.copy_from_slice(&value.to_le_bytes());
            return Ok(());
        }
        let src = self
            .span(addr, buf.len())
            .ok_or(CoreError::RegisterReadFailed { addr })?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

type RadixParser<T> = fn(&str, u32) -> std::result::Result<T, std::num::ParseIntError>;

/// Hex value with an optional `0x` prefix
fn parse_hex<T>(name: &'static str, value: &str, parse: RadixParser<T>) -> Result<T> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    parse(digits, 16).map_err(|_| DumpError::InvalidParameter {
        name,
        message: format!("'{}' is not a valid hex value", value),
    })
}

/// Parse dump options into a configuration
///
/// Options:
/// - `file=<path>` - Required: raw flash image
/// - `base=xmem|spi` - Flash bus (default spi)
/// - `component=<hex>` - Component id to report
/// - `revision=<hex>` - Silicon revision (default 0)
/// - `sas=<hex>` - SAS address to report
pub fn parse_options(options: &[(&str, &str)]) -> Result<DumpConfig> {
    let mut file: Option<PathBuf> = None;
    let mut config = DumpConfig::new(PathBuf::new());

    for (key, value) in options {
        match *key {
            "file" => file = Some(Path::new(value).to_path_buf()),
            "base" => {
                config.bus = match value.to_ascii_lowercase().as_str() {
                    "xmem" | "cfi" => FlashBus::Xmem,
                    "spi" => FlashBus::Spi,
                    _ => {
                        return Err(DumpError::InvalidParameter {
                            name: "base",
                            message: format!("'{}' is not xmem or spi", value),
                        })
                    }
                };
            }
            "component" => {
                config.component_id = Some(parse_hex("component", value, u16::from_str_radix)?);
            }
            "revision" => {
                config.revision_id = parse_hex("revision", value, u8::from_str_radix)?;
            }
            "sas" => {
                config.sas_address = Some(parse_hex("sas", value, u64::from_str_radix)?);
            }
            _ => warn!("Unknown dump option: {}={}", key, value),
        }
    }

    config.file = file.ok_or(DumpError::MissingParameter("file"))?;
    Ok(config)
}
