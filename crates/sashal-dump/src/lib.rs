//! sashal-dump - Offline flash dump transport
//!
//! Serves a raw expander flash image (as read off the part with an
//! external programmer) through [`RegisterAccess`], so the flash table,
//! firmware chains and active firmware can be inspected without the chip.
//! The image appears at the boot alias and at the flash window selected by
//! the `base` option. Identity registers are synthesized only when given.
//!
//! # Usage with sashal CLI
//!
//! ```bash
//! # Active firmware of an SPI flash dump
//! sashal firmware -d dump:file=expander.bin
//!
//! # Qualify as a Margay with a known SAS address
//! sashal qualify -d dump:file=expander.bin,component=0x240,sas=5000605b00001234
//! ```
//!
//! [`RegisterAccess`]: sashal_core::transport::RegisterAccess

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, DumpConfig, FlashBus, FlashDump, MAX_DUMP_LEN};
pub use error::{DumpError, Result};

/// Load a flash dump and return a boxed RegisterAccess
///
/// # Example Options
///
/// - `file=expander.bin` - Required: raw flash image
/// - `base=xmem` - Optional: flash bus, `xmem` or `spi` (default: spi)
/// - `component=0x240`, `revision=1`, `sas=<hex>` - Optional identity
pub fn open_dump(
    options: &[(&str, &str)],
) -> std::result::Result<
    Box<dyn sashal_core::transport::RegisterAccess>,
    Box<dyn std::error::Error>,
> {
    let config = parse_options(options)?;
    let dump = FlashDump::open(&config)?;
    Ok(Box::new(dump))
}
