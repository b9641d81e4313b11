//! Transport registry and initialization
//!
//! This module opens transports by name and wraps them in an
//! [`ExpanderHandle`]. Which transports exist is decided at compile time by
//! cargo features.

use crate::handle::{ExpanderHandle, Transport};
use std::collections::HashMap;

/// Parsed transport parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    /// Transport name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl TransportParams {
    /// Parameters as the `(key, value)` slice form transport crates take
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a transport string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```
/// let params = sashal_device::parse_transport_params("sg:dev=/dev/sg3").unwrap();
/// assert_eq!(params.name, "sg");
/// assert_eq!(params.params.get("dev"), Some(&"/dev/sg3".to_string()));
/// ```
pub fn parse_transport_params(s: &str) -> Result<TransportParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Empty transport name".into());
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(TransportParams {
        name: name.to_string(),
        params,
    })
}

/// Open an expander transport
///
/// # Arguments
/// * `transport` - Transport specification (e.g., "dummy" or "bsg:dev=/dev/bsg/expander-6:0")
///
/// # Example
/// ```ignore
/// let mut expander = open_device("sg:dev=/dev/sg3")?;
/// let result = sashal_core::qualify_expander(expander.device_handle())?;
/// ```
pub fn open_device(transport: &str) -> Result<ExpanderHandle, Box<dyn std::error::Error>> {
    let params = parse_transport_params(transport)?;

    let opened: Transport = match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params)?,

        #[cfg(feature = "dump")]
        "dump" | "file" => open_dump(&params)?,

        #[cfg(feature = "linux-sg")]
        "sg" | "scsi_generic" => open_sg(&params)?,

        #[cfg(feature = "linux-sg")]
        "bsg" | "smp" => open_bsg(&params)?,

        _ => {
            return Err(format!(
                "Unknown transport: {} (available: {})",
                params.name,
                transport_names_short()
            )
            .into())
        }
    };

    log::debug!("Opened {} with {}", transport, opened.capability());
    Ok(ExpanderHandle::new(transport, opened))
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &TransportParams) -> Result<Transport, Box<dyn std::error::Error>> {
    use sashal_dummy::{DummyConfig, DummyExpander, DummyFamily};

    let mut config = DummyConfig::default();
    let mut transport = "regs";

    for (key, value) in &params.params {
        match key.as_str() {
            "family" => {
                let family = DummyFamily::from_name(value).ok_or_else(|| {
                    format!(
                        "Invalid dummy family '{}' (expected margay, cobra, cub or unknown)",
                        value
                    )
                })?;
                config.component_id = family.component_id();
            }
            "transport" => transport = value.as_str(),
            "cfi" => config.cfi = parse_flag("cfi", value)?,
            "foreign" => config.foreign = parse_flag("foreign", value)?,
            "active" => {
                config.active_copy = value
                    .parse()
                    .map_err(|_| format!("Invalid dummy active copy '{}'", value))?;
            }
            _ => log::warn!("Unknown dummy option: {}={}", key, value),
        }
    }

    log::info!(
        "Opening dummy expander (component 0x{:03X}, {} transport)",
        config.component_id,
        transport
    );
    let expander = DummyExpander::new(config);
    match transport {
        "regs" => Ok(Transport::Registers(Box::new(expander))),
        "scsi" => Ok(Transport::Scsi(Box::new(expander))),
        "smp" => Ok(Transport::Smp(Box::new(expander))),
        other => Err(format!(
            "Invalid dummy transport '{}' (expected regs, scsi or smp)",
            other
        )
        .into()),
    }
}

#[cfg(feature = "dummy")]
fn parse_flag(name: &str, value: &str) -> Result<bool, Box<dyn std::error::Error>> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(format!("Invalid value for {}: '{}' (expected 0 or 1)", name, value).into()),
    }
}

#[cfg(feature = "dump")]
fn open_dump(params: &TransportParams) -> Result<Transport, Box<dyn std::error::Error>> {
    use sashal_dump::{parse_options, FlashDump};

    let config = parse_options(&params.options())
        .map_err(|e| format!("Invalid dump parameters: {}", e))?;
    let dump = FlashDump::open(&config)?;
    Ok(Transport::Registers(Box::new(dump)))
}

#[cfg(feature = "linux-sg")]
fn open_sg(params: &TransportParams) -> Result<Transport, Box<dyn std::error::Error>> {
    use sashal_linux_sg::sg::parse_options;
    use sashal_linux_sg::LinuxSg;

    log::info!("Opening SCSI generic transport...");

    let config =
        parse_options(&params.options()).map_err(|e| format!("Invalid sg parameters: {}", e))?;
    let dev = LinuxSg::open(&config).map_err(|e| {
        format!(
            "Failed to open SCSI generic device: {}\n\
             Make sure the sg module is loaded and you have read/write permissions.",
            e
        )
    })?;
    Ok(Transport::Scsi(Box::new(dev)))
}

#[cfg(feature = "linux-sg")]
fn open_bsg(params: &TransportParams) -> Result<Transport, Box<dyn std::error::Error>> {
    use sashal_linux_sg::bsg::parse_options;
    use sashal_linux_sg::LinuxBsg;

    log::info!("Opening bsg SMP transport...");

    let config =
        parse_options(&params.options()).map_err(|e| format!("Invalid bsg parameters: {}", e))?;
    let dev = LinuxBsg::open(&config).map_err(|e| {
        format!(
            "Failed to open bsg device: {}\n\
             Expander nodes live under /dev/bsg/expander-H:N and usually need root.",
            e
        )
    })?;
    Ok(Transport::Smp(Box::new(dev)))
}

// Transport information and listing
/// Information about a transport
pub struct TransportInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available transports (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_transports() -> Vec<TransportInfo> {
    let mut transports = Vec::new();

    #[cfg(feature = "dummy")]
    transports.push(TransportInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory expander emulator (family=<margay|cobra|cub>,transport=<regs|scsi|smp>,cfi=<0|1>,active=<1|2>)",
    });

    #[cfg(feature = "dump")]
    transports.push(TransportInfo {
        name: "dump",
        aliases: &["file"],
        description: "Raw flash dump file (file=<path>,base=<xmem|spi>,component=<hex>,sas=<hex>)",
    });

    #[cfg(feature = "linux-sg")]
    transports.push(TransportInfo {
        name: "sg",
        aliases: &["scsi_generic"],
        description: "Linux SCSI generic passthrough (dev=/dev/sgN,timeout=<ms>)",
    });

    #[cfg(feature = "linux-sg")]
    transports.push(TransportInfo {
        name: "bsg",
        aliases: &["smp"],
        description: "Linux bsg SMP passthrough (dev=/dev/bsg/expander-H:N,timeout=<ms>)",
    });

    transports
}

/// Generate a short list of transport names for CLI help
pub fn transport_names_short() -> String {
    let transports = available_transports();
    if transports.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = transports.iter().map(|t| t.name).collect();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport_params() {
        let params = parse_transport_params("bsg:dev=/dev/bsg/expander-6:0,timeout=500").unwrap();
        assert_eq!(params.name, "bsg");
        assert_eq!(
            params.params.get("dev").map(String::as_str),
            Some("/dev/bsg/expander-6:0")
        );
        assert_eq!(params.params.get("timeout").map(String::as_str), Some("500"));

        let bare = parse_transport_params("dummy").unwrap();
        assert_eq!(bare.name, "dummy");
        assert!(bare.params.is_empty());

        assert!(parse_transport_params("sg:dev").is_err());
        assert!(parse_transport_params(":dev=x").is_err());
    }

    #[test]
    fn test_unknown_transport() {
        let err = open_device("carrier-pigeon").unwrap_err();
        assert!(err.to_string().contains("Unknown transport"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_per_transport() {
        use sashal_core::transport::Capability;
        use sashal_core::{qualify_expander, Qualification};

        for (spec, capability) in [
            ("dummy", Capability::RegisterAccess),
            ("dummy:transport=scsi,family=cub", Capability::ScsiPassthrough),
            ("dummy:transport=smp,active=2", Capability::SmpPassthrough),
        ] {
            let mut expander = open_device(spec).unwrap();
            assert_eq!(expander.capability(), capability);
            assert_eq!(expander.name(), spec);
            let result = qualify_expander(expander.device_handle()).unwrap();
            assert!(matches!(result, Qualification::Success(_)), "{}", spec);
        }

        assert!(open_device("dummy:transport=pcie").is_err());
        assert!(open_device("dummy:family=lynx").is_err());
        assert!(open_device("dummy:cfi=maybe").is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_listing() {
        assert!(available_transports().iter().any(|t| t.name == "dummy"));
        assert!(transport_names_short().contains("dummy"));
    }
}
