//! SMP passthrough through a SAS transport-class bsg node
//!
//! The SAS transport layer exposes every expander behind an HBA as
//! `/dev/bsg/expander-H:N`. SMP frames travel as an sg_io_v4 request with
//! the SCSI transport subprotocol: the request frame in the data-out
//! buffer and the response frame in the data-in buffer.

use crate::error::{LinuxSgError, Result};
use crate::sg::DEFAULT_TIMEOUT_MS;
use crate::sysfs::{pci_address_for_node, BSG_CLASS};
use log::{debug, info, trace, warn};
use sashal_core::error::{Error as CoreError, Result as CoreResult};
use sashal_core::transport::{PciAddress, SmpPassthrough};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

const SENSE_LEN: usize = 32;

/// sg_io_v4 constants from linux/bsg.h
mod bsg {
    pub const GUARD: libc::c_int = b'Q' as libc::c_int;
    pub const PROTOCOL_SCSI: u32 = 0;
    pub const SUB_PROTOCOL_SCSI_TRANSPORT: u32 = 2;

    /// bsg nodes accept the same request code as sg
    pub const SG_IO: u32 = 0x2285;

    nix::ioctl_readwrite_bad!(sg_io_v4, SG_IO, super::SgIoV4);
}

/// struct sg_io_v4 from linux/bsg.h
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct SgIoV4 {
    guard: i32,
    protocol: u32,
    subprotocol: u32,
    request_len: u32,
    request: u64,
    request_tag: u64,
    request_attr: u32,
    request_priority: u32,
    request_extra: u32,
    max_response_len: u32,
    response: u64,
    dout_iovec_count: u32,
    dout_xfer_len: u32,
    din_iovec_count: u32,
    din_xfer_len: u32,
    dout_xferp: u64,
    din_xferp: u64,
    timeout: u32,
    flags: u32,
    usr_ptr: u64,
    spare_in: u32,
    driver_status: u32,
    transport_status: u32,
    device_status: u32,
    retry_delay: u32,
    info: u32,
    duration: u32,
    response_len: u32,
    din_resid: i32,
    dout_resid: i32,
    generated_tag: u64,
    spare_out: u32,
    padding: u32,
}

/// Configuration for opening a bsg node
#[derive(Debug, Clone)]
pub struct LinuxBsgConfig {
    /// Device path (e.g., "/dev/bsg/expander-6:0")
    pub device: PathBuf,
    /// Request timeout in milliseconds
    pub timeout_ms: u32,
}

impl LinuxBsgConfig {
    /// Configuration for `device` with the default timeout
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// bsg SMP device handle
pub struct LinuxBsg {
    file: File,
    path: PathBuf,
    timeout_ms: u32,
    pci_address: Option<PciAddress>,
}

impl LinuxBsg {
    /// Open a bsg node
    pub fn open(config: &LinuxBsgConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSgError::OpenFailed {
                path: config.device.display().to_string(),
                source: e,
            })?;
        let pci_address = pci_address_for_node(BSG_CLASS, &config.device);

        info!(
            "Opened {} (timeout {} ms, controller {})",
            config.device.display(),
            config.timeout_ms,
            pci_address.map_or_else(|| "unknown".to_string(), |a| a.to_string())
        );

        Ok(Self {
            file,
            path: config.device.clone(),
            timeout_ms: config.timeout_ms,
            pci_address,
        })
    }

    /// Device path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send one SMP request frame and return the received response length
    pub fn execute(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize> {
        let function = request.get(1).copied().unwrap_or(0);
        let dout_xfer_len = u32::try_from(request.len())
            .map_err(|_| LinuxSgError::TransferTooLarge(request.len()))?;
        let din_xfer_len = u32::try_from(response.len())
            .map_err(|_| LinuxSgError::TransferTooLarge(response.len()))?;

        let mut sense = [0u8; SENSE_LEN];
        // The SMP frame is the data phase; the command block is unused
        let cdb = [0u8; 16];
        let mut hdr = SgIoV4 {
            guard: bsg::GUARD,
            protocol: bsg::PROTOCOL_SCSI,
            subprotocol: bsg::SUB_PROTOCOL_SCSI_TRANSPORT,
            request_len: cdb.len() as u32,
            request: cdb.as_ptr() as u64,
            max_response_len: SENSE_LEN as u32,
            response: sense.as_mut_ptr() as u64,
            dout_xfer_len,
            din_xfer_len,
            dout_xferp: request.as_ptr() as u64,
            din_xferp: response.as_mut_ptr() as u64,
            timeout: self.timeout_ms,
            ..Default::default()
        };

        trace!(
            "{}: SMP function 0x{:02X}, {} byte request",
            self.path.display(),
            function,
            request.len()
        );
        // SAFETY: every address in `hdr` refers to a live buffer of the
        // advertised length for the duration of the call.
        unsafe { bsg::sg_io_v4(self.file.as_raw_fd(), &mut hdr) }.map_err(LinuxSgError::Ioctl)?;

        if hdr.driver_status != 0 || hdr.transport_status != 0 || hdr.device_status != 0 {
            return Err(LinuxSgError::SmpTransport {
                function,
                driver_status: hdr.driver_status,
                transport_status: hdr.transport_status,
                device_status: hdr.device_status,
            });
        }

        let resid = usize::try_from(hdr.din_resid).unwrap_or(0);
        let received = response.len().saturating_sub(resid);
        if resid != 0 {
            debug!(
                "{}: SMP function 0x{:02X} returned {} of {} bytes",
                self.path.display(),
                function,
                received,
                response.len()
            );
        }
        Ok(received)
    }
}

impl SmpPassthrough for LinuxBsg {
    fn smp_passthrough(&mut self, request: &[u8], response: &mut [u8]) -> CoreResult<usize> {
        let function = request.get(1).copied().unwrap_or(0);
        self.execute(request, response).map_err(|e| {
            debug!("{}: {}", self.path.display(), e);
            CoreError::SmpFunctionFailed { function }
        })
    }

    fn pci_address(&self) -> Option<PciAddress> {
        self.pci_address
    }
}

/// Parse bsg options into a configuration
///
/// Options:
/// - `dev=/dev/bsg/expander-H:N` - Required: bsg node
/// - `timeout=<ms>` - Request timeout (default 30000)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxBsgConfig> {
    let mut device: Option<PathBuf> = None;
    let mut timeout_ms = DEFAULT_TIMEOUT_MS;

    for (key, value) in options {
        match *key {
            "dev" => device = Some(PathBuf::from(value)),
            "timeout" => {
                timeout_ms = value.parse().map_err(|_| LinuxSgError::InvalidParameter {
                    name: "timeout",
                    message: format!("'{}' is not a valid timeout in ms", value),
                })?;
            }
            _ => warn!("Unknown bsg option: {}={}", key, value),
        }
    }

    let device = device.ok_or(LinuxSgError::MissingParameter("dev"))?;
    Ok(LinuxBsgConfig { device, timeout_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sg_io_v4_layout() {
        assert_eq!(std::mem::size_of::<SgIoV4>(), 160);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("dev", "/dev/bsg/expander-6:0")]).unwrap();
        assert_eq!(config.device, PathBuf::from("/dev/bsg/expander-6:0"));
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);

        assert!(matches!(
            parse_options(&[]),
            Err(LinuxSgError::MissingParameter("dev"))
        ));
    }
}
