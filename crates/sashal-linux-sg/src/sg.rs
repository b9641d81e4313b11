//! SCSI generic (`/dev/sgN`) passthrough using the SG_IO v3 interface

use crate::error::{LinuxSgError, Result};
use crate::sysfs::{pci_address_for_node, SG_CLASS};
use log::{debug, info, trace, warn};
use sashal_core::error::{Error as CoreError, Result as CoreResult};
use sashal_core::transport::{DataDirection, PciAddress, ScsiPassthrough};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Default command timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u32 = 30_000;

const SENSE_LEN: usize = 32;

/// SG_IO interface constants from scsi/sg.h
mod sg {
    pub const INTERFACE_ID: libc::c_int = b'S' as libc::c_int;
    pub const DXFER_NONE: libc::c_int = -1;
    pub const DXFER_TO_DEV: libc::c_int = -2;
    pub const DXFER_FROM_DEV: libc::c_int = -3;
    /// `info` bit set when any status is non-zero
    pub const INFO_CHECK: u32 = 0x1;

    /// The SG_IO request code is not encoded with _IOWR
    pub const SG_IO: u32 = 0x2285;

    nix::ioctl_readwrite_bad!(sg_io, SG_IO, super::SgIoHdr);
}

/// struct sg_io_hdr from scsi/sg.h
#[repr(C)]
#[derive(Debug)]
pub(crate) struct SgIoHdr {
    interface_id: libc::c_int,
    dxfer_direction: libc::c_int,
    cmd_len: libc::c_uchar,
    mx_sb_len: libc::c_uchar,
    iovec_count: libc::c_ushort,
    dxfer_len: libc::c_uint,
    dxferp: *mut libc::c_void,
    cmdp: *const libc::c_uchar,
    sbp: *mut libc::c_uchar,
    timeout: libc::c_uint,
    flags: libc::c_uint,
    pack_id: libc::c_int,
    usr_ptr: *mut libc::c_void,
    status: libc::c_uchar,
    masked_status: libc::c_uchar,
    msg_status: libc::c_uchar,
    sb_len_wr: libc::c_uchar,
    host_status: libc::c_ushort,
    driver_status: libc::c_ushort,
    resid: libc::c_int,
    duration: libc::c_uint,
    info: libc::c_uint,
}

/// Configuration for opening an sg node
#[derive(Debug, Clone)]
pub struct LinuxSgConfig {
    /// Device path (e.g., "/dev/sg3")
    pub device: PathBuf,
    /// Command timeout in milliseconds
    pub timeout_ms: u32,
}

impl LinuxSgConfig {
    /// Configuration for `device` with the default timeout
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// SCSI generic device handle
pub struct LinuxSg {
    file: File,
    path: PathBuf,
    timeout_ms: u32,
    pci_address: Option<PciAddress>,
}

impl LinuxSg {
    /// Open an sg node
    pub fn open(config: &LinuxSgConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSgError::OpenFailed {
                path: config.device.display().to_string(),
                source: e,
            })?;
        let pci_address = pci_address_for_node(SG_CLASS, &config.device);

        info!(
            "Opened {} (timeout {} ms, host {})",
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

    /// Execute one CDB
    pub fn execute(&mut self, cdb: &[u8], direction: DataDirection, buf: &mut [u8]) -> Result<()> {
        let opcode = cdb.first().copied().unwrap_or(0);
        let cmd_len = u8::try_from(cdb.len()).map_err(|_| LinuxSgError::InvalidParameter {
            name: "cdb",
            message: format!("{} byte CDB", cdb.len()),
        })?;
        let dxfer_len =
            u32::try_from(buf.len()).map_err(|_| LinuxSgError::TransferTooLarge(buf.len()))?;
        let dxfer_direction = match direction {
            DataDirection::None => sg::DXFER_NONE,
            DataDirection::ToDevice => sg::DXFER_TO_DEV,
            DataDirection::FromDevice => sg::DXFER_FROM_DEV,
        };

        let mut sense = [0u8; SENSE_LEN];
        let mut hdr = SgIoHdr {
            interface_id: sg::INTERFACE_ID,
            dxfer_direction,
            cmd_len,
            mx_sb_len: SENSE_LEN as u8,
            iovec_count: 0,
            dxfer_len,
            dxferp: buf.as_mut_ptr().cast(),
            cmdp: cdb.as_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: self.timeout_ms,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        trace!("{}: CDB {:02X?}", self.path.display(), cdb);
        // SAFETY: every pointer in `hdr` refers to a live buffer of the
        // advertised length for the duration of the call.
        unsafe { sg::sg_io(self.file.as_raw_fd(), &mut hdr) }.map_err(LinuxSgError::Ioctl)?;

        if hdr.info & sg::INFO_CHECK != 0 {
            let sense_len = (hdr.sb_len_wr as usize).min(SENSE_LEN);
            debug!(
                "{}: opcode 0x{:02X} sense {:02X?}",
                self.path.display(),
                opcode,
                &sense[..sense_len]
            );
            return Err(LinuxSgError::ScsiStatus {
                opcode,
                status: hdr.status,
                host_status: hdr.host_status,
                driver_status: hdr.driver_status,
            });
        }
        if hdr.resid != 0 {
            warn!(
                "{}: opcode 0x{:02X} short transfer (resid {})",
                self.path.display(),
                opcode,
                hdr.resid
            );
        }
        Ok(())
    }
}

impl ScsiPassthrough for LinuxSg {
    fn passthrough(&mut self, cdb: &[u8], direction: DataDirection, buf: &mut [u8]) -> CoreResult<()> {
        let opcode = cdb.first().copied().unwrap_or(0);
        self.execute(cdb, direction, buf).map_err(|e| {
            debug!("{}: {}", self.path.display(), e);
            CoreError::ScsiCommandFailed { opcode }
        })
    }

    fn pci_address(&self) -> Option<PciAddress> {
        self.pci_address
    }
}

/// Parse sg options into a configuration
///
/// Options:
/// - `dev=/dev/sgN` - Required: sg node
/// - `timeout=<ms>` - Command timeout (default 30000)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxSgConfig> {
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
            _ => warn!("Unknown sg option: {}={}", key, value),
        }
    }

    let device = device.ok_or(LinuxSgError::MissingParameter("dev"))?;
    Ok(LinuxSgConfig { device, timeout_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sg_io_hdr_layout() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<SgIoHdr>(), 88);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("dev", "/dev/sg3"), ("timeout", "5000")]).unwrap();
        assert_eq!(config.device, PathBuf::from("/dev/sg3"));
        assert_eq!(config.timeout_ms, 5000);

        assert!(matches!(
            parse_options(&[("timeout", "1")]),
            Err(LinuxSgError::MissingParameter("dev"))
        ));
        assert!(matches!(
            parse_options(&[("dev", "/dev/sg0"), ("timeout", "soon")]),
            Err(LinuxSgError::InvalidParameter { name: "timeout", .. })
        ));
    }
}
