//! Error types for Linux sg/bsg passthrough

use std::io;
use thiserror::Error;

/// Linux sg/bsg-specific errors
#[derive(Debug, Error)]
pub enum LinuxSgError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Device node could not be opened
    #[error("Failed to open '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    /// SG_IO ioctl itself failed
    #[error("SG_IO ioctl failed: {0}")]
    Ioctl(#[source] nix::errno::Errno),

    /// Command completed with a bad SCSI, host or driver status
    #[error(
        "SCSI command 0x{opcode:02X} failed: status 0x{status:02X}, host 0x{host_status:04X}, driver 0x{driver_status:04X}"
    )]
    ScsiStatus {
        opcode: u8,
        status: u8,
        host_status: u16,
        driver_status: u16,
    },

    /// SMP request failed in the SAS transport layer
    #[error(
        "SMP function 0x{function:02X} failed: driver 0x{driver_status:X}, transport 0x{transport_status:X}, device 0x{device_status:X}"
    )]
    SmpTransport {
        function: u8,
        driver_status: u32,
        transport_status: u32,
        device_status: u32,
    },

    /// Buffer too large for the kernel interface
    #[error("Transfer of {0} bytes is too large")]
    TransferTooLarge(usize),

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Result type for Linux sg/bsg operations
pub type Result<T> = std::result::Result<T, LinuxSgError>;
