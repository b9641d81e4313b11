//! Error types for sashal-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate, plus the coarse [`Status`] taxonomy reported to
//! callers such as inventory tools and the health monitor.

use core::fmt;

/// Coarse outcome of a qualification or firmware query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub enum Status {
    /// Operation completed and its result is safe to use
    Success,
    /// The device is not one this code understands; try the next one
    Ignore,
    /// The right device/region was found but a required step errored
    Failed,
    /// Caller supplied an invalid argument
    InvalidParameter,
    /// A buffer could not be allocated
    NoMemory,
    /// Capability not implemented for this handle type
    Unsupported,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Ignore => "ignore",
            Self::Failed => "failed",
            Self::InvalidParameter => "invalid parameter",
            Self::NoMemory => "no memory",
            Self::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// 32-bit register or memory read failed
    RegisterReadFailed {
        /// Address that was read
        addr: u32,
    },
    /// 32-bit register or memory write failed
    RegisterWriteFailed {
        /// Address that was written
        addr: u32,
    },
    /// SCSI passthrough command failed
    ScsiCommandFailed {
        /// Operation code of the failed CDB
        opcode: u8,
    },
    /// SMP passthrough request failed at the transport level
    SmpFunctionFailed {
        /// SMP function code
        function: u8,
    },
    /// SMP target answered with a non-zero function result
    SmpFunctionRejected {
        /// SMP function code
        function: u8,
        /// Function result reported by the target
        result: u8,
    },
    /// Response shorter than the fields being decoded
    ResponseTooShort,

    // Flash content errors
    /// Firmware header signature words do not match
    InvalidSignature,
    /// Chained header carries an unknown header type
    InvalidChainedHeader {
        /// Flash-relative offset of the header
        offset: u32,
    },
    /// Chain entry offset is the "no chain" sentinel
    ChainEmpty,
    /// Chain ended without an image of the requested type
    ImageNotFound,
    /// Chain exceeded the maximum number of steps
    ChainTooLong,
    /// Chain stepped outside of its flash region
    ChainOutOfBounds {
        /// Flash-relative offset that was rejected
        offset: u32,
    },
    /// Chained image size or content offset is inconsistent
    CorruptImage {
        /// Flash-relative offset of the image header
        offset: u32,
    },
    /// No firmware region is flagged as active
    NoActiveFirmware,

    // Generic errors
    /// Invalid argument
    InvalidParameter,
    /// Buffer allocation failed
    NoMemory,
    /// Capability not implemented for this handle type
    Unsupported,
}

impl Error {
    /// Map this error onto the caller-facing status taxonomy
    ///
    /// Everything that is not an argument, allocation or capability problem
    /// is reported as [`Status::Failed`]. Downgrading pre-identification
    /// errors to [`Status::Ignore`] is the qualifier's job, not this one.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidParameter => Status::InvalidParameter,
            Self::NoMemory => Status::NoMemory,
            Self::Unsupported => Status::Unsupported,
            _ => Status::Failed,
        }
    }

    /// True for errors raised by the transport rather than by flash content
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::RegisterReadFailed { .. }
                | Self::RegisterWriteFailed { .. }
                | Self::ScsiCommandFailed { .. }
                | Self::SmpFunctionFailed { .. }
                | Self::SmpFunctionRejected { .. }
                | Self::ResponseTooShort
        )
    }

    /// True for errors describing a malformed or unterminated image chain
    pub fn is_chain_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidChainedHeader { .. }
                | Self::ChainEmpty
                | Self::ImageNotFound
                | Self::ChainTooLong
                | Self::ChainOutOfBounds { .. }
                | Self::CorruptImage { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegisterReadFailed { addr } => {
                write!(f, "register read failed at 0x{:08X}", addr)
            }
            Self::RegisterWriteFailed { addr } => {
                write!(f, "register write failed at 0x{:08X}", addr)
            }
            Self::ScsiCommandFailed { opcode } => {
                write!(f, "SCSI command 0x{:02X} failed", opcode)
            }
            Self::SmpFunctionFailed { function } => {
                write!(f, "SMP function 0x{:02X} failed", function)
            }
            Self::SmpFunctionRejected { function, result } => write!(
                f,
                "SMP function 0x{:02X} rejected with result 0x{:02X}",
                function, result
            ),
            Self::ResponseTooShort => write!(f, "response too short"),
            Self::InvalidSignature => write!(f, "firmware header signature mismatch"),
            Self::InvalidChainedHeader { offset } => {
                write!(f, "invalid chained header at offset 0x{:08X}", offset)
            }
            Self::ChainEmpty => write!(f, "no chained images"),
            Self::ImageNotFound => write!(f, "requested image not found in chain"),
            Self::ChainTooLong => write!(f, "image chain exceeds maximum length"),
            Self::ChainOutOfBounds { offset } => {
                write!(f, "image chain left its region at offset 0x{:08X}", offset)
            }
            Self::CorruptImage { offset } => {
                write!(f, "corrupt chained image at offset 0x{:08X}", offset)
            }
            Self::NoActiveFirmware => write!(f, "no active firmware copy found"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::Unsupported => write!(f, "operation not supported by this device"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
