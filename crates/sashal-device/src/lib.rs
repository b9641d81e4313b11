//! sashal-device - Transport registry and expander handles
//!
//! This crate opens an expander from a transport string such as
//! `sg:dev=/dev/sg3` and hands back an [`ExpanderHandle`] that owns the
//! transport. The CLI never names a concrete transport type; it asks the
//! handle for a [`DeviceHandle`](sashal_core::DeviceHandle) per call.

mod handle;
mod registry;

pub use handle::{ExpanderHandle, Transport};
pub use registry::{
    available_transports, open_device, parse_transport_params, transport_names_short,
    TransportInfo, TransportParams,
};
