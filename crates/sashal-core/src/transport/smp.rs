//! SMP framing and expander memory access over SMP
//!
//! Request frames are `{0x40, function, allocated response length, request
//! length, payload..., CRC}`; responses are `{0x41, function, function
//! result, response length, payload..., CRC}`. Lengths count dwords and
//! exclude the 4-byte header and the CRC. The CRC dword is left zero on
//! requests (the controller generates it) and ignored on responses.
//! All multi-byte fields are big-endian.

use alloc::vec;
use alloc::vec::Vec;

use super::{PciAddress, RegisterAccess, SmpPassthrough};
use crate::error::{Error, Result};

/// SMP request frame type
pub const FRAME_TYPE_REQUEST: u8 = 0x40;
/// SMP response frame type
pub const FRAME_TYPE_RESPONSE: u8 = 0x41;
/// Function result: accepted
pub const FUNCTION_ACCEPTED: u8 = 0x00;
/// Header plus CRC overhead of every frame
pub const FRAME_OVERHEAD: usize = 8;

/// SMP function codes
pub mod function {
    /// REPORT GENERAL
    pub const REPORT_GENERAL: u8 = 0x00;
    /// REPORT MANUFACTURER INFORMATION
    pub const REPORT_MANUFACTURER_INFO: u8 = 0x01;
    /// Vendor-specific expander memory read
    pub const READ_MEMORY: u8 = 0xC0;
    /// Vendor-specific expander memory write
    pub const WRITE_MEMORY: u8 = 0xC1;
}

/// Largest payload moved by one READ MEMORY exchange
pub const MAX_READ_MEMORY_LEN: usize = 512;

/// Build a request frame
pub fn build_request(function: u8, payload: &[u8], response_len: usize) -> Vec<u8> {
    let mut frame = vec![0u8; 4 + payload.len() + 4];
    frame[0] = FRAME_TYPE_REQUEST;
    frame[1] = function;
    frame[2] = (response_len.saturating_sub(FRAME_OVERHEAD) / 4) as u8;
    frame[3] = (payload.len() / 4) as u8;
    frame[4..4 + payload.len()].copy_from_slice(payload);
    frame
}

/// Send one SMP function and validate the response header
///
/// Returns the response frame truncated to the received length. A short
/// frame, wrong frame type or function echo, or a non-zero function result
/// is an error. Transport failures other than `NoMemory` are reported as
/// [`Error::SmpFunctionFailed`].
pub fn exchange(
    dev: &mut dyn SmpPassthrough,
    function: u8,
    payload: &[u8],
    response_len: usize,
) -> Result<Vec<u8>> {
    let request = build_request(function, payload, response_len);
    let mut response = Vec::new();
    response
        .try_reserve_exact(response_len)
        .map_err(|_| Error::NoMemory)?;
    response.resize(response_len, 0);

    let received = dev
        .smp_passthrough(&request, &mut response)
        .map_err(|e| match e {
            Error::NoMemory => Error::NoMemory,
            _ => Error::SmpFunctionFailed { function },
        })?;
    response.truncate(received.min(response_len));

    if response.len() < 4 {
        return Err(Error::ResponseTooShort);
    }
    if response[0] != FRAME_TYPE_RESPONSE || response[1] != function {
        return Err(Error::SmpFunctionFailed { function });
    }
    if response[2] != FUNCTION_ACCEPTED {
        return Err(Error::SmpFunctionRejected {
            function,
            result: response[2],
        });
    }
    Ok(response)
}

/// Read a big-endian u16 at `offset`
pub fn be16(frame: &[u8], offset: usize) -> Result<u16> {
    frame
        .get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(Error::ResponseTooShort)
}

/// Read a big-endian u32 at `offset`
pub fn be32(frame: &[u8], offset: usize) -> Result<u32> {
    frame
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(Error::ResponseTooShort)
}

/// [`RegisterAccess`] over an SMP passthrough transport
pub struct SmpMemory<'a> {
    dev: &'a mut dyn SmpPassthrough,
}

impl<'a> SmpMemory<'a> {
    /// Wrap an SMP passthrough transport
    pub fn new(dev: &'a mut dyn SmpPassthrough) -> Self {
        Self { dev }
    }
}

impl RegisterAccess for SmpMemory<'_> {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        let mut payload = [0u8; 8];
        payload[0..4].copy_from_slice(&addr.to_be_bytes());
        payload[4..8].copy_from_slice(&value.to_be_bytes());
        log::trace!("smp: write32 0x{:08X} = 0x{:08X}", addr, value);
        exchange(self.dev, function::WRITE_MEMORY, &payload, FRAME_OVERHEAD)
            .map(|_| ())
            .map_err(|_| Error::RegisterWriteFailed { addr })
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let mut done = 0usize;
        for chunk in buf.chunks_mut(MAX_READ_MEMORY_LEN) {
            let cur = addr
                .checked_add(done as u32)
                .ok_or(Error::InvalidParameter)?;
            // Payload lengths are dword multiples on the wire
            let wire_len = (chunk.len() + 3) & !3;
            let mut payload = [0u8; 8];
            payload[0..4].copy_from_slice(&cur.to_be_bytes());
            payload[4..8].copy_from_slice(&(chunk.len() as u32).to_be_bytes());

            log::trace!("smp: read 0x{:08X} len {}", cur, chunk.len());
            let response = exchange(
                self.dev,
                function::READ_MEMORY,
                &payload,
                wire_len + FRAME_OVERHEAD,
            )
            .map_err(|_| Error::RegisterReadFailed { addr: cur })?;

            let data = response
                .get(4..4 + chunk.len())
                .ok_or(Error::RegisterReadFailed { addr: cur })?;
            chunk.copy_from_slice(data);
            done += chunk.len();
        }
        Ok(())
    }

    fn pci_address(&self) -> Option<PciAddress> {
        self.dev.pci_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers READ MEMORY with the low address byte pattern
    struct Echo {
        requests: usize,
        result: u8,
    }

    impl SmpPassthrough for Echo {
        fn smp_passthrough(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize> {
            self.requests += 1;
            response[0] = FRAME_TYPE_RESPONSE;
            response[1] = request[1];
            response[2] = self.result;
            if request[1] == function::READ_MEMORY {
                let addr = be32(request, 4)?;
                let len = be32(request, 8)? as usize;
                for i in 0..len {
                    response[4 + i] = (addr as usize + i) as u8;
                }
            }
            Ok(response.len())
        }
    }

    #[test]
    fn test_request_framing() {
        let frame = build_request(function::REPORT_GENERAL, &[], 64);
        assert_eq!(frame, [0x40, 0x00, 14, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_exchange_rejects_function_result() {
        let mut dev = Echo { requests: 0, result: 0x02 };
        let err = exchange(&mut dev, function::REPORT_GENERAL, &[], 64).unwrap_err();
        assert_eq!(
            err,
            Error::SmpFunctionRejected {
                function: 0x00,
                result: 0x02
            }
        );
    }

    #[test]
    fn test_memory_read_over_smp() {
        let mut dev = Echo { requests: 0, result: 0 };
        let mut buf = [0u8; 6];
        SmpMemory::new(&mut dev).read(0x20, &mut buf).unwrap();
        assert_eq!(buf, [0x20, 0x21, 0x22, 0x23, 0x24, 0x25]);
        assert_eq!(dev.requests, 1);

        let word = SmpMemory::new(&mut dev).read32(0x40).unwrap();
        assert_eq!(word, 0x4342_4140);
    }
}
