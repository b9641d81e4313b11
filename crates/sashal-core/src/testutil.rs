//! Recording register mock for unit tests

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::ops::Range;

use crate::error::{Error, Result};
use crate::regs;
use crate::transport::scsi::parse_read_buffer_cdb;
use crate::transport::smp::{self, function, FRAME_TYPE_RESPONSE};
use crate::transport::{DataDirection, RegisterAccess, ScsiPassthrough, SmpPassthrough};

/// Sparse register file plus byte-addressed memory windows
#[derive(Default)]
pub(crate) struct MockRegisters {
    regs: BTreeMap<u32, u32>,
    failing: BTreeSet<u32>,
    mem: Vec<(u32, Vec<u8>)>,
    pub reads32: Vec<u32>,
    pub block_reads: Vec<(u32, usize)>,
    pub writes: Vec<(u32, u32)>,
}

impl MockRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flash image mapped at the strapped base and at the reset alias
    pub fn with_flash(image: &[u8], cfi: bool) -> Self {
        let mut mock = Self::new();
        let pos = if cfi {
            regs::PowerOnSense::CFI_ENABLED
        } else {
            regs::PowerOnSense::empty()
        };
        mock.set_register(regs::POWER_ON_SENSE, pos.bits());
        mock.map_bytes(pos.flash_base(), image);
        mock.map_bytes(regs::FLASH_ALIAS_BASE, image);
        mock
    }

    pub fn set_register(&mut self, addr: u32, value: u32) {
        self.regs.insert(addr, value);
    }

    pub fn fail_register(&mut self, addr: u32) {
        self.failing.insert(addr);
    }

    pub fn map_bytes(&mut self, base: u32, bytes: &[u8]) {
        self.mem.push((base, bytes.to_vec()));
    }

    /// Number of accesses (word or block) that touched `range`
    pub fn accesses_in(&self, range: Range<u32>) -> usize {
        let words = self.reads32.iter().filter(|a| range.contains(a)).count();
        let blocks = self
            .block_reads
            .iter()
            .filter(|(a, len)| *a < range.end && a.saturating_add(*len as u32) > range.start)
            .count();
        words + blocks
    }

    /// Total number of transport calls
    pub fn total_accesses(&self) -> usize {
        self.reads32.len() + self.block_reads.len() + self.writes.len()
    }

    /// View that only exposes word access, so the default block read runs
    pub fn without_block_reads(&mut self) -> WordOnly<'_> {
        WordOnly(self)
    }

    fn lookup(&self, addr: u32, len: usize) -> Option<&[u8]> {
        self.mem.iter().find_map(|(base, bytes)| {
            let start = addr.checked_sub(*base)? as usize;
            bytes.get(start..start.checked_add(len)?)
        })
    }
}

impl RegisterAccess for MockRegisters {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        self.reads32.push(addr);
        if self.failing.contains(&addr) {
            return Err(Error::RegisterReadFailed { addr });
        }
        if let Some(value) = self.regs.get(&addr) {
            return Ok(*value);
        }
        self.lookup(addr, 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or(Error::RegisterReadFailed { addr })
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.writes.push((addr, value));
        self.regs.insert(addr, value);
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.block_reads.push((addr, buf.len()));
        if self.failing.contains(&addr) {
            return Err(Error::RegisterReadFailed { addr });
        }
        if let (4, Some(value)) = (buf.len(), self.regs.get(&addr)) {
            buf.copy_from_slice(&value.to_le_bytes());
            return Ok(());
        }
        let data = self
            .lookup(addr, buf.len())
            .ok_or(Error::RegisterReadFailed { addr })?;
        buf.copy_from_slice(data);
        Ok(())
    }
}

pub(crate) struct WordOnly<'a>(&'a mut MockRegisters);

impl RegisterAccess for WordOnly<'_> {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        self.0.read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.0.write32(addr, value)
    }
}

/// SCSI target serving memory reads from a [`MockRegisters`]
pub(crate) struct ScsiTarget {
    pub mem: MockRegisters,
    pub commands: usize,
}

impl ScsiTarget {
    pub fn new(mem: MockRegisters) -> Self {
        Self { mem, commands: 0 }
    }
}

impl ScsiPassthrough for ScsiTarget {
    fn passthrough(&mut self, cdb: &[u8], dir: DataDirection, buf: &mut [u8]) -> Result<()> {
        self.commands += 1;
        match (dir, parse_read_buffer_cdb(cdb)) {
            (DataDirection::FromDevice, Some((addr, _))) => self.mem.read(addr, buf),
            _ => Err(Error::ScsiCommandFailed { opcode: cdb[0] }),
        }
    }
}

/// SMP target with fixed discovery responses and memory reads from a
/// [`MockRegisters`]
pub(crate) struct SmpTarget {
    pub mem: MockRegisters,
    pub manufacturer_info: Vec<u8>,
    pub report_general: Vec<u8>,
    pub requests: Vec<u8>,
    /// Function that fails at the transport level, and the error it fails with
    pub failure: Option<(u8, Error)>,
}

impl SmpTarget {
    pub fn new(mem: MockRegisters, component_id: u16, revision: u8) -> Self {
        let mut info = alloc::vec![0u8; 64];
        info[0] = FRAME_TYPE_RESPONSE;
        info[1] = function::REPORT_MANUFACTURER_INFO;
        info[12..20].copy_from_slice(b"LSI     ");
        info[20..36].copy_from_slice(b"SAS4x48         ");
        info[36..40].copy_from_slice(b"0102");
        info[40..48].copy_from_slice(b"BROADCOM");
        info[48..50].copy_from_slice(&component_id.to_be_bytes());
        info[50] = revision;

        let mut general = alloc::vec![0u8; 64];
        general[0] = FRAME_TYPE_RESPONSE;
        general[1] = function::REPORT_GENERAL;
        general[9] = 48;
        general[12..20].copy_from_slice(&0x5000_605B_0123_4567u64.to_be_bytes());

        Self {
            mem,
            manufacturer_info: info,
            report_general: general,
            requests: Vec::new(),
            failure: None,
        }
    }

    fn reply(response: &mut [u8], frame: &[u8]) -> usize {
        let len = core::cmp::min(response.len(), frame.len());
        response[..len].copy_from_slice(&frame[..len]);
        len
    }
}

impl SmpPassthrough for SmpTarget {
    fn smp_passthrough(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize> {
        let func = request[1];
        self.requests.push(func);
        if let Some((failing, err)) = self.failure {
            if failing == func {
                return Err(err);
            }
        }
        match func {
            function::REPORT_MANUFACTURER_INFO => {
                Ok(Self::reply(response, &self.manufacturer_info))
            }
            function::REPORT_GENERAL => Ok(Self::reply(response, &self.report_general)),
            function::READ_MEMORY => {
                let addr = smp::be32(request, 4)?;
                let len = smp::be32(request, 8)? as usize;
                response[0] = FRAME_TYPE_RESPONSE;
                response[1] = func;
                response[2] = 0;
                self.mem.read(addr, &mut response[4..4 + len])?;
                Ok(response.len())
            }
            _ => Err(Error::SmpFunctionFailed { function: func }),
        }
    }
}
