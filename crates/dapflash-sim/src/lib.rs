//! dapflash-sim - Simulated debug target
//!
//! This crate provides a debug target that lives in memory. It implements
//! [`DebugTransport`] and [`TargetControl`], so the flash engine can run
//! against it exactly as it would against a probe. Flash algorithm calls are
//! not executed as code: the simulator recognises the entry point of the
//! algorithm resident in its RAM and performs the equivalent NOR flash
//! operation, recording every call on the way.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use dapflash_core::algo::{DebugTransport, TargetControl};
use dapflash_core::error::{AlgoOp, Error, Result};
use dapflash_core::flash::resolve;
use dapflash_core::target::{
    AlgoFlags, FlashFunc, FlashRegion, ProgramTarget, SyscallContext, TargetConfig, TargetState,
};

/// Status returned by a simulated entry point that failed
pub const STATUS_FAILED: u32 = 1;

/// A flash algorithm call seen by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoCall {
    /// Algorithm blob written to its load address
    Download {
        /// Index of the algorithm in the target description
        algo: usize,
    },
    /// `Init(adr, clk, fnc)`
    Init {
        /// Algorithm index
        algo: usize,
        /// Flash start passed to the algorithm
        addr: u32,
        /// Function code
        func: u32,
    },
    /// `UnInit(fnc)`
    UnInit {
        /// Algorithm index
        algo: usize,
        /// Function code
        func: u32,
    },
    /// `EraseChip()`
    EraseChip {
        /// Algorithm index
        algo: usize,
    },
    /// `EraseSector(adr)`
    EraseSector {
        /// Algorithm index
        algo: usize,
        /// Sector address
        addr: u32,
    },
    /// `ProgramPage(adr, sz, buf)`
    ProgramPage {
        /// Algorithm index
        algo: usize,
        /// Target address
        addr: u32,
        /// Byte count
        len: u32,
    },
    /// `Verify(adr, sz, buf)`
    Verify {
        /// Algorithm index
        algo: usize,
        /// Target address
        addr: u32,
        /// Byte count
        len: u32,
    },
}

/// A contiguous block of simulated memory
#[derive(Debug, Clone)]
pub struct Bank {
    /// First address
    pub start: u32,
    /// Contents
    pub data: Vec<u8>,
}

impl Bank {
    fn new(start: u32, len: u32, fill: u8) -> Self {
        Self {
            start,
            data: vec![fill; len as usize],
        }
    }

    fn range(&self, addr: u32, len: usize) -> Option<core::ops::Range<usize>> {
        let offset = addr.checked_sub(self.start)? as usize;
        let end = offset.checked_add(len)?;
        (end <= self.data.len()).then_some(offset..end)
    }
}

/// Storage span of a flash region
///
/// Board files write region ends either as the last byte (`0x1FFF`) or one
/// past it (`0x2000`); an odd end is taken to be the last byte.
pub fn region_span(region: &FlashRegion) -> (u32, u32) {
    let len = if region.end & 1 == 1 {
        region.end - region.start + 1
    } else {
        region.end - region.start
    };
    (region.start, len)
}

/// In-memory debug target
pub struct SimTarget {
    target: TargetConfig,
    /// One bank per flash region
    flash: Vec<Bank>,
    ram: Vec<Bank>,
    calls: Vec<AlgoCall>,
    states: Vec<TargetState>,
    /// Algorithm initialised by the last `Init()` and the flash start it got
    initialised: Option<(usize, u32)>,
    faults: Vec<(AlgoOp, u32)>,
}

impl SimTarget {
    /// Create a target with erased flash and zeroed RAM
    pub fn new(target: &TargetConfig) -> Self {
        let flash = target
            .flash_regions
            .iter()
            .map(|r| {
                let (start, len) = region_span(r);
                Bank::new(start, len, 0xFF)
            })
            .collect();
        let ram = target
            .ram_regions
            .iter()
            .map(|r| Bank::new(r.start, r.end - r.start, 0))
            .collect();

        Self {
            target: target.clone(),
            flash,
            ram,
            calls: Vec::new(),
            states: Vec::new(),
            initialised: None,
            faults: Vec::new(),
        }
    }

    /// Every flash algorithm call so far
    pub fn calls(&self) -> &[AlgoCall] {
        &self.calls
    }

    /// Every state the target was driven into
    pub fn states(&self) -> &[TargetState] {
        &self.states
    }

    /// Flash banks, one per flash region
    pub fn flash_banks(&self) -> &[Bank] {
        &self.flash
    }

    /// Make every call to `op` return `status`
    pub fn inject_status(&mut self, op: AlgoOp, status: u32) {
        self.faults.retain(|(o, _)| *o != op);
        self.faults.push((op, status));
    }

    /// Overwrite flash contents directly, bypassing the algorithms
    pub fn preload(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let bank = Self::find_bank(&mut self.flash, addr, data.len()).ok_or(Error::OutOfBounds)?;
        let range = bank.range(addr, data.len()).ok_or(Error::OutOfBounds)?;
        bank.data[range].copy_from_slice(data);
        Ok(())
    }

    /// Read `len` bytes of flash starting at `addr`
    pub fn flash(&self, addr: u32, len: usize) -> Option<&[u8]> {
        self.flash
            .iter()
            .find_map(|bank| bank.range(addr, len).map(|r| &bank.data[r]))
    }

    fn find_bank(banks: &mut [Bank], addr: u32, len: usize) -> Option<&mut Bank> {
        banks.iter_mut().find(|b| b.range(addr, len).is_some())
    }

    fn ram_slice(&self, addr: u32, len: usize) -> Option<&[u8]> {
        self.ram
            .iter()
            .find_map(|bank| bank.range(addr, len).map(|r| &bank.data[r]))
    }

    fn is_resident(&self, algo: &ProgramTarget) -> bool {
        let blob = algo.blob_bytes();
        self.ram_slice(algo.algo_start, blob.len()) == Some(blob.as_slice())
    }

    /// Algorithm whose blob is in RAM and which owns `entry`
    fn resident_algo(&self, entry: u32) -> Option<usize> {
        self.target
            .algorithms
            .iter()
            .position(|a| a.has_entry(entry) && self.is_resident(a))
    }

    fn fault(&self, op: AlgoOp) -> Option<u32> {
        self.faults.iter().find(|(o, _)| *o == op).map(|(_, s)| *s)
    }

    fn run(&mut self, idx: usize, entry: u32, args: [u32; 4]) -> u32 {
        let algo = &self.target.algorithms[idx];
        let (op, call) = if entry == algo.init {
            (
                AlgoOp::Init,
                AlgoCall::Init {
                    algo: idx,
                    addr: args[0],
                    func: args[2],
                },
            )
        } else if entry == algo.uninit {
            (
                AlgoOp::UnInit,
                AlgoCall::UnInit {
                    algo: idx,
                    func: args[0],
                },
            )
        } else if entry == algo.erase_chip {
            (AlgoOp::EraseChip, AlgoCall::EraseChip { algo: idx })
        } else if entry == algo.erase_sector {
            (
                AlgoOp::EraseSector,
                AlgoCall::EraseSector {
                    algo: idx,
                    addr: args[0],
                },
            )
        } else if entry == algo.program_page {
            (
                AlgoOp::ProgramPage,
                AlgoCall::ProgramPage {
                    algo: idx,
                    addr: args[0],
                    len: args[1],
                },
            )
        } else {
            (
                AlgoOp::Verify,
                AlgoCall::Verify {
                    algo: idx,
                    addr: args[0],
                    len: args[1],
                },
            )
        };
        self.calls.push(call);

        if let Some(status) = self.fault(op) {
            return status;
        }

        match call {
            AlgoCall::Init { addr, func, .. } => {
                if func == FlashFunc::Nop.code() || func > FlashFunc::Verify.code() {
                    return STATUS_FAILED;
                }
                self.initialised = Some((idx, addr));
                0
            }
            AlgoCall::UnInit { .. } => {
                self.initialised = None;
                0
            }
            _ if self.initialised.map(|(i, _)| i) != Some(idx) => {
                log::warn!("Flash algorithm called before Init()");
                STATUS_FAILED
            }
            AlgoCall::EraseChip { .. } => {
                self.erase_chip(idx);
                0
            }
            AlgoCall::EraseSector { addr, .. } => self.erase_sector(addr),
            AlgoCall::ProgramPage { addr, len, .. } => self.program_page(addr, len, args[2]),
            AlgoCall::Verify { addr, len, .. } => self.verify(idx, addr, len, args[2]),
            AlgoCall::Download { .. } => 0,
        }
    }

    fn erase_chip(&mut self, idx: usize) {
        for (region, bank) in self.target.flash_regions.iter().zip(self.flash.iter_mut()) {
            if region.algo == Some(idx) {
                bank.data.fill(0xFF);
            }
        }
    }

    fn erase_sector(&mut self, addr: u32) -> u32 {
        let size = match resolve::sector_size(&self.target.sectors, addr) {
            Ok(size) => size,
            Err(_) => return STATUS_FAILED,
        };
        if addr % size != 0 {
            return STATUS_FAILED;
        }
        match Self::find_bank(&mut self.flash, addr, size as usize) {
            Some(bank) => {
                if let Some(range) = bank.range(addr, size as usize) {
                    bank.data[range].fill(0xFF);
                }
                0
            }
            None => {
                log::warn!("EraseSector(0x{:08X}) outside of flash", addr);
                STATUS_FAILED
            }
        }
    }

    fn program_page(&mut self, addr: u32, len: u32, buf: u32) -> u32 {
        let data = match self.ram_slice(buf, len as usize) {
            Some(data) => data.to_vec(),
            None => return STATUS_FAILED,
        };
        match Self::find_bank(&mut self.flash, addr, data.len()) {
            Some(bank) => {
                if let Some(range) = bank.range(addr, data.len()) {
                    // NOR flash: programming only clears bits
                    for (cell, byte) in bank.data[range].iter_mut().zip(&data) {
                        *cell &= *byte;
                    }
                }
                0
            }
            None => {
                log::warn!("ProgramPage(0x{:08X}, {}) outside of flash", addr, len);
                STATUS_FAILED
            }
        }
    }

    fn verify(&self, idx: usize, addr: u32, len: u32, buf: u32) -> u32 {
        let matches = match (self.ram_slice(buf, len as usize), self.flash(addr, len as usize)) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        };

        let returns_address = self.target.algorithms[idx]
            .algo_flags
            .contains(AlgoFlags::VERIFY_RETURNS_ADDRESS);
        match (matches, returns_address) {
            (true, true) => addr.wrapping_add(len),
            (true, false) => 0,
            (false, true) => addr,
            (false, false) => STATUS_FAILED,
        }
    }
}

impl DebugTransport for SimTarget {
    fn write_memory(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let bank = Self::find_bank(&mut self.ram, addr, data.len()).ok_or_else(|| {
            log::error!("Write of {} bytes at 0x{:08X} outside of RAM", data.len(), addr);
            Error::OutOfBounds
        })?;
        let range = bank.range(addr, data.len()).ok_or(Error::OutOfBounds)?;
        bank.data[range].copy_from_slice(data);

        if let Some(idx) = self
            .target
            .algorithms
            .iter()
            .position(|a| a.algo_start == addr && a.algo_size() as usize == data.len())
        {
            if self.is_resident(&self.target.algorithms[idx]) {
                self.calls.push(AlgoCall::Download { algo: idx });
                self.initialised = None;
            }
        }
        Ok(())
    }

    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let data = self
            .flash(addr, buf.len())
            .or_else(|| self.ram_slice(addr, buf.len()))
            .ok_or(Error::OutOfBounds)?;
        buf.copy_from_slice(data);
        Ok(())
    }

    fn syscall(&mut self, ctx: &SyscallContext, entry: u32, args: [u32; 4]) -> Result<u32> {
        let idx = self.resident_algo(entry).ok_or_else(|| {
            log::error!("No resident flash algorithm has an entry point at 0x{:08X}", entry);
            Error::Transport
        })?;
        if self.target.algorithms[idx].sys_call != *ctx {
            log::error!("Syscall context does not match flash algorithm");
            return Err(Error::Transport);
        }
        Ok(self.run(idx, entry, args))
    }
}

impl TargetControl for SimTarget {
    fn set_state(&mut self, state: TargetState) -> Result<()> {
        log::debug!("Target state {:?}", state);
        if matches!(state, TargetState::ResetProgram | TargetState::ResetRun) {
            self.initialised = None;
        }
        self.states.push(state);
        Ok(())
    }
}
