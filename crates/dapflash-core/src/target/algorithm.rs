//! Flash algorithm descriptors
//!
//! A [`ProgramTarget`] describes a vendor flash algorithm that has been
//! linked for a specific target: a position independent blob which is
//! downloaded into target RAM, plus the entry point addresses and the calling
//! context needed to run it. The descriptor is pure data; executing it is the
//! job of a [`FlashAlgo`](crate::algo::FlashAlgo) implementation.

use alloc::string::String;
use alloc::vec::Vec;

use super::flags::AlgoFlags;

/// Register context used when calling into a flash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct SyscallContext {
    /// Return address; points at a breakpoint instruction in the blob
    pub breakpoint: u32,
    /// Position independent data base (R9)
    pub static_base: u32,
    /// Initial stack pointer
    pub stack_pointer: u32,
}

/// A flash algorithm linked for one target
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgramTarget {
    /// Name used by board descriptions to reference the algorithm
    pub name: String,
    /// Address of `Init(adr, clk, fnc)`
    pub init: u32,
    /// Address of `UnInit(fnc)`
    pub uninit: u32,
    /// Address of `EraseChip()`
    pub erase_chip: u32,
    /// Address of `EraseSector(adr)`
    pub erase_sector: u32,
    /// Address of `ProgramPage(adr, sz, buf)`
    pub program_page: u32,
    /// Address of `Verify(adr, sz, buf)`, 0 if the algorithm has none
    pub verify: u32,
    /// Calling context
    pub sys_call: SyscallContext,
    /// Target RAM address of the page buffer
    pub program_buffer: u32,
    /// Load address of the blob
    pub algo_start: u32,
    /// Algorithm code
    pub algo_blob: Vec<u32>,
    /// Maximum number of bytes handed to a single `ProgramPage()` call
    pub program_buffer_size: u32,
    /// Capability flags
    pub algo_flags: AlgoFlags,
}

impl ProgramTarget {
    /// Size of the blob in bytes
    pub fn algo_size(&self) -> u32 {
        (self.algo_blob.len() * 4) as u32
    }

    /// Blob as little-endian bytes, ready to be written to target RAM
    pub fn blob_bytes(&self) -> Vec<u8> {
        self.algo_blob.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Whether the algorithm provides a `Verify()` entry point
    pub fn has_verify(&self) -> bool {
        self.verify != 0
    }

    /// Check whether `entry` is one of this algorithm's entry points
    pub fn has_entry(&self, entry: u32) -> bool {
        entry != 0
            && [
                self.init,
                self.uninit,
                self.erase_chip,
                self.erase_sector,
                self.program_page,
                self.verify,
            ]
            .contains(&entry)
    }

    /// Check that the blob, page buffer and stack do not collide
    ///
    /// The page buffer may sit on either side of the blob. The stack grows
    /// down from `stack_pointer` and must start above the blob.
    pub fn is_layout_valid(&self) -> bool {
        let blob_start = self.algo_start as u64;
        let blob_end = blob_start + self.algo_size() as u64;
        let buf_start = self.program_buffer as u64;
        let buf_end = buf_start + self.program_buffer_size as u64;

        self.program_buffer_size > 0
            && (blob_end <= buf_start || buf_end <= blob_start)
            && self.sys_call.stack_pointer as u64 >= blob_end
    }
}
