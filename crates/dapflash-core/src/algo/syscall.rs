//! CMSIS flash algorithm execution over a debug transport

use crate::error::{Error, Result};
use crate::target::{FlashFunc, ProgramTarget, TargetState};

use super::traits::{DebugTransport, FlashAlgo, TargetControl};

/// Runs flash algorithms in target RAM through a [`DebugTransport`]
///
/// The blob is written to `algo_start`, data for `ProgramPage()` and
/// `Verify()` is staged in the algorithm's page buffer and every entry point
/// is called with the CMSIS-pack argument layout:
///
/// | Entry point   | R0    | R1    | R2              |
/// |---------------|-------|-------|-----------------|
/// | `Init`        | adr   | clk   | fnc             |
/// | `UnInit`      | fnc   |       |                 |
/// | `EraseChip`   |       |       |                 |
/// | `EraseSector` | adr   |       |                 |
/// | `ProgramPage` | adr   | sz    | program_buffer  |
/// | `Verify`      | adr   | sz    | program_buffer  |
pub struct SyscallAlgo<T> {
    transport: T,
}

impl<T: DebugTransport> SyscallAlgo<T> {
    /// Create a new algorithm runner
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the runner and return the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn call(&mut self, algo: &ProgramTarget, entry: u32, args: [u32; 4]) -> Result<u32> {
        log::trace!(
            "syscall 0x{:08X}({:08X}, {:08X}, {:08X}, {:08X})",
            entry,
            args[0],
            args[1],
            args[2],
            args[3]
        );
        self.transport.syscall(&algo.sys_call, entry, args)
    }

    fn stage(&mut self, algo: &ProgramTarget, data: &[u8]) -> Result<()> {
        if data.len() > algo.program_buffer_size as usize {
            log::error!(
                "{} bytes do not fit the {} byte page buffer",
                data.len(),
                algo.program_buffer_size
            );
            return Err(Error::Internal);
        }
        self.transport.write_memory(algo.program_buffer, data)
    }
}

impl<T: DebugTransport> FlashAlgo for SyscallAlgo<T> {
    fn load(&mut self, algo: &ProgramTarget) -> Result<()> {
        log::debug!(
            "Downloading flash algorithm '{}' ({} bytes) to 0x{:08X}",
            algo.name,
            algo.algo_size(),
            algo.algo_start
        );
        self.transport
            .write_memory(algo.algo_start, &algo.blob_bytes())
            .map_err(|_| Error::AlgoDownload)
    }

    fn init(
        &mut self,
        algo: &ProgramTarget,
        addr: u32,
        clock: u32,
        func: FlashFunc,
    ) -> Result<u32> {
        self.call(algo, algo.init, [addr, clock, func.code(), 0])
    }

    fn uninit(&mut self, algo: &ProgramTarget, func: FlashFunc) -> Result<u32> {
        self.call(algo, algo.uninit, [func.code(), 0, 0, 0])
    }

    fn erase_chip(&mut self, algo: &ProgramTarget) -> Result<u32> {
        self.call(algo, algo.erase_chip, [0; 4])
    }

    fn erase_sector(&mut self, algo: &ProgramTarget, addr: u32) -> Result<u32> {
        self.call(algo, algo.erase_sector, [addr, 0, 0, 0])
    }

    fn program_page(&mut self, algo: &ProgramTarget, addr: u32, data: &[u8]) -> Result<u32> {
        self.stage(algo, data)?;
        self.call(
            algo,
            algo.program_page,
            [addr, data.len() as u32, algo.program_buffer, 0],
        )
    }

    fn verify(&mut self, algo: &ProgramTarget, addr: u32, data: &[u8]) -> Result<u32> {
        self.stage(algo, data)?;
        self.call(
            algo,
            algo.verify,
            [addr, data.len() as u32, algo.program_buffer, 0],
        )
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.transport.read_memory(addr, buf)
    }
}

impl<T: TargetControl> TargetControl for SyscallAlgo<T> {
    fn set_state(&mut self, state: TargetState) -> Result<()> {
        self.transport.set_state(state)
    }
}
