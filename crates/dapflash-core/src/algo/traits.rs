//! Flash algorithm and target control trait definitions
//!
//! The flash engine never touches target memory directly. It talks to the
//! target through two narrow traits:
//!
//! - [`FlashAlgo`] runs the entry points of a vendor flash algorithm
//! - [`TargetControl`] moves the target between run states
//!
//! [`DebugTransport`] is the lower level interface a probe provides (memory
//! access plus "call a routine in target RAM"); [`SyscallAlgo`](super::SyscallAlgo)
//! builds a [`FlashAlgo`] on top of it.

use crate::error::Result;
use crate::target::{FlashFunc, ProgramTarget, SyscallContext, TargetState};

/// Low level debug access to the target
///
/// This is the part of a debug probe the flash engine depends on. A real
/// implementation drives SWD or JTAG; the simulator keeps everything in
/// memory.
pub trait DebugTransport {
    /// Write `data` to target memory at `addr`
    fn write_memory(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Read target memory at `addr` into `buf`
    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Execute the routine at `entry` with up to four arguments in R0-R3
    ///
    /// The routine runs with the stack pointer, static base (R9) and return
    /// address taken from `ctx` and the call completes when the core halts
    /// on the breakpoint. Returns R0.
    fn syscall(&mut self, ctx: &SyscallContext, entry: u32, args: [u32; 4]) -> Result<u32>;
}

/// Target reset and run control
pub trait TargetControl {
    /// Drive the target into `state`
    fn set_state(&mut self, state: TargetState) -> Result<()>;
}

/// Vendor flash algorithm ABI
///
/// Every entry point returns the raw vendor status in `Ok`: 0 means success
/// and any other value is a failure whose meaning is vendor specific. `Err`
/// is reserved for failures of the mechanism itself (the transport).
pub trait FlashAlgo {
    /// Make `algo` resident on the target
    fn load(&mut self, algo: &ProgramTarget) -> Result<()>;

    /// `Init(adr, clk, fnc)`
    fn init(&mut self, algo: &ProgramTarget, addr: u32, clock: u32, func: FlashFunc)
        -> Result<u32>;

    /// `UnInit(fnc)`
    fn uninit(&mut self, algo: &ProgramTarget, func: FlashFunc) -> Result<u32>;

    /// `EraseChip()`
    fn erase_chip(&mut self, algo: &ProgramTarget) -> Result<u32>;

    /// `EraseSector(adr)`
    fn erase_sector(&mut self, algo: &ProgramTarget, addr: u32) -> Result<u32>;

    /// `ProgramPage(adr, sz, buf)`
    ///
    /// `data` must not exceed `algo.program_buffer_size`.
    fn program_page(&mut self, algo: &ProgramTarget, addr: u32, data: &[u8]) -> Result<u32>;

    /// `Verify(adr, sz, buf)`
    ///
    /// Only called when the algorithm has a verify entry point.
    fn verify(&mut self, algo: &ProgramTarget, addr: u32, data: &[u8]) -> Result<u32>;

    /// Read flash contents back for verification
    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;
}
