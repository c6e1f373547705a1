//! Flash algorithm execution
//!
//! This module defines the traits the flash engine uses to reach the target
//! and a CMSIS-pack style algorithm runner built on a debug transport.

mod syscall;
mod traits;

pub use syscall::SyscallAlgo;
pub use traits::*;
