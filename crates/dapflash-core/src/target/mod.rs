//! Target descriptions, algorithm descriptors and board database
//!
//! This module provides the read-only data the flash engine works from:
//! sector tables, flash regions, flash algorithm descriptors and the family
//! hooks for each supported target.

mod algorithm;
mod family;
mod flags;
mod state;
mod types;

#[cfg(feature = "std")]
mod database;

pub use algorithm::{ProgramTarget, SyscallContext};
pub use family::{FamilyId, KinetisFamily, StubFamily, TargetFamily};
pub use flags::{AlgoFlags, RegionFlags};
pub use state::{FlashFunc, TargetState};
pub use types::*;

#[cfg(feature = "std")]
pub use database::*;
