//! Target flash programming
//!
//! This module contains the flash engine, the write-buffering flash manager
//! and the region/sector lookups they share.

mod intf;
mod manager;
pub mod resolve;
mod target;

pub use intf::FlashIntf;
pub use manager::{FlashManager, MAX_WRITE_BLOCK};
pub use resolve::Resolved;
pub use target::{SessionState, TargetFlash};
