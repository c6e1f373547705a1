//! dapflash-core - Target flash programming engine
//!
//! This crate turns firmware images into flash algorithm calls on a debug
//! target. It is `no_std` (with `alloc`) so the same engine can run on a
//! debug probe or on a host.
//!
//! The pieces, from the bottom up:
//!
//! - [`target`]: board, region, sector and flash algorithm descriptions
//! - [`algo`]: the traits the engine uses to reach the target, and a CMSIS
//!   flash algorithm runner on top of a debug transport
//! - [`flash`]: the [`TargetFlash`](flash::TargetFlash) engine and the
//!   write-buffering [`FlashManager`](flash::FlashManager)
//! - [`stream`]: Intel HEX and binary image decoding
//!
//! # Features
//!
//! - `std` - Enable standard library support: RON board database, TOML
//!   settings files and `std::error::Error` impls
//!
//! # Example
//!
//! ```ignore
//! use dapflash_core::{algo::SyscallAlgo, flash::TargetFlash, stream::Stream};
//!
//! let engine = TargetFlash::new(SyscallAlgo::new(probe), Some(&board), settings);
//! let mut stream = Stream::new(engine, &settings, &board.target);
//! stream.open(kind)?;
//! stream.write(&image)?;
//! stream.close()?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod algo;
pub mod error;
pub mod flash;
pub mod settings;
pub mod stream;
pub mod target;

pub use error::{Error, Result};
pub use settings::{EraseMode, Settings};
