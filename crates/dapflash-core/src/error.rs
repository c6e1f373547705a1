//! Error types for dapflash-core
//!
//! This module provides a no_std compatible error type that is shared by the
//! flash engine, the flash manager and the image stream decoder.

use core::fmt;

/// Flash algorithm entry point that reported a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoOp {
    /// `Init()`
    Init,
    /// `UnInit()`
    UnInit,
    /// `EraseChip()`
    EraseChip,
    /// `EraseSector()`
    EraseSector,
    /// `ProgramPage()`
    ProgramPage,
    /// `Verify()`
    Verify,
}

impl AlgoOp {
    /// Name of the entry point as it appears in CMSIS flash algorithms
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::UnInit => "UnInit",
            Self::EraseChip => "EraseChip",
            Self::EraseSector => "EraseSector",
            Self::ProgramPage => "ProgramPage",
            Self::Verify => "Verify",
        }
    }
}

/// Details about a failed flash algorithm call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgoFailure {
    /// Entry point that failed
    pub op: AlgoOp,
    /// Target address passed to the entry point (0 if not applicable)
    pub addr: u32,
    /// Raw vendor status code; only "nonzero" is meaningful
    pub status: u32,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Session errors
    /// No board descriptor, or the session is not open
    Failure,
    /// Engine misuse, e.g. programming before an algorithm was selected
    Internal,

    // Resolution errors
    /// Address is not governed by any region with a usable algorithm
    AlgoMissing,
    /// Sector table has no entry covering the address
    NoSectorInfo,

    // Operation errors
    /// Sector erase requested at an address that is not sector aligned
    EraseSector,
    /// Write refused because it would set protected security bits
    SecurityBits,
    /// Target could not be reset into the requested state
    Reset,
    /// Flash algorithm blob could not be downloaded to the target
    AlgoDownload,
    /// Flash algorithm `Init()` failed
    Init,
    /// Flash algorithm `UnInit()` failed
    UnInit,
    /// A flash algorithm entry point returned a nonzero status
    Algorithm(AlgoFailure),
    /// Programmed data did not verify
    WriteVerify,

    // Transport errors
    /// Debug transport failed (memory access or routine execution)
    Transport,
    /// Memory access outside of any known memory
    OutOfBounds,

    // Stream errors
    /// Data was written to a stream that is not open
    StreamNotOpen,
    /// First block did not look like any supported image format
    UnknownStream,
    /// Malformed Intel HEX record
    HexParse,
    /// Intel HEX record checksum mismatch
    HexChecksum,

    // Configuration errors
    /// Board descriptor failed validation
    InvalidConfig,
}

impl fmt::Display for AlgoFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flash algorithm {}() failed at 0x{:08X} with status 0x{:08X}",
            self.op.name(),
            self.addr,
            self.status
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure => write!(f, "flash session not available"),
            Self::Internal => write!(f, "internal flash engine error"),
            Self::AlgoMissing => write!(f, "no flash algorithm for address"),
            Self::NoSectorInfo => write!(f, "no sector information for address"),
            Self::EraseSector => write!(f, "sector erase address is not sector aligned"),
            Self::SecurityBits => write!(f, "image would set target security bits"),
            Self::Reset => write!(f, "target reset failed"),
            Self::AlgoDownload => write!(f, "flash algorithm download failed"),
            Self::Init => write!(f, "flash algorithm init failed"),
            Self::UnInit => write!(f, "flash algorithm uninit failed"),
            Self::Algorithm(failure) => write!(f, "{}", failure),
            Self::WriteVerify => write!(f, "verify failed: data mismatch"),
            Self::Transport => write!(f, "debug transport error"),
            Self::OutOfBounds => write!(f, "memory access out of bounds"),
            Self::StreamNotOpen => write!(f, "stream is not open"),
            Self::UnknownStream => write!(f, "unrecognized image format"),
            Self::HexParse => write!(f, "malformed Intel HEX record"),
            Self::HexChecksum => write!(f, "Intel HEX checksum mismatch"),
            Self::InvalidConfig => write!(f, "invalid board description"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
