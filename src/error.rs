//! Errors reported by the command line tool

use dapflash_core::settings::SettingsError;
use dapflash_core::target::BoardDbError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Board(#[from] BoardDbError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("flash error: {0}")]
    Flash(#[from] dapflash_core::Error),

    #[error("failed to write Intel HEX: {0}")]
    Hex(#[from] ihex::WriterError),

    #[error("unknown board '{0}' (see `dapflash boards`)")]
    UnknownBoard(String),

    #[error("board file not found: {}", .0.display())]
    BoardFileNotFound(PathBuf),

    #[error("image {} is empty", .0.display())]
    EmptyImage(PathBuf),

    #[error("flash differs from reference at 0x{addr:08X}")]
    Mismatch { addr: u32 },

    #[error("reference is {reference} bytes but the flash region holds only {flash}")]
    ReferenceTooLarge { reference: usize, flash: usize },
}
