//! CLI command implementations
//!
//! Every command runs against a [`SimTarget`](dapflash_sim::SimTarget) built
//! from the board description, driven through the same engine a probe would
//! use.

mod dump;
mod erase;
mod info;
mod list;
mod program;

pub use dump::run_dump;
pub use erase::run_erase;
pub use info::print_board_info;
pub use list::list_boards;
pub use program::{program_image, run_program};

use crate::error::CliError;
use std::fs;
use std::path::Path;

/// Read an image file, refusing empty ones
fn read_image(path: &Path) -> Result<Vec<u8>, CliError> {
    let data = fs::read(path)?;
    if data.is_empty() {
        return Err(CliError::EmptyImage(path.to_path_buf()));
    }
    log::info!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Format a byte count with a binary unit
fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(4096), "4 KiB");
        assert_eq!(format_size(0x10_0000), "1 MiB");
        assert_eq!(format_size(1536), "1536 B");
    }
}
