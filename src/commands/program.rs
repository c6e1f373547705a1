//! Program command implementation
//!
//! Replays what happens when an image is dropped onto the probe's drive. The
//! first block decides the image type; the stream is then opened and fed
//! block by block until the image reports its end, and closed whatever the
//! outcome.

use super::read_image;
use crate::error::CliError;
use crate::progress;
use dapflash_core::algo::SyscallAlgo;
use dapflash_core::flash::TargetFlash;
use dapflash_core::stream::{self, Stream, StreamStatus};
use dapflash_core::target::BoardInfo;
use dapflash_core::{Error, Settings};
use dapflash_sim::{AlgoCall, Bank, SimTarget};
use std::fs;
use std::path::Path;

/// Program `image` into a freshly erased simulated target
///
/// The image is fed to the stream in `block_size` pieces. Returns the
/// target so its flash can be inspected.
pub fn program_image(
    board: &BoardInfo,
    settings: Settings,
    image: &[u8],
    block_size: usize,
) -> Result<SimTarget, CliError> {
    let first = &image[..image.len().min(block_size)];
    let kind = stream::identify(&board.target, &settings, first).ok_or(Error::UnknownStream)?;
    log::info!("Programming {:?} image into {}", kind, board.name);

    let driver = SyscallAlgo::new(SimTarget::new(&board.target));
    let engine = TargetFlash::new(driver, Some(board), settings);
    let mut stream = Stream::new(engine, &settings, &board.target);
    stream.open(kind)?;

    let pb = progress::bar(image.len() as u64, "Programming");
    let mut result = Ok(());
    for block in image.chunks(block_size) {
        match stream.write(block) {
            Ok(status) => {
                pb.inc(block.len() as u64);
                if status == StreamStatus::Done {
                    log::debug!("End of image reached");
                    break;
                }
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    let result = result.and(stream.close());
    match result {
        Ok(()) => pb.finish_with_message("done"),
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e.into());
        }
    }

    let target = stream.into_inner().into_driver().into_inner();
    log_summary(&target);
    Ok(target)
}

fn log_summary(target: &SimTarget) {
    let mut erased = 0;
    let mut programmed = 0u32;
    let mut downloads = 0;
    for call in target.calls() {
        match call {
            AlgoCall::EraseChip { .. } | AlgoCall::EraseSector { .. } => erased += 1,
            AlgoCall::ProgramPage { len, .. } => programmed += len,
            AlgoCall::Download { .. } => downloads += 1,
            _ => {}
        }
    }
    log::info!(
        "{} erase calls, {} bytes programmed, {} algorithm downloads",
        erased,
        programmed,
        downloads
    );
}

/// Compare flash against a reference binary
///
/// A mismatch reports the address of the first differing byte.
pub(crate) fn compare(bank: &Bank, reference: &[u8]) -> Result<(), CliError> {
    if reference.len() > bank.data.len() {
        return Err(CliError::ReferenceTooLarge {
            reference: reference.len(),
            flash: bank.data.len(),
        });
    }
    match bank.data.iter().zip(reference).position(|(a, b)| a != b) {
        Some(offset) => Err(CliError::Mismatch {
            addr: bank.start + offset as u32,
        }),
        None => Ok(()),
    }
}

/// Run the program command
pub fn run_program(
    board: &BoardInfo,
    settings: Settings,
    input: &Path,
    output: Option<&Path>,
    reference: Option<&Path>,
    block_size: usize,
) -> Result<(), CliError> {
    let image = read_image(input)?;
    let target = program_image(board, settings, &image, block_size)?;

    // Binary images land in the first region, so that is the one dumped
    let Some(bank) = target.flash_banks().first() else {
        return Ok(());
    };

    if let Some(path) = output {
        fs::write(path, &bank.data)?;
        println!("Wrote {} bytes of flash to {}", bank.data.len(), path.display());
    }

    if let Some(path) = reference {
        let expected = fs::read(path)?;
        compare(bank, &expected)?;
        println!("Flash matches {}", path.display());
    }

    println!("Programming complete.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::BUILTIN_BOARDS;

    fn vector_table() -> Vec<u8> {
        [0x2000_4000u32, 0x0000_0101, 0x0000_0145, 0x0000_0147]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_program_bin() {
        let board = BUILTIN_BOARDS.find_by_id("9904").unwrap();
        let mut image = vector_table();
        image.resize(3000, 0x42);

        let target = program_image(board, Settings::default(), &image, 512).unwrap();
        assert_eq!(target.flash(0, 3000).unwrap(), &image[..]);
        assert_eq!(target.flash(3000, 1).unwrap(), &[0xFF]);
    }

    #[test]
    fn test_unknown_image_rejected() {
        let board = BUILTIN_BOARDS.find_by_id("9904").unwrap();
        let result = program_image(board, Settings::default(), &[0xAB; 64], 512);
        assert!(matches!(
            result,
            Err(CliError::Flash(Error::UnknownStream))
        ));
    }

    #[test]
    fn test_compare() {
        let bank = Bank {
            start: 0x1000,
            data: vec![1, 2, 3, 4],
        };
        assert!(compare(&bank, &[1, 2, 3]).is_ok());
        assert!(matches!(
            compare(&bank, &[1, 2, 9]),
            Err(CliError::Mismatch { addr: 0x1002 })
        ));
        assert!(matches!(
            compare(&bank, &[0; 8]),
            Err(CliError::ReferenceTooLarge { .. })
        ));
    }
}
