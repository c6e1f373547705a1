//! Erase command implementation

use crate::error::CliError;
use crate::progress;
use dapflash_core::algo::SyscallAlgo;
use dapflash_core::flash::TargetFlash;
use dapflash_core::target::BoardInfo;
use dapflash_core::Settings;
use dapflash_sim::{AlgoCall, SimTarget};

/// Chip erase every region of a simulated target
///
/// Regions without an algorithm, or whose algorithm cannot chip erase, are
/// left alone. Returns the target for inspection.
pub fn run_erase(board: &BoardInfo, settings: Settings) -> Result<SimTarget, CliError> {
    let driver = SyscallAlgo::new(SimTarget::new(&board.target));
    let mut engine = TargetFlash::new(driver, Some(board), settings);

    let pb = progress::spinner(&format!("Erasing {}...", board.name));
    engine.init()?;
    let result = engine.erase_chip();
    // Closed even when the erase failed; the erase error wins
    let closed = engine.uninit();
    if let Err(e) = result.and(closed) {
        pb.abandon_with_message("Erase failed");
        return Err(e.into());
    }

    let target = engine.into_driver().into_inner();
    let erased = target
        .calls()
        .iter()
        .filter(|c| matches!(c, AlgoCall::EraseChip { .. }))
        .count();
    pb.finish_with_message(format!("Erased {} region(s)", erased));
    Ok(target)
}
