//! Dump command implementation

use super::{program_image, read_image};
use crate::error::CliError;
use dapflash_core::target::BoardInfo;
use dapflash_core::Settings;
use dapflash_sim::Bank;
use ihex::Record;
use std::fs;
use std::path::Path;

/// Bytes per Intel HEX data record
const RECORD_SIZE: usize = 16;

/// Build Intel HEX records for the programmed parts of `banks`
///
/// Fully erased lines are left out.
pub(crate) fn flash_records(banks: &[Bank]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut upper = None;

    for bank in banks {
        for (i, line) in bank.data.chunks(RECORD_SIZE).enumerate() {
            if line.iter().all(|&b| b == 0xFF) {
                continue;
            }

            let addr = bank.start + (i * RECORD_SIZE) as u32;
            let address_msbs = (addr >> 16) as u16;
            if upper != Some(address_msbs) {
                records.push(Record::ExtendedLinearAddress(address_msbs));
                upper = Some(address_msbs);
            }
            records.push(Record::Data {
                offset: (addr & 0xFFFF) as u16,
                value: line.to_vec(),
            });
        }
    }

    records.push(Record::EndOfFile);
    records
}

/// Run the dump command
pub fn run_dump(
    board: &BoardInfo,
    settings: Settings,
    input: &Path,
    output: &Path,
    block_size: usize,
) -> Result<(), CliError> {
    let image = read_image(input)?;
    let target = program_image(board, settings, &image, block_size)?;

    let records = flash_records(target.flash_banks());
    let hexdata = ihex::create_object_file_representation(&records)?;
    fs::write(output, hexdata.as_bytes())?;
    println!(
        "Wrote {} data records to {}",
        records.len().saturating_sub(1),
        output.display()
    );
    Ok(())
}
