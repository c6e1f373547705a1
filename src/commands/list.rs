//! Boards command implementation

use super::format_size;
use dapflash_core::target::BoardDatabase;
use dapflash_sim::region_span;

/// List all known boards
pub fn list_boards(db: &BoardDatabase, vendor_filter: Option<&str>) {
    println!("Known boards:");
    println!();
    println!(
        "{:<6} {:<24} {:<20} {:<16} {:>10}",
        "ID", "Name", "Vendor", "Target", "Flash"
    );
    println!("{}", "-".repeat(80));

    for board in db.iter() {
        if let Some(vendor) = vendor_filter {
            let vendor = vendor.to_lowercase();
            let family = format!("{:?}", board.family).to_lowercase();
            if !board.vendor.to_lowercase().contains(&vendor)
                && !board.target.vendor.to_lowercase().contains(&vendor)
                && !family.contains(&vendor)
            {
                continue;
            }
        }

        let flash: u32 = board
            .target
            .flash_regions
            .iter()
            .map(|r| region_span(r).1)
            .sum();

        println!(
            "{:<6} {:<24} {:<20} {:<16} {:>10}",
            board.board_id,
            board.name,
            board.vendor,
            board.target.part_number,
            format_size(flash)
        );
    }
}
