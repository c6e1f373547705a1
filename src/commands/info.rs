//! Info command implementation

use super::format_size;
use dapflash_core::target::{AlgoFlags, BoardInfo, RegionFlags};
use dapflash_sim::region_span;

/// Print the memory map and flash algorithms of a board
pub fn print_board_info(board: &BoardInfo) {
    let target = &board.target;

    println!("Board Information");
    println!("=================");
    println!();
    println!("Board ID:        {}", board.board_id);
    println!("Name:            {}", board.name);
    println!("Vendor:          {}", board.vendor);
    println!("Family:          {:?}", board.family);
    println!("Target:          {} {}", target.vendor, target.part_number);
    println!(
        "Erase reset:     {}",
        if target.erase_reset { "yes" } else { "no" }
    );

    println!();
    println!("Flash regions (lookup order):");
    for region in &target.flash_regions {
        let (start, len) = region_span(region);
        let algo = region
            .algo
            .and_then(|idx| target.algorithms.get(idx))
            .map_or("-", |a| a.name.as_str());
        println!(
            "  0x{:08X} - 0x{:08X} {:>10}  algo: {:<16} {}",
            start,
            start.wrapping_add(len).wrapping_sub(1),
            format_size(len),
            algo,
            region_flags(region.flags)
        );
    }

    println!();
    println!("RAM regions:");
    for ram in &target.ram_regions {
        println!(
            "  0x{:08X} - 0x{:08X} {:>10}",
            ram.start,
            ram.end.wrapping_sub(1),
            format_size(ram.end - ram.start)
        );
    }

    println!();
    println!("Sectors:");
    for sector in &target.sectors {
        println!(
            "  from 0x{:08X}: {}",
            sector.start,
            format_size(sector.size)
        );
    }

    println!();
    println!("Flash algorithms:");
    for algo in &target.algorithms {
        println!(
            "  {:<16} load 0x{:08X} ({} bytes), buffer 0x{:08X} ({}), stack 0x{:08X}",
            algo.name,
            algo.algo_start,
            algo.algo_size(),
            algo.program_buffer,
            format_size(algo.program_buffer_size),
            algo.sys_call.stack_pointer
        );
        if !algo.algo_flags.is_empty() {
            println!("  {:<16} flags: {:?}", "", algo_flags(algo.algo_flags));
        }
    }
}

fn region_flags(flags: RegionFlags) -> String {
    let mut names = Vec::new();
    if flags.contains(RegionFlags::IS_DEFAULT) {
        names.push("default");
    }
    if flags.contains(RegionFlags::IS_SECURE) {
        names.push("secure");
    }
    if flags.contains(RegionFlags::IS_BOOT) {
        names.push("boot");
    }
    names.join(", ")
}

fn algo_flags(flags: AlgoFlags) -> Vec<&'static str> {
    flags.iter_names().map(|(name, _)| name).collect()
}
