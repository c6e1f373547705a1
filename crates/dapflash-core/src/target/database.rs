//! Board database for runtime loading and lookup
//!
//! This module provides the `BoardDatabase` type for loading board
//! descriptions from RON files at runtime. One file describes one board:
//!
//! ```ron
//! (
//!     board_id: "9904",
//!     vendor: "Micro:bit Educational Foundation",
//!     name: "BBC micro:bit V2",
//!     family: NordicNrf52,
//!     target: (
//!         vendor: "NordicSemiconductor",
//!         part_number: "nRF52833_xxAA",
//!         erase_reset: true,
//!         sectors: [(start: 0x0, size: KiB(4))],
//!         flash_regions: [(start: 0x0, end: 0x80000, default: true, algo: Some("nrf52833"))],
//!         ram_regions: [(start: 0x20000000, end: 0x20020000)],
//!         algorithms: [ ... ],
//!     ),
//! )
//! ```

use alloc::format;
use std::fs;
use std::io;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use thiserror::Error;

use super::algorithm::{ProgramTarget, SyscallContext};
use super::family::FamilyId;
use super::flags::{AlgoFlags, RegionFlags};
use super::types::{BoardInfo, FlashRegion, RamRegion, SectorInfo, TargetConfig};

/// Error type for board database operations
#[derive(Debug, Error)]
pub enum BoardDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Size specification with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
    /// Size in mebibytes (1024 * 1024 bytes)
    MiB(u32),
}

impl Size {
    /// Convert to bytes
    pub fn to_bytes(self) -> u32 {
        match self {
            Size::B(n) => n,
            Size::KiB(n) => n * 1024,
            Size::MiB(n) => n * 1024 * 1024,
        }
    }
}

/// Algorithm flags (RON format)
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(default)]
struct AlgoFlagsDef {
    verify_returns_address: bool,
    single_init_type: bool,
    skip_chip_erase: bool,
    page_erase: bool,
}

impl From<AlgoFlagsDef> for AlgoFlags {
    fn from(def: AlgoFlagsDef) -> Self {
        let mut f = AlgoFlags::empty();
        if def.verify_returns_address {
            f |= AlgoFlags::VERIFY_RETURNS_ADDRESS;
        }
        if def.single_init_type {
            f |= AlgoFlags::SINGLE_INIT_TYPE;
        }
        if def.skip_chip_erase {
            f |= AlgoFlags::SKIP_CHIP_ERASE;
        }
        if def.page_erase {
            f |= AlgoFlags::PAGE_ERASE;
        }
        f
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct AlgorithmDef {
    name: String,
    init: u32,
    uninit: u32,
    erase_chip: u32,
    erase_sector: u32,
    program_page: u32,
    #[serde(default)]
    verify: u32,
    breakpoint: u32,
    static_base: u32,
    stack_pointer: u32,
    program_buffer: u32,
    algo_start: u32,
    blob: Vec<u32>,
    program_buffer_size: Size,
    #[serde(default)]
    flags: AlgoFlagsDef,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct SectorDef {
    start: u32,
    size: Size,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RegionDef {
    start: u32,
    end: u32,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    boot: bool,
    #[serde(default)]
    algo: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RamDef {
    start: u32,
    end: u32,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct TargetDef {
    vendor: String,
    part_number: String,
    #[serde(default)]
    erase_reset: bool,
    sectors: Vec<SectorDef>,
    flash_regions: Vec<RegionDef>,
    #[serde(default)]
    ram_regions: Vec<RamDef>,
    algorithms: Vec<AlgorithmDef>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct BoardDef {
    board_id: String,
    vendor: String,
    name: String,
    #[serde(default)]
    family: FamilyId,
    target: TargetDef,
}

fn build_algorithm(def: AlgorithmDef) -> ProgramTarget {
    ProgramTarget {
        name: def.name,
        init: def.init,
        uninit: def.uninit,
        erase_chip: def.erase_chip,
        erase_sector: def.erase_sector,
        program_page: def.program_page,
        verify: def.verify,
        sys_call: SyscallContext {
            breakpoint: def.breakpoint,
            static_base: def.static_base,
            stack_pointer: def.stack_pointer,
        },
        program_buffer: def.program_buffer,
        algo_start: def.algo_start,
        algo_blob: def.blob,
        program_buffer_size: def.program_buffer_size.to_bytes(),
        algo_flags: def.flags.into(),
    }
}

fn build_target(def: TargetDef) -> Result<TargetConfig, BoardDbError> {
    let algorithms: Vec<ProgramTarget> = def.algorithms.into_iter().map(build_algorithm).collect();

    let mut flash_regions = Vec::with_capacity(def.flash_regions.len());
    for region in def.flash_regions {
        let algo = match region.algo {
            Some(name) => Some(
                algorithms
                    .iter()
                    .position(|a| a.name == name)
                    .ok_or_else(|| {
                        BoardDbError::Validation(format!("unknown flash algorithm '{}'", name))
                    })?,
            ),
            None => None,
        };

        let mut flags = RegionFlags::empty();
        flags.set(RegionFlags::IS_DEFAULT, region.default);
        flags.set(RegionFlags::IS_SECURE, region.secure);
        flags.set(RegionFlags::IS_BOOT, region.boot);

        flash_regions.push(FlashRegion::new(region.start, region.end, algo).with_flags(flags));
    }

    Ok(TargetConfig {
        vendor: def.vendor,
        part_number: def.part_number,
        sectors: def
            .sectors
            .into_iter()
            .map(|s| SectorInfo::new(s.start, s.size.to_bytes()))
            .collect(),
        flash_regions,
        ram_regions: def
            .ram_regions
            .into_iter()
            .map(|r| RamRegion::new(r.start, r.end))
            .collect(),
        algorithms,
        erase_reset: def.erase_reset,
    })
}

// ============================================================================
// Board database
// ============================================================================

/// Runtime board database
///
/// Holds a collection of board descriptions that can be loaded from RON files.
#[derive(Debug, Clone, Default)]
pub struct BoardDatabase {
    boards: Vec<BoardInfo>,
}

impl BoardDatabase {
    /// Create an empty board database
    pub fn new() -> Self {
        Self { boards: Vec::new() }
    }

    /// Load a board description from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<&BoardInfo, BoardDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load a board description from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<&BoardInfo, BoardDbError> {
        let def: BoardDef = ron::from_str(content)?;
        let target = build_target(def.target)?;

        target.validate().map_err(|e| {
            BoardDbError::Validation(format!("{} ({}): {}", def.name, target.part_number, e))
        })?;
        for algo in &target.algorithms {
            if !algo.is_layout_valid() {
                return Err(BoardDbError::Validation(format!(
                    "flash algorithm '{}' overlaps its page buffer or stack",
                    algo.name
                )));
            }
        }

        if self.find_by_id(&def.board_id).is_some() {
            return Err(BoardDbError::Validation(format!(
                "duplicate board id {}",
                def.board_id
            )));
        }

        log::debug!("Loaded board {} ({})", def.name, def.board_id);
        self.boards.push(BoardInfo {
            board_id: def.board_id,
            vendor: def.vendor,
            name: def.name,
            family: def.family,
            target,
        });
        Ok(&self.boards[self.boards.len() - 1])
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, BoardDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                self.load_file(&path)?;
                total += 1;
            }
        }

        Ok(total)
    }

    /// Get all boards in the database
    pub fn boards(&self) -> &[BoardInfo] {
        &self.boards
    }

    /// Get the number of boards in the database
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Find a board by its board ID (case-insensitive)
    pub fn find_by_id(&self, board_id: &str) -> Option<&BoardInfo> {
        self.boards
            .iter()
            .find(|b| b.board_id.eq_ignore_ascii_case(board_id))
    }

    /// Find a board by ID, exact name or target part number (case-insensitive)
    pub fn find(&self, key: &str) -> Option<&BoardInfo> {
        self.find_by_id(key).or_else(|| {
            self.boards.iter().find(|b| {
                b.name.eq_ignore_ascii_case(key) || b.target.part_number.eq_ignore_ascii_case(key)
            })
        })
    }

    /// Iterate over all boards
    pub fn iter(&self) -> impl Iterator<Item = &BoardInfo> {
        self.boards.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const BOARD: &str = r#"
    (
        board_id: "9904",
        vendor: "Micro:bit Educational Foundation",
        name: "BBC micro:bit V2",
        family: NordicNrf52,
        target: (
            vendor: "NordicSemiconductor",
            part_number: "nRF52833_xxAA",
            erase_reset: true,
            sectors: [(start: 0x0, size: KiB(4))],
            flash_regions: [
                (start: 0x0, end: 0x80000, default: true, algo: Some("nrf52833")),
                (start: 0x10001000, end: 0x10001FFF, algo: None),
            ],
            ram_regions: [(start: 0x20000000, end: 0x20020000)],
            algorithms: [
                (
                    name: "nrf52833",
                    init: 0x20000039,
                    uninit: 0x2000003D,
                    erase_chip: 0x20000041,
                    erase_sector: 0x2000006D,
                    program_page: 0x200000A1,
                    breakpoint: 0x20000001,
                    static_base: 0x200000E4,
                    stack_pointer: 0x20000F00,
                    program_buffer: 0x20000A00,
                    algo_start: 0x20000000,
                    blob: [0xE00ABE00],
                    program_buffer_size: B(512),
                    flags: (skip_chip_erase: false),
                ),
            ],
        ),
    )
    "#;

    #[test]
    fn test_load_ron() {
        let mut db = BoardDatabase::new();
        db.load_ron(BOARD).unwrap();

        assert_eq!(db.len(), 1);
        let board = db.find("9904").unwrap();
        assert_eq!(board.family, FamilyId::NordicNrf52);

        let target = &board.target;
        assert!(target.erase_reset);
        assert_eq!(target.sectors, vec![SectorInfo::new(0, 4096)]);
        assert_eq!(target.flash_regions.len(), 2);
        assert!(target.flash_regions[0].is_default());
        assert_eq!(target.flash_regions[0].algo, Some(0));
        assert_eq!(target.flash_regions[1].algo, None);
        assert_eq!(target.algorithms[0].program_buffer_size, 512);
        assert_eq!(target.algorithms[0].verify, 0);
    }

    #[test]
    fn test_find_by_part_number() {
        let mut db = BoardDatabase::new();
        db.load_ron(BOARD).unwrap();
        assert!(db.find("nrf52833_xxaa").is_some());
        assert!(db.find("bbc micro:bit v2").is_some());
        assert!(db.find("9999").is_none());
    }

    #[test]
    fn test_duplicate_board_rejected() {
        let mut db = BoardDatabase::new();
        db.load_ron(BOARD).unwrap();
        assert!(matches!(db.load_ron(BOARD), Err(BoardDbError::Validation(_))));
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let board = BOARD.replace("algo: Some(\"nrf52833\")", "algo: Some(\"nrf52\")");
        let mut db = BoardDatabase::new();
        assert!(matches!(db.load_ron(&board), Err(BoardDbError::Validation(_))));
    }

    #[test]
    fn test_size_conversion() {
        assert_eq!(Size::B(256).to_bytes(), 256);
        assert_eq!(Size::KiB(4).to_bytes(), 4096);
        assert_eq!(Size::MiB(1).to_bytes(), 1048576);
    }
}
