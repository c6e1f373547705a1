//! Target and board description types

use alloc::string::String;
use alloc::vec::Vec;

use super::algorithm::ProgramTarget;
use super::flags::RegionFlags;
use crate::error::{Error, Result};

/// Erase granularity starting at an address
///
/// The size applies from `start` up to the start of the next entry of the
/// sector table, or to the end of flash for the last entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorInfo {
    /// First address using this sector size
    pub start: u32,
    /// Sector size in bytes
    pub size: u32,
}

impl SectorInfo {
    /// Create a new sector table entry
    pub const fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }
}

/// A contiguous flash address range governed by one flash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashRegion {
    /// Start address (inclusive)
    pub start: u32,
    /// End address (inclusive for lookups)
    pub end: u32,
    /// Region flags
    pub flags: RegionFlags,
    /// Index into [`TargetConfig::algorithms`]; `None` marks the region
    /// as unflashable
    pub algo: Option<usize>,
}

impl FlashRegion {
    /// Create a new region governed by the algorithm at index `algo`
    pub const fn new(start: u32, end: u32, algo: Option<usize>) -> Self {
        Self {
            start,
            end,
            flags: RegionFlags::empty(),
            algo,
        }
    }

    /// Return the same region with the given flags
    pub const fn with_flags(mut self, flags: RegionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check if an address is within this region
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Check if this is the catch-all region
    pub fn is_default(&self) -> bool {
        self.flags.contains(RegionFlags::IS_DEFAULT)
    }
}

/// A RAM range of the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct RamRegion {
    /// Start address (inclusive)
    pub start: u32,
    /// End address (exclusive)
    pub end: u32,
}

impl RamRegion {
    /// Create a new RAM region
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Everything the flash engine needs to know about one target device
///
/// Region order matters: lookups return the first region containing an
/// address, and the default region is only consulted when none does.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetConfig {
    /// Vendor name (e.g., "NordicSemiconductor")
    pub vendor: String,
    /// Part number (e.g., "nRF52833_xxAA")
    pub part_number: String,
    /// Sector table, ordered by start address
    pub sectors: Vec<SectorInfo>,
    /// Flash regions in lookup order
    pub flash_regions: Vec<FlashRegion>,
    /// RAM regions
    pub ram_regions: Vec<RamRegion>,
    /// Flash algorithms referenced by the regions
    pub algorithms: Vec<ProgramTarget>,
    /// Re-initialise the flash session after a chip erase
    pub erase_reset: bool,
}

impl TargetConfig {
    /// Check the structural invariants of the description
    ///
    /// - the sector table is non-empty with strictly increasing starts
    /// - every region has `start <= end`
    /// - every algorithm reference is in range
    /// - at most one region carries [`RegionFlags::IS_DEFAULT`]
    pub fn validate(&self) -> Result<()> {
        if self.sectors.is_empty() {
            log::error!("{}: empty sector table", self.part_number);
            return Err(Error::InvalidConfig);
        }
        if self.sectors.windows(2).any(|w| w[0].start >= w[1].start) {
            log::error!("{}: sector table is not sorted", self.part_number);
            return Err(Error::InvalidConfig);
        }
        if self.sectors.iter().any(|s| s.size == 0) {
            log::error!("{}: zero sized sector", self.part_number);
            return Err(Error::InvalidConfig);
        }

        for region in &self.flash_regions {
            if region.start > region.end {
                log::error!(
                    "{}: invalid region 0x{:08X}-0x{:08X}",
                    self.part_number,
                    region.start,
                    region.end
                );
                return Err(Error::InvalidConfig);
            }
            if region.algo.is_some_and(|idx| idx >= self.algorithms.len()) {
                log::error!(
                    "{}: region 0x{:08X} references a missing algorithm",
                    self.part_number,
                    region.start
                );
                return Err(Error::InvalidConfig);
            }
        }

        if self.flash_regions.iter().filter(|r| r.is_default()).count() > 1 {
            log::error!("{}: more than one default region", self.part_number);
            return Err(Error::InvalidConfig);
        }

        Ok(())
    }

    /// Check whether `addr` lies in any flash region
    pub fn is_flash(&self, addr: u32) -> bool {
        self.flash_regions.iter().any(|r| r.contains(addr))
    }
}

/// A development board: the probe's view of the target it is soldered to
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardInfo {
    /// Four hex digit board ID
    pub board_id: String,
    /// Board vendor
    pub vendor: String,
    /// Board name
    pub name: String,
    /// Target family, selects the family hooks
    pub family: super::family::FamilyId,
    /// The target device
    pub target: TargetConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn config() -> TargetConfig {
        TargetConfig {
            vendor: "Test".into(),
            part_number: "TEST1".into(),
            sectors: vec![SectorInfo::new(0, 0x400), SectorInfo::new(0x8000, 0x1000)],
            flash_regions: vec![
                FlashRegion::new(0, 0x1_0000, Some(0)).with_flags(RegionFlags::IS_DEFAULT)
            ],
            ram_regions: vec![RamRegion::new(0x2000_0000, 0x2000_4000)],
            algorithms: vec![],
            erase_reset: false,
        }
    }

    #[test]
    fn test_region_contains_inclusive_end() {
        let region = FlashRegion::new(0x1000, 0x1FFF, None);
        assert!(region.contains(0x1000));
        assert!(region.contains(0x1FFF));
        assert!(!region.contains(0x2000));
        assert!(!region.contains(0x0FFF));
    }

    #[test]
    fn test_validate_rejects_dangling_algorithm() {
        // Region references algorithm 0 but none are defined
        assert_eq!(config().validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn test_validate_sector_table() {
        let mut cfg = config();
        cfg.flash_regions[0].algo = None;
        assert_eq!(cfg.validate(), Ok(()));

        cfg.sectors.clear();
        assert_eq!(cfg.validate(), Err(Error::InvalidConfig));

        cfg.sectors = vec![SectorInfo::new(0x8000, 0x1000), SectorInfo::new(0, 0x400)];
        assert_eq!(cfg.validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn test_validate_single_default() {
        let mut cfg = config();
        cfg.flash_regions[0].algo = None;
        cfg.flash_regions.push(
            FlashRegion::new(0x2_0000, 0x3_0000, None).with_flags(RegionFlags::IS_DEFAULT),
        );
        assert_eq!(cfg.validate(), Err(Error::InvalidConfig));
    }
}
