//! Region, algorithm and sector lookups
//!
//! Pure functions over a [`TargetConfig`]. Region order matters: the first
//! region containing an address wins, and the default region is consulted
//! only when no region does.

use crate::error::{Error, Result};
use crate::target::{SectorInfo, TargetConfig};

/// Largest page handed to a single `program_page` call by upper layers
pub const MAX_PROGRAM_PAGE_SIZE: u32 = 256;

/// Algorithm selected for an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Index into [`TargetConfig::algorithms`]
    pub algo: usize,
    /// Start of the region the address was resolved through
    pub flash_start: u32,
}

/// Index of the first region flagged as default
pub fn default_region(cfg: &TargetConfig) -> Option<usize> {
    cfg.flash_regions.iter().position(|r| r.is_default())
}

/// Find the algorithm governing `addr`
///
/// A region that contains `addr` but has no algorithm resolves to `None`;
/// it is not skipped in favour of later regions or the default.
pub fn resolve(cfg: &TargetConfig, default: Option<usize>, addr: u32) -> Option<Resolved> {
    let region = match cfg.flash_regions.iter().find(|r| r.contains(addr)) {
        Some(region) => region,
        None => cfg.flash_regions.get(default?)?,
    };

    region.algo.map(|algo| Resolved {
        algo,
        flash_start: region.start,
    })
}

/// Erase granularity at `addr`
///
/// The table is scanned from the end; the first entry starting at or below
/// `addr` applies.
pub fn sector_size(sectors: &[SectorInfo], addr: u32) -> Result<u32> {
    match sectors.iter().rev().find(|s| s.start <= addr) {
        Some(sector) => Ok(sector.size),
        None => {
            log::error!("No sector information for address 0x{:08X}", addr);
            Err(Error::NoSectorInfo)
        }
    }
}

/// Preferred program page size at `addr`
pub fn program_page_min_size(sectors: &[SectorInfo], addr: u32) -> Result<u32> {
    Ok(sector_size(sectors, addr)?.min(MAX_PROGRAM_PAGE_SIZE))
}
