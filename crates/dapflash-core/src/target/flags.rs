//! Region and flash algorithm flags

use bitflags::bitflags;

bitflags! {
    /// Flags attached to a flash region
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "std", serde(transparent))]
    pub struct RegionFlags: u32 {
        /// Catch-all region used when no other region contains an address
        const IS_DEFAULT = 1 << 0;
        /// Region is only reachable through the secure alias
        const IS_SECURE  = 1 << 1;
        /// Region holds the boot image
        const IS_BOOT    = 1 << 2;
    }
}

impl Default for RegionFlags {
    fn default() -> Self {
        RegionFlags::empty()
    }
}

bitflags! {
    /// Capability flags of a flash algorithm
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "std", serde(transparent))]
    pub struct AlgoFlags: u32 {
        /// `Verify()` returns `addr + size` on success instead of 0
        const VERIFY_RETURNS_ADDRESS = 1 << 0;
        /// `Init()` is called once per session instead of once per function
        const SINGLE_INIT_TYPE       = 1 << 1;
        /// Never call `EraseChip()` for regions using this algorithm
        const SKIP_CHIP_ERASE        = 1 << 2;
        /// Algorithm erases pages rather than sectors
        const PAGE_ERASE             = 1 << 3;
    }
}

impl Default for AlgoFlags {
    fn default() -> Self {
        AlgoFlags::empty()
    }
}
