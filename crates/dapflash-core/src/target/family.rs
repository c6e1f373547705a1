//! Target family hooks
//!
//! Families group targets that need the same special handling during
//! programming. The only hook the flash engine consults is the security bit
//! check, which refuses images that would lock the part.

/// Known target families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum FamilyId {
    /// Generic target without special handling
    #[default]
    Stub,
    /// NXP/Freescale Kinetis (flash configuration field at 0x400)
    Kinetis,
    /// Nordic nRF51
    NordicNrf51,
    /// Nordic nRF52
    NordicNrf52,
    /// Nordic nRF53/nRF91 (secure/non-secure aliases)
    NordicNrf53,
}

/// Per-family behaviour consulted by the flash engine
pub trait TargetFamily {
    /// Return `true` if programming `data` at `addr` would set security bits
    /// that must not be written
    fn security_bits_set(&self, _addr: u32, _data: &[u8]) -> bool {
        false
    }
}

/// Family without any hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct StubFamily;

impl TargetFamily for StubFamily {}

/// Kinetis flash security byte (FSEC) location
const KINETIS_FSEC_ADDR: u32 = 0x40C;

/// Kinetis family: guards the FSEC byte of the flash configuration field
#[derive(Debug, Clone, Copy, Default)]
pub struct KinetisFamily;

impl TargetFamily for KinetisFamily {
    fn security_bits_set(&self, addr: u32, data: &[u8]) -> bool {
        let end = addr as u64 + data.len() as u64;
        if addr > KINETIS_FSEC_ADDR || end <= KINETIS_FSEC_ADDR as u64 {
            return false;
        }

        let fsec = data[(KINETIS_FSEC_ADDR - addr) as usize];
        // MEEN = 0b10 disables mass erase; the part could never be recovered
        if fsec & 0x30 == 0x20 {
            log::warn!("FSEC 0x{:02X} would disable mass erase", fsec);
            return true;
        }
        // SEC != 0b10 secures the part
        if fsec & 0x03 != 0x02 {
            log::warn!("FSEC 0x{:02X} would secure the target", fsec);
            return true;
        }
        false
    }
}

impl FamilyId {
    /// Hooks for this family
    pub fn hooks(self) -> &'static dyn TargetFamily {
        match self {
            FamilyId::Kinetis => &KinetisFamily,
            FamilyId::Stub
            | FamilyId::NordicNrf51
            | FamilyId::NordicNrf52
            | FamilyId::NordicNrf53 => &StubFamily,
        }
    }
}
