//! Target run states and flash algorithm functions

/// States the probe can drive the target into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Reset and halt, ready for programming
    ResetProgram,
    /// Reset and let the target run
    ResetRun,
    /// Family specific work after programming (usually nothing)
    PostFlashReset,
}

/// Function a flash algorithm is initialised for
///
/// The numeric values are the `fnc` argument of `Init()`/`UnInit()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum FlashFunc {
    /// Algorithm not initialised
    #[default]
    Nop = 0,
    /// Erase
    Erase = 1,
    /// Program
    Program = 2,
    /// Verify
    Verify = 3,
}

impl FlashFunc {
    /// Value passed to the algorithm
    pub const fn code(self) -> u32 {
        self as u32
    }
}
