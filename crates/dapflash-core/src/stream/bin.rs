//! Raw binary images

use crate::target::TargetConfig;

/// Bytes of the vector table checked by [`is_vector_table`]
pub const VECTOR_TABLE_CHECK_SIZE: usize = 16;

fn word(data: &[u8], index: usize) -> u32 {
    let offset = index * 4;
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Check whether `data` starts with a Cortex-M vector table for `target`
///
/// The initial stack pointer must point into RAM (the top of a RAM region
/// counts) and the reset, NMI and HardFault vectors must point into flash.
pub fn is_vector_table(target: &TargetConfig, data: &[u8]) -> bool {
    if data.len() < VECTOR_TABLE_CHECK_SIZE {
        return false;
    }

    let sp = word(data, 0);
    if !target
        .ram_regions
        .iter()
        .any(|r| sp >= r.start && sp <= r.end)
    {
        log::debug!("Initial SP 0x{:08X} is not in RAM", sp);
        return false;
    }

    (1..4).all(|i| {
        let vector = word(data, i);
        let in_flash = target.is_flash(vector);
        if !in_flash {
            log::debug!("Vector {} (0x{:08X}) is not in flash", i, vector);
        }
        in_flash
    })
}

/// Places a binary image contiguously from a base address
#[derive(Debug, Clone, Copy)]
pub struct BinDecoder {
    addr: u32,
}

impl BinDecoder {
    /// Start a new image at `base`
    pub fn new(base: u32) -> Self {
        Self { addr: base }
    }

    /// Address the next byte is placed at
    pub fn next_addr(&self) -> u32 {
        self.addr
    }

    /// Take `len` bytes, returning the address they belong at
    pub fn advance(&mut self, len: usize) -> u32 {
        let addr = self.addr;
        self.addr = self.addr.wrapping_add(len as u32);
        addr
    }
}
