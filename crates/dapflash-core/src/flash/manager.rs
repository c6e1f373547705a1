//! Write buffering and erase sequencing on top of a [`FlashIntf`]
//!
//! Image decoders produce data in whatever order and size the file has.
//! [`FlashManager`] collects it into write blocks, makes sure the covering
//! sector is erased before the first block inside it is programmed, and
//! re-selects the flash algorithm whenever the data crosses into another
//! sector.

use alloc::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::settings::EraseMode;

use super::intf::FlashIntf;

/// Largest write block handed to `program_page`
pub const MAX_WRITE_BLOCK: usize = 1024;

/// Erased flash value
const ERASED_VALUE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Closed,
    Open,
    Error,
}

/// Size of the 32-bit target address space
const ADDRESS_SPACE: u64 = 1 << 32;

fn round_down(value: u32, align: u32) -> u32 {
    value - value % align
}

/// Whether `addr` lies in `[start, start + size)`
fn contains(start: u32, size: u32, addr: u32) -> bool {
    addr >= start && addr - start < size
}

/// Buffers image data into write blocks and programs them through a
/// [`FlashIntf`]
pub struct FlashManager<I> {
    intf: I,
    state: ManagerState,
    erase_mode: EraseMode,
    buf: [u8; MAX_WRITE_BLOCK],
    buf_empty: bool,
    block_addr: u32,
    block_size: u32,
    sector_addr: u32,
    sector_size: u32,
    sector_valid: bool,
    /// Sectors erased during this session
    erased: BTreeSet<u32>,
    /// Write blocks programmed during this session
    programmed: BTreeSet<u32>,
}

impl<I: FlashIntf> FlashManager<I> {
    /// Create a closed manager
    pub fn new(intf: I) -> Self {
        Self {
            intf,
            state: ManagerState::Closed,
            erase_mode: EraseMode::Chip,
            buf: [ERASED_VALUE; MAX_WRITE_BLOCK],
            buf_empty: true,
            block_addr: 0,
            block_size: 0,
            sector_addr: 0,
            sector_size: 0,
            sector_valid: false,
            erased: BTreeSet::new(),
            programmed: BTreeSet::new(),
        }
    }

    /// Get a reference to the flash interface
    pub fn intf(&self) -> &I {
        &self.intf
    }

    /// Get a mutable reference to the flash interface
    pub fn intf_mut(&mut self) -> &mut I {
        &mut self.intf
    }

    /// Consume the manager and return the flash interface
    pub fn into_inner(self) -> I {
        self.intf
    }

    /// Whether a session is open
    pub fn is_open(&self) -> bool {
        self.state == ManagerState::Open
    }

    /// Open the flash interface
    ///
    /// In [`EraseMode::Chip`] the whole chip is erased before any data is
    /// accepted.
    pub fn init(&mut self, erase_mode: EraseMode) -> Result<()> {
        log::debug!("flash_manager init({:?})", erase_mode);
        if self.state != ManagerState::Closed {
            return Err(Error::Internal);
        }

        self.erase_mode = erase_mode;
        self.buf_empty = true;
        self.sector_valid = false;
        self.erased.clear();
        self.programmed.clear();

        self.intf.init()?;

        if erase_mode == EraseMode::Chip {
            if let Err(e) = self.intf.erase_chip() {
                log::error!("Chip erase failed: {}", e);
                let _ = self.intf.uninit();
                return Err(e);
            }
        }

        self.state = ManagerState::Open;
        Ok(())
    }

    /// Queue `data` for programming at `addr`
    pub fn data(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if self.state != ManagerState::Open {
            return Err(Error::Internal);
        }

        let result = self.write(addr, data);
        if let Err(e) = result {
            log::error!("flash_manager data(0x{:08X}, {}) failed: {}", addr, data.len(), e);
            self.state = ManagerState::Error;
        }
        result
    }

    fn write(&mut self, mut addr: u32, mut data: &[u8]) -> Result<()> {
        log::trace!("flash_manager data(0x{:08X}, {})", addr, data.len());

        if u64::from(addr) + data.len() as u64 > ADDRESS_SPACE {
            log::error!(
                "{} bytes at 0x{:08X} run past the end of the address space",
                data.len(),
                addr
            );
            return Err(Error::AlgoMissing);
        }

        if !self.sector_valid {
            self.setup_next_sector(addr)?;
            self.sector_valid = true;
        }

        // Writes may jump backwards or skip ahead
        while !data.is_empty() {
            if !contains(self.block_addr, self.block_size, addr) {
                self.flush_current_block()?;
                if contains(self.sector_addr, self.sector_size, addr) {
                    self.start_block(addr)?;
                } else {
                    self.setup_next_sector(addr)?;
                }
            }

            let offset = (addr - self.block_addr) as usize;
            let len = data.len().min(self.block_size as usize - offset);
            self.buf[offset..offset + len].copy_from_slice(&data[..len]);
            self.buf_empty = false;

            // Only wraps once the last byte of the address space is written
            addr = addr.wrapping_add(len as u32);
            data = &data[len..];
        }

        Ok(())
    }

    /// Flush the pending block and close the flash interface
    ///
    /// The interface is closed even if the flush fails; the first error is
    /// returned.
    pub fn uninit(&mut self) -> Result<()> {
        log::debug!("flash_manager uninit()");
        if self.state == ManagerState::Closed {
            return Err(Error::Internal);
        }

        let flush = if self.state == ManagerState::Open && self.sector_valid {
            self.flush_current_block()
        } else {
            Ok(())
        };
        let close = self.intf.uninit();

        self.state = ManagerState::Closed;
        self.sector_valid = false;
        self.buf_empty = true;
        self.erased.clear();
        self.programmed.clear();

        flush.and(close)
    }

    fn flush_current_block(&mut self) -> Result<()> {
        if !self.buf_empty {
            let size = self.block_size as usize;
            self.intf.program_page(self.block_addr, &self.buf[..size])?;
            self.programmed.insert(self.block_addr);
            self.buf_empty = true;
        }
        Ok(())
    }

    /// Make the write block covering `addr` current
    ///
    /// A block programmed earlier in the session is seeded with its flash
    /// contents so that programming it again keeps the earlier data.
    fn start_block(&mut self, addr: u32) -> Result<()> {
        self.block_addr = round_down(addr, self.block_size);
        let block = &mut self.buf[..self.block_size as usize];
        if self.programmed.contains(&self.block_addr) {
            log::debug!("Write block 0x{:08X} revisited", self.block_addr);
            self.intf.read(self.block_addr, block)?;
        } else {
            block.fill(ERASED_VALUE);
        }
        self.buf_empty = true;
        Ok(())
    }

    fn setup_next_sector(&mut self, addr: u32) -> Result<()> {
        let min_prog_size = self.intf.program_page_min_size(addr)?;
        let sector_size = self.intf.erase_sector_size(addr)?;
        if min_prog_size == 0
            || sector_size == 0
            || sector_size < min_prog_size
            || sector_size % min_prog_size != 0
        {
            log::error!(
                "Invalid page/sector size {}/{} at 0x{:08X}",
                min_prog_size,
                sector_size,
                addr
            );
            return Err(Error::Internal);
        }

        // Regions with different algorithms start on sector boundaries
        self.intf.set(addr)?;

        self.sector_size = sector_size;
        self.sector_addr = round_down(addr, sector_size);
        self.block_size = sector_size.min(MAX_WRITE_BLOCK as u32);

        if self.erase_mode == EraseMode::Page && !self.erased.contains(&self.sector_addr) {
            self.intf.erase_sector(self.sector_addr)?;
            self.erased.insert(self.sector_addr);
        }

        self.start_block(addr)
    }
}
