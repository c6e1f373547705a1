//! Upward flash interface

use crate::error::Result;

/// Flash programming interface used by the flash manager
///
/// Addresses are absolute target addresses. Every operation except
/// [`init`](FlashIntf::init) requires an open session.
pub trait FlashIntf {
    /// Open a programming session
    fn init(&mut self) -> Result<()>;

    /// Close the session and release the target
    fn uninit(&mut self) -> Result<()>;

    /// Program `data` at `addr`; the range must already be erased
    fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Read flash contents at `addr` into `buf`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Erase the sector starting at `addr`
    fn erase_sector(&mut self, addr: u32) -> Result<()>;

    /// Erase every region of the target
    fn erase_chip(&mut self) -> Result<()>;

    /// Preferred program page size at `addr`
    fn program_page_min_size(&self, addr: u32) -> Result<u32>;

    /// Sector size at `addr`
    fn erase_sector_size(&self, addr: u32) -> Result<u32>;

    /// Whether a session is open
    fn busy(&self) -> bool;

    /// Select the flash algorithm for `addr`
    fn set(&mut self, _addr: u32) -> Result<()> {
        Ok(())
    }
}
