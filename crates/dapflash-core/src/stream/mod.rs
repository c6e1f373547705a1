//! Image stream decoding
//!
//! A [`Stream`] turns an image file arriving in arbitrary blocks into write
//! requests for a [`FlashManager`]. The image type is decided from the first
//! block with [`identify`].
//!
//! # Example
//!
//! ```ignore
//! let kind = stream::identify(&board.target, &settings, first_block)
//!     .ok_or(Error::UnknownStream)?;
//! let mut stream = Stream::new(engine, &settings, &board.target);
//! stream.open(kind)?;
//! for block in image.chunks(512) {
//!     if stream.write(block)? == StreamStatus::Done {
//!         break;
//!     }
//! }
//! stream.close()?;
//! ```

mod bin;
mod hex;

pub use bin::{is_vector_table, BinDecoder, VECTOR_TABLE_CHECK_SIZE};
pub use hex::{is_hex_record, HexDecoder, HexStatus};

use crate::error::{Error, Result};
use crate::flash::{FlashIntf, FlashManager};
use crate::settings::{EraseMode, Settings};
use crate::target::TargetConfig;

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// Raw binary placed at the start of flash
    Bin,
    /// Intel HEX
    Hex,
}

/// Result of a successful [`Stream::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// More data is expected
    Continue,
    /// The image is complete; further data is ignored
    Done,
    /// The image may be complete; the format cannot tell
    DoneOrContinue,
}

/// Decide the image format from its first block
///
/// Intel HEX is recognised by its first record. A binary must start with a
/// vector table that fits `target`, unless incompatible target detection is
/// disabled in `settings`.
pub fn identify(target: &TargetConfig, settings: &Settings, data: &[u8]) -> Option<StreamType> {
    if is_hex_record(data) {
        return Some(StreamType::Hex);
    }
    if is_vector_table(target, data) || !settings.detect_incompatible_target {
        return Some(StreamType::Bin);
    }
    log::warn!("Image does not match the target");
    None
}

enum Decoder {
    Bin(BinDecoder),
    Hex(HexDecoder),
}

/// An image being programmed
pub struct Stream<I> {
    manager: FlashManager<I>,
    erase_mode: EraseMode,
    bin_base: u32,
    decoder: Option<Decoder>,
}

impl<I: FlashIntf> Stream<I> {
    /// Create a closed stream programming through `intf`
    ///
    /// Binary images are placed at the start of the first flash region of
    /// `target`.
    pub fn new(intf: I, settings: &Settings, target: &TargetConfig) -> Self {
        Self {
            manager: FlashManager::new(intf),
            erase_mode: settings.erase_mode,
            bin_base: target.flash_regions.first().map_or(0, |r| r.start),
            decoder: None,
        }
    }

    /// Get a reference to the flash manager
    pub fn manager(&self) -> &FlashManager<I> {
        &self.manager
    }

    /// Consume the stream and return the flash interface
    pub fn into_inner(self) -> I {
        self.manager.into_inner()
    }

    /// Whether the stream is open
    pub fn is_open(&self) -> bool {
        self.decoder.is_some()
    }

    /// Open the stream and the flash session behind it
    pub fn open(&mut self, kind: StreamType) -> Result<()> {
        log::debug!("stream open({:?})", kind);
        if self.decoder.is_some() {
            return Err(Error::Internal);
        }

        self.manager.init(self.erase_mode)?;
        self.decoder = Some(match kind {
            StreamType::Bin => Decoder::Bin(BinDecoder::new(self.bin_base)),
            StreamType::Hex => Decoder::Hex(HexDecoder::new()),
        });
        Ok(())
    }

    /// Decode `data` and queue it for programming
    pub fn write(&mut self, data: &[u8]) -> Result<StreamStatus> {
        let manager = &mut self.manager;
        match self.decoder.as_mut() {
            None => Err(Error::StreamNotOpen),
            Some(Decoder::Bin(bin)) => {
                let addr = bin.advance(data.len());
                manager.data(addr, data)?;
                Ok(StreamStatus::DoneOrContinue)
            }
            Some(Decoder::Hex(hex)) => {
                match hex.feed(data, |addr, bytes| manager.data(addr, bytes))? {
                    HexStatus::Continue => Ok(StreamStatus::Continue),
                    HexStatus::Done => Ok(StreamStatus::Done),
                }
            }
        }
    }

    /// Finish programming and close the flash session
    pub fn close(&mut self) -> Result<()> {
        log::debug!("stream close()");
        if self.decoder.take().is_none() {
            return Err(Error::StreamNotOpen);
        }
        self.manager.uninit()
    }
}
