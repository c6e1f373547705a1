//! Incremental Intel HEX decoder
//!
//! Records may be split across any number of `feed()` calls. Partial records
//! are kept in a fixed size line buffer until they are complete.
//!
//! Supported record types:
//!
//! | Type | Record                      |
//! |------|-----------------------------|
//! | 00   | Data                        |
//! | 01   | End of file                 |
//! | 02   | Extended segment address    |
//! | 03   | Start segment address       |
//! | 04   | Extended linear address     |
//! | 05   | Start linear address        |

use heapless::Vec;

use crate::error::{Error, Result};

/// Hex digits of the longest record after the colon
const MAX_RECORD_CHARS: usize = 2 * (1 + 2 + 1 + 255 + 1);
/// Bytes of the longest record
const MAX_RECORD_BYTES: usize = MAX_RECORD_CHARS / 2;

const RECORD_DATA: u8 = 0x00;
const RECORD_EOF: u8 = 0x01;
const RECORD_EXT_SEGMENT: u8 = 0x02;
const RECORD_START_SEGMENT: u8 = 0x03;
const RECORD_EXT_LINEAR: u8 = 0x04;
const RECORD_START_LINEAR: u8 = 0x05;

/// Check whether `data` starts with something that looks like an Intel HEX
/// record of a type a firmware image begins with
pub fn is_hex_record(data: &[u8]) -> bool {
    data.len() >= 9
        && data[0] == b':'
        && data[7] == b'0'
        && matches!(data[8], b'0' | b'2' | b'3' | b'4' | b'5')
}

/// Decoder progress after a `feed()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexStatus {
    /// More records expected
    Continue,
    /// End of file record seen
    Done,
}

/// Incremental Intel HEX decoder
#[derive(Debug, Default)]
pub struct HexDecoder {
    /// Hex digits of the record being assembled (without the colon)
    line: Vec<u8, MAX_RECORD_CHARS>,
    in_record: bool,
    base: u32,
    done: bool,
}

impl HexDecoder {
    /// Create a decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the end of file record has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode `data`, passing every data record to `sink` as
    /// `(absolute address, bytes)`
    ///
    /// Input after the end of file record is ignored.
    pub fn feed<F>(&mut self, data: &[u8], mut sink: F) -> Result<HexStatus>
    where
        F: FnMut(u32, &[u8]) -> Result<()>,
    {
        for &c in data {
            if self.done {
                break;
            }

            if !self.in_record {
                match c {
                    b':' => {
                        self.in_record = true;
                        self.line.clear();
                    }
                    b'\r' | b'\n' | b' ' | b'\t' => {}
                    _ => {
                        log::error!("Unexpected character 0x{:02X} between HEX records", c);
                        return Err(Error::HexParse);
                    }
                }
                continue;
            }

            if !c.is_ascii_hexdigit() {
                log::error!("Unexpected character 0x{:02X} in HEX record", c);
                return Err(Error::HexParse);
            }
            self.line.push(c).map_err(|_| Error::HexParse)?;

            if self.record_complete() {
                self.in_record = false;
                self.process_record(&mut sink)?;
            }
        }

        Ok(if self.done {
            HexStatus::Done
        } else {
            HexStatus::Continue
        })
    }

    /// The byte count field tells how long the record is
    fn record_complete(&self) -> bool {
        if self.line.len() < 2 {
            return false;
        }
        let count = (hex_value(self.line[0]) << 4 | hex_value(self.line[1])) as usize;
        self.line.len() == 2 * (1 + 2 + 1 + count + 1)
    }

    fn process_record<F>(&mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(u32, &[u8]) -> Result<()>,
    {
        let mut record: Vec<u8, MAX_RECORD_BYTES> = Vec::new();
        for pair in self.line.chunks(2) {
            let byte = hex_value(pair[0]) << 4 | hex_value(pair[1]);
            record.push(byte).map_err(|_| Error::HexParse)?;
        }

        let checksum = record.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if checksum != 0 {
            log::error!("HEX record checksum mismatch");
            return Err(Error::HexChecksum);
        }

        let count = record[0] as usize;
        let offset = u16::from_be_bytes([record[1], record[2]]);
        let payload = &record[4..4 + count];

        match record[3] {
            RECORD_DATA => {
                let addr = self.base.wrapping_add(offset as u32);
                log::trace!("HEX data 0x{:08X} ({} bytes)", addr, count);
                sink(addr, payload)?;
            }
            RECORD_EOF => {
                log::debug!("HEX end of file");
                self.done = true;
            }
            RECORD_EXT_SEGMENT if count == 2 => {
                self.base = (u16::from_be_bytes([payload[0], payload[1]]) as u32) << 4;
            }
            RECORD_EXT_LINEAR if count == 2 => {
                self.base = (u16::from_be_bytes([payload[0], payload[1]]) as u32) << 16;
            }
            RECORD_START_SEGMENT | RECORD_START_LINEAR if count == 4 => {}
            other => {
                log::error!("Unsupported HEX record type {:02X} ({} bytes)", other, count);
                return Err(Error::HexParse);
            }
        }

        Ok(())
    }
}

/// Value of an ASCII hex digit already checked with `is_ascii_hexdigit`
fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn decode(chunks: &[&[u8]]) -> (Result<HexStatus>, Vec<(u32, Vec<u8>)>) {
        let mut decoder = HexDecoder::new();
        let mut out = Vec::new();
        let mut status = Ok(HexStatus::Continue);
        for chunk in chunks {
            status = decoder.feed(chunk, |addr, data| {
                out.push((addr, data.to_vec()));
                Ok(())
            });
            if status.is_err() {
                break;
            }
        }
        (status, out)
    }

    const IMAGE: &[u8] = b":020000040800F2\r\n\
:10000000000102030405060708090A0B0C0D0E0F78\r\n\
:04000005080000ED02\r\n\
:00000001FF\r\n";

    #[test]
    fn test_identify() {
        assert!(is_hex_record(IMAGE));
        assert!(is_hex_record(b":10000000000102030405060708090A0B0C0D0E0F78"));
        assert!(!is_hex_record(b":00000001FF\r\n"));
        assert!(!is_hex_record(&[0x00, 0x10, 0x00, 0x20, 0x41, 0x01, 0x00, 0x00, 0x43]));
        assert!(!is_hex_record(b":1000"));
    }

    #[test]
    fn test_decode_image() {
        let (status, out) = decode(&[IMAGE]);
        assert_eq!(status, Ok(HexStatus::Done));
        assert_eq!(out, vec![(0x0800_0000, (0u8..16).collect::<Vec<u8>>())]);
    }

    #[test]
    fn test_split_anywhere() {
        let (_, whole) = decode(&[IMAGE]);
        for split in 1..IMAGE.len() {
            let (status, out) = decode(&[&IMAGE[..split], &IMAGE[split..]]);
            assert_eq!(status, Ok(HexStatus::Done), "split at {}", split);
            assert_eq!(out, whole, "split at {}", split);
        }
    }

    #[test]
    fn test_partial_record_continues() {
        let mut decoder = HexDecoder::new();
        let status = decoder.feed(b":10000000000102", |_, _| Ok(())).unwrap();
        assert_eq!(status, HexStatus::Continue);
    }

    #[test]
    fn test_eof_without_newline() {
        let (status, _) = decode(&[b":00000001FF"]);
        assert_eq!(status, Ok(HexStatus::Done));
    }

    #[test]
    fn test_data_after_eof_ignored() {
        let (status, out) = decode(&[b":00000001FF\r\n:0400000001020304F2\r\n"]);
        assert_eq!(status, Ok(HexStatus::Done));
        assert!(out.is_empty());
    }

    #[test]
    fn test_segment_address() {
        let (status, out) = decode(&[b":020000021000EC\n:0100100055", b"9A\n"]);
        assert_eq!(status, Ok(HexStatus::Continue));
        assert_eq!(out, vec![(0x10010, vec![0x55])]);
    }

    #[test]
    fn test_checksum_error() {
        let (status, out) = decode(&[b":10000000000102030405060708090A0B0C0D0E0F79\r\n"]);
        assert_eq!(status, Err(Error::HexChecksum));
        assert!(out.is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(decode(&[b"garbage"]).0, Err(Error::HexParse));
        assert_eq!(decode(&[b":10zz"]).0, Err(Error::HexParse));
        // Unknown record type 06
        assert_eq!(decode(&[b":00000006FA\n"]).0, Err(Error::HexParse));
    }

    #[test]
    fn test_sink_error_propagates() {
        let mut decoder = HexDecoder::new();
        let result = decoder.feed(IMAGE, |_, _| Err(Error::AlgoMissing));
        assert_eq!(result, Err(Error::AlgoMissing));
    }
}
