//! Length-prefix handling shared by the serial and replay paths
//!
//! The header is the only framing in the stream: once it is resolved every following byte
//! is payload.

use crate::error::{DumpError, Result};
use crate::protocol::HEADER_LEN;
use crate::source::{ChunkRead, ChunkSource};

/// Build the length header (4 bytes)
/// Format: LENGTH (4, little-endian)
pub fn build_length_header(payload_len: u32) -> [u8; HEADER_LEN] {
    payload_len.to_le_bytes()
}

/// Parse the length header
/// Returns: expected payload length in bytes
pub fn parse_length_header(header: &[u8; HEADER_LEN]) -> u32 {
    u32::from_le_bytes(*header)
}

/// Read exactly [`HEADER_LEN`] bytes from `source` and decode the expected payload length.
///
/// Each read is bounded by the source's timeout. A timeout, end of stream or fault before all
/// four bytes arrive is a framing error; the protocol has no way to ask for the header again.
pub fn read_header<S: ChunkSource + ?Sized>(source: &mut S) -> Result<u32> {
    let mut header = [0u8; HEADER_LEN];
    let mut got = 0;
    while got < HEADER_LEN {
        match source.read_chunk(&mut header[got..]) {
            ChunkRead::Data(n) => got += n,
            ChunkRead::Timeout => {
                return Err(DumpError::Framing {
                    got,
                    expected: HEADER_LEN,
                    cause: None,
                })
            }
            ChunkRead::Fault(e) => {
                return Err(DumpError::Framing {
                    got,
                    expected: HEADER_LEN,
                    cause: Some(e),
                })
            }
        }
    }
    Ok(parse_length_header(&header))
}
