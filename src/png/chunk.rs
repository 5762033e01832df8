//! PNG chunk framing: `length (4 BE) || type (4) || data || crc (4 BE)`.
//!
//! The CRC covers the type and data bytes, not the length.

use crate::compress::crc32::{crc32, Crc32};
use crate::error::{Error, Result};

/// Largest chunk length representable in the format (31 bits).
const MAX_CHUNK_LENGTH: usize = 0x7FFF_FFFF;

/// Append one chunk to the output buffer.
pub fn write_chunk(output: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    debug_assert!(data.len() <= MAX_CHUNK_LENGTH);
    output.reserve(12 + data.len());

    let mut crc = Crc32::new();
    crc.update(chunk_type);
    crc.update(data);
    let crc = crc.finalize();

    output.extend_from_slice(&(data.len() as u32).to_be_bytes());
    output.extend_from_slice(chunk_type);
    output.extend_from_slice(data);
    output.extend_from_slice(&crc.to_be_bytes());
}

/// One chunk borrowed from a PNG buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawChunk<'a> {
    /// The four type bytes.
    pub chunk_type: [u8; 4],
    /// The chunk payload.
    pub data: &'a [u8],
    /// The stored CRC (over type and data).
    pub crc: u32,
}

impl RawChunk<'_> {
    /// Whether the stored CRC matches the chunk contents.
    pub fn crc_ok(&self) -> bool {
        let mut crc = Crc32::new();
        crc.update(&self.chunk_type);
        crc.update(self.data);
        crc.finalize() == self.crc
    }

    /// Whether this is an ancillary (non-critical) chunk.
    pub fn is_ancillary(&self) -> bool {
        self.chunk_type[0] & 0x20 != 0
    }
}

/// Iterator over consecutive chunks in a buffer.
///
/// Yields an error when a chunk overruns the buffer or declares a
/// length beyond 31 bits; iteration ends after IEND or at the end of
/// the buffer.
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> ChunkIter<'a> {
    /// Iterate over the chunks of `data`, which must start at a chunk
    /// boundary (i.e. after the 8-byte signature).
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<RawChunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.data.len() {
            return None;
        }
        if self.pos + 12 > self.data.len() {
            self.done = true;
            return Some(Err(Error::ChunkOverrunsBuffer));
        }

        let length = u32::from_be_bytes(
            self.data[self.pos..self.pos + 4].try_into().unwrap(),
        ) as usize;
        if length > MAX_CHUNK_LENGTH {
            self.done = true;
            return Some(Err(Error::ChunkTooLarge));
        }
        if self.pos + 12 + length > self.data.len() {
            self.done = true;
            return Some(Err(Error::ChunkOverrunsBuffer));
        }

        let chunk_type: [u8; 4] = self.data[self.pos + 4..self.pos + 8].try_into().unwrap();
        let data = &self.data[self.pos + 8..self.pos + 8 + length];
        let crc = u32::from_be_bytes(
            self.data[self.pos + 8 + length..self.pos + 12 + length]
                .try_into()
                .unwrap(),
        );

        self.pos += 12 + length;
        if &chunk_type == b"IEND" {
            self.done = true;
        }

        Some(Ok(RawChunk {
            chunk_type,
            data,
            crc,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_iend_chunk() {
        let mut output = Vec::new();
        write_chunk(&mut output, b"IEND", &[]);

        assert_eq!(output.len(), 12);
        assert_eq!(&output[0..4], &[0, 0, 0, 0]);
        assert_eq!(&output[4..8], b"IEND");
        assert_eq!(&output[8..12], &0xAE426082_u32.to_be_bytes());
    }

    #[test]
    fn test_write_chunk_with_data() {
        let mut output = Vec::new();
        write_chunk(&mut output, b"tEXt", b"hello");

        assert_eq!(output.len(), 17);
        assert_eq!(&output[0..4], &[0, 0, 0, 5]);
        assert_eq!(&output[4..8], b"tEXt");
        assert_eq!(&output[8..13], b"hello");
        assert_eq!(crc32(b"tEXthello").to_be_bytes(), output[13..17]);
    }

    #[test]
    fn test_iterate_chunks() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"aaaa", &[1, 2, 3]);
        write_chunk(&mut buf, b"bbbb", &[]);
        write_chunk(&mut buf, b"IEND", &[]);
        // Trailing garbage after IEND is not iterated.
        buf.extend_from_slice(&[0xDE, 0xAD]);

        let chunks: Vec<_> = ChunkIter::new(&buf).collect::<Result<_>>().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[0].chunk_type, b"aaaa");
        assert_eq!(chunks[0].data, &[1, 2, 3]);
        assert!(chunks[0].crc_ok());
        assert_eq!(&chunks[1].chunk_type, b"bbbb");
        assert_eq!(&chunks[2].chunk_type, b"IEND");
    }

    #[test]
    fn test_truncated_chunk_errors() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"aaaa", &[1, 2, 3]);
        buf.truncate(buf.len() - 1);

        let result: Result<Vec<_>> = ChunkIter::new(&buf).collect();
        assert_eq!(result.err(), Some(Error::ChunkOverrunsBuffer));
    }

    #[test]
    fn test_corrupt_crc_detected() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"aaaa", &[1, 2, 3]);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;

        let chunk = ChunkIter::new(&buf).next().unwrap().unwrap();
        assert!(!chunk.crc_ok());
    }

    #[test]
    fn test_ancillary_flag() {
        let critical = RawChunk {
            chunk_type: *b"IDAT",
            data: &[],
            crc: 0,
        };
        let ancillary = RawChunk {
            chunk_type: *b"tEXt",
            data: &[],
            crc: 0,
        };
        assert!(!critical.is_ancillary());
        assert!(ancillary.is_ancillary());
    }
}
