//! Compression: checksums, Huffman codes, LZ77, DEFLATE, zlib.

pub mod adler32;
pub mod crc32;
pub mod deflate;
pub mod huffman;
pub mod lz77;
pub mod package_merge;

pub use adler32::adler32;
pub use crc32::crc32;
pub use deflate::{deflate, zlib_compress};

/// Settings for the DEFLATE encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressSettings {
    /// LZ77 window size, a power of two up to 32768.
    pub windowsize: usize,
    /// Matches shorter than this are emitted as literals.
    pub minmatch: usize,
    /// Stop searching the hash chain once a match of this length is
    /// found (capped at 258).
    pub nicematch: usize,
    /// Defer a match by one byte when the next position matches longer.
    pub lazymatching: bool,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            windowsize: 2048,
            minmatch: 3,
            nicematch: 128,
            lazymatching: true,
        }
    }
}
