//! Decoding: bit reading, INFLATE, zlib, and the PNG decode pipeline.

pub mod bit_reader;
pub mod inflate;
pub mod png;

pub use inflate::{inflate, zlib_decompress, DecompressSettings};
pub use png::{decode, decode32, decode_with_state, inspect, RawImage};
