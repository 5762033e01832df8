//! # pngine
//!
//! A self-contained PNG encoder and decoder. All compression machinery
//! lives in this crate: DEFLATE/INFLATE with hash-chain LZ77 and
//! Package-Merge Huffman construction, Adler-32 and CRC-32 checksums,
//! PNG scanline filters, Adam7 interlacing, and conversion between all
//! PNG color modes including automatic selection of the smallest
//! lossless one.
//!
//! ## Example
//!
//! ```rust
//! use pngine::{decode32, encode32};
//!
//! let pixels: Vec<u8> = vec![255, 0, 0, 255]; // 1x1 red RGBA pixel
//! let png = encode32(&pixels, 1, 1).unwrap();
//!
//! let image = decode32(&png).unwrap();
//! assert_eq!(image.pixels, pixels);
//! ```
//!
//! The `encode`/`decode` pair works on any supported color mode, and
//! [`State`] exposes the full set of encoder and decoder settings. The
//! compression layers ([`compress`], [`decode`]) and the color
//! converter ([`convert`]) are usable standalone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bits;
pub mod color;
pub mod compress;
pub mod decode;
pub mod error;
pub mod png;

pub use color::convert::convert;
pub use color::profile::{auto_choose_color, compute_profile, ColorProfile};
pub use color::{ColorMode, ColorType};
pub use compress::CompressSettings;
pub use decode::{decode, decode32, decode_with_state, inspect, DecompressSettings, RawImage};
pub use error::{Error, Result};
pub use png::{
    encode, encode32, encode_with_state, DecoderSettings, EncoderSettings, PngInfo, State,
};
pub use png::filter::FilterStrategy;
