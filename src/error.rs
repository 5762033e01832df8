//! Error types for the pngine library.

use std::fmt;

/// Result type alias for pngine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during PNG encoding, decoding, or the
/// compression layers underneath them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input buffer is empty.
    EmptyInput,
    /// The input is shorter than the smallest possible PNG file.
    FileTooShort,
    /// The first 8 bytes are not the PNG signature.
    BadSignature,
    /// The IHDR chunk does not carry exactly 13 bytes of data.
    BadIhdrSize(usize),
    /// The first chunk after the signature is not IHDR.
    FirstChunkNotIhdr,
    /// A chunk claims more data than the buffer holds.
    ChunkOverrunsBuffer,
    /// A chunk length does not fit in 31 bits.
    ChunkTooLarge,
    /// A chunk's stored CRC does not match its contents.
    CrcMismatch,

    /// The color type / bit depth combination is not allowed by PNG.
    IllegalColorMode {
        /// Numeric PNG color type.
        colortype: u8,
        /// Bit depth per channel.
        bitdepth: u32,
    },
    /// IHDR compression method is not 0.
    IllegalCompressionMethod(u8),
    /// IHDR filter method is not 0.
    IllegalFilterMethod(u8),
    /// IHDR interlace method is not 0 or 1.
    IllegalInterlaceMethod(u8),
    /// Width or height is zero.
    ZeroDimension,
    /// The pixel count exceeds the supported maximum.
    TooManyPixels,

    /// Input ended while decoding a Huffman symbol.
    HuffmanOutOfInput,
    /// A Huffman decode step jumped outside the code tree.
    HuffmanJumpOutsideTree,
    /// The code-length vector describes an oversubscribed tree.
    HuffmanOversubscribed,
    /// A dynamic block declares code counts or symbols outside the
    /// valid range.
    DynamicTreeBitsOutOfRange,
    /// Repeat code 16 appeared before any code length was read.
    DynamicTreeRepeatWithoutPrev,
    /// Repeat codes produced more code lengths than the tree declares.
    DynamicTreeOverflow,
    /// The end-of-block symbol 256 was assigned length zero.
    EmptyEndCode,
    /// A distance symbol greater than 29 was decoded.
    InvalidDistanceCode,
    /// A back-reference points before the start of the output.
    DistanceTooFarBack,
    /// A literal/length symbol outside the valid alphabet was decoded.
    InvalidSymbol,
    /// Reserved DEFLATE block type 3 was encountered.
    InvalidBlockType,
    /// Stored-block NLEN is not the ones' complement of LEN.
    NlenMismatch,
    /// Input ended in the middle of a DEFLATE block.
    InflateOutOfInput,

    /// The zlib stream is too small to contain header and trailer.
    ZlibTooSmall,
    /// The zlib header FCHECK value is wrong.
    BadFcheck,
    /// The zlib compression method or window info is unsupported.
    UnsupportedCmCinfo,
    /// The zlib stream declares a preset dictionary.
    PresetDictNotAllowed,
    /// The Adler-32 of the decompressed data does not match the trailer.
    AdlerMismatch {
        /// Checksum stored in the stream.
        stored: u32,
        /// Checksum computed over the output.
        computed: u32,
    },

    /// The alphabet cannot be represented within the maximum code length.
    AlphabetTooLarge,
    /// The LZ77 window size is outside 1..=32768.
    WindowOutOfRange(usize),
    /// The LZ77 window size is not a power of two.
    WindowNotPowerOfTwo(usize),
    /// An LZ77 match offset exceeds the window size.
    Lz77InvalidOffset,
    /// Lazy matching produced a pending match at stream position zero.
    Lz77LazyAtStart,

    /// A PLTE chunk holds more than 256 entries or a partial entry.
    PaletteTooBig,
    /// The tRNS chunk size does not match the color type.
    TrnsWrongSize,
    /// A tRNS chunk appeared for a color type that has its own alpha.
    TrnsNotAllowed,
    /// The requested color conversion is not supported.
    UnsupportedConversion,
    /// A pixel color does not occur in the target palette.
    ColorNotInPalette,

    /// The palette for encoding has 0 or more than 256 entries.
    PaletteSizeInvalid(usize),
    /// The interlace mode for encoding is not 0 or 1.
    BadInterlaceMode(u32),
    /// A scanline carries a filter type byte greater than 4.
    IllegalFilterType(u8),
    /// Pixel data length doesn't match the dimensions and color mode.
    InvalidDataLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes provided.
        actual: usize,
    },

    /// A buffer size computation overflowed.
    OutOfMemory,

    /// The decompressed IDAT size does not match the IHDR prediction.
    DecompressedSizeMismatch {
        /// Size predicted from the header.
        expected: usize,
        /// Size actually decompressed.
        actual: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "the given data is empty"),
            Error::FileTooShort => {
                write!(f, "the data length is smaller than a PNG header")
            }
            Error::BadSignature => write!(f, "incorrect PNG signature"),
            Error::BadIhdrSize(len) => {
                write!(f, "IHDR data must be 13 bytes, got {}", len)
            }
            Error::FirstChunkNotIhdr => {
                write!(f, "the file does not start with an IHDR chunk")
            }
            Error::ChunkOverrunsBuffer => {
                write!(f, "a chunk extends beyond the end of the data")
            }
            Error::ChunkTooLarge => {
                write!(f, "chunk length does not fit in 31 bits")
            }
            Error::CrcMismatch => write!(f, "chunk CRC does not match its contents"),
            Error::IllegalColorMode {
                colortype,
                bitdepth,
            } => write!(
                f,
                "color type {} with bit depth {} is not allowed",
                colortype, bitdepth
            ),
            Error::IllegalCompressionMethod(m) => {
                write!(f, "only compression method 0 is allowed, got {}", m)
            }
            Error::IllegalFilterMethod(m) => {
                write!(f, "only filter method 0 is allowed, got {}", m)
            }
            Error::IllegalInterlaceMethod(m) => {
                write!(f, "only interlace methods 0 and 1 exist, got {}", m)
            }
            Error::ZeroDimension => write!(f, "image width and height must be nonzero"),
            Error::TooManyPixels => write!(f, "image has more pixels than supported"),
            Error::HuffmanOutOfInput => {
                write!(f, "input ended while reading a Huffman symbol")
            }
            Error::HuffmanJumpOutsideTree => {
                write!(f, "Huffman decoding jumped outside the code tree")
            }
            Error::HuffmanOversubscribed => {
                write!(f, "code lengths describe an oversubscribed Huffman tree")
            }
            Error::DynamicTreeBitsOutOfRange => {
                write!(f, "dynamic block declares invalid code counts or symbols")
            }
            Error::DynamicTreeRepeatWithoutPrev => {
                write!(f, "repeat code without a previous code length")
            }
            Error::DynamicTreeOverflow => {
                write!(f, "repeat code produces too many code lengths")
            }
            Error::EmptyEndCode => {
                write!(f, "the end code 256 must have a nonzero code length")
            }
            Error::InvalidDistanceCode => write!(f, "invalid distance code (must be 0-29)"),
            Error::DistanceTooFarBack => {
                write!(f, "back-reference distance exceeds the output so far")
            }
            Error::InvalidSymbol => write!(f, "invalid literal/length symbol"),
            Error::InvalidBlockType => write!(f, "invalid DEFLATE block type 3"),
            Error::NlenMismatch => {
                write!(f, "NLEN is not the ones' complement of LEN")
            }
            Error::InflateOutOfInput => {
                write!(f, "input ended in the middle of a DEFLATE block")
            }
            Error::ZlibTooSmall => {
                write!(f, "zlib data is too small to hold header and checksum")
            }
            Error::BadFcheck => write!(f, "zlib header FCHECK is invalid"),
            Error::UnsupportedCmCinfo => {
                write!(f, "zlib compression method or window size unsupported")
            }
            Error::PresetDictNotAllowed => {
                write!(f, "zlib preset dictionaries are not supported")
            }
            Error::AdlerMismatch { stored, computed } => write!(
                f,
                "Adler-32 mismatch: stored {:08X}, computed {:08X}",
                stored, computed
            ),
            Error::AlphabetTooLarge => {
                write!(f, "alphabet too large for the maximum code length")
            }
            Error::WindowOutOfRange(w) => {
                write!(f, "window size {} is outside 1..=32768", w)
            }
            Error::WindowNotPowerOfTwo(w) => {
                write!(f, "window size {} is not a power of two", w)
            }
            Error::Lz77InvalidOffset => {
                write!(f, "LZ77 match offset exceeds the window size")
            }
            Error::Lz77LazyAtStart => {
                write!(f, "lazy matching at stream position zero")
            }
            Error::PaletteTooBig => {
                write!(f, "palette chunk is malformed or exceeds 256 entries")
            }
            Error::TrnsWrongSize => {
                write!(f, "tRNS chunk has the wrong size for this color type")
            }
            Error::TrnsNotAllowed => {
                write!(f, "tRNS chunk not allowed for color types with alpha")
            }
            Error::UnsupportedConversion => {
                write!(f, "color conversion to the requested mode is unsupported")
            }
            Error::ColorNotInPalette => {
                write!(f, "a pixel color does not occur in the palette")
            }
            Error::PaletteSizeInvalid(n) => {
                write!(f, "palette must have 1-256 entries, got {}", n)
            }
            Error::BadInterlaceMode(m) => {
                write!(f, "interlace mode must be 0 or 1, got {}", m)
            }
            Error::IllegalFilterType(t) => {
                write!(f, "scanline filter type {} does not exist", t)
            }
            Error::InvalidDataLength { expected, actual } => write!(
                f,
                "invalid pixel data length: expected {} bytes, got {}",
                expected, actual
            ),
            Error::OutOfMemory => write!(f, "buffer size computation overflowed"),
            Error::DecompressedSizeMismatch { expected, actual } => write!(
                f,
                "decompressed IDAT size {} does not match predicted {}",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for Error {}
