//! PNG encoding: state types and the encode pipeline.
//!
//! Encoding runs raw pixels through auto color selection, conversion,
//! optional Adam7 interlacing, scanline filtering, zlib compression,
//! and chunk framing.

pub mod adam7;
pub mod chunk;
pub mod filter;

use crate::color::profile::auto_choose_color;
use crate::color::{convert::convert, ColorMode, ColorType};
use crate::compress::{zlib_compress, CompressSettings};
use crate::decode::inflate::DecompressSettings;
use crate::error::{Error, Result};
use filter::FilterStrategy;

/// PNG file signature (magic bytes).
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Maximum number of pixels in an image, bounding all buffer sizes.
pub(crate) const MAX_PIXELS: u64 = 268_435_455;

/// Compressed IDAT data is split into chunks of at most this size.
const IDAT_CHUNK_SIZE: usize = 256 * 1024;

/// Properties of a PNG file: its color mode and interlace method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngInfo {
    /// The pixel format stored in the file.
    pub color: ColorMode,
    /// Interlace method: 0 = none, 1 = Adam7.
    pub interlace: u32,
}

impl Default for PngInfo {
    fn default() -> Self {
        Self {
            color: ColorMode::rgba8(),
            interlace: 0,
        }
    }
}

/// Settings steering the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Pick the smallest lossless color mode automatically; when off,
    /// the mode in `State::info_png` is used as-is.
    pub auto_convert: bool,
    /// Force filter type 0 for palette and sub-byte images (the PNG
    /// standard's recommendation).
    pub filter_palette_zero: bool,
    /// Per-row filter selection heuristic.
    pub filter_strategy: FilterStrategy,
    /// Also write a PLTE chunk for RGB/RGBA output.
    pub force_palette: bool,
    /// Settings for the zlib compression of the pixel data.
    pub zlib: CompressSettings,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            auto_convert: true,
            filter_palette_zero: true,
            filter_strategy: FilterStrategy::Minsum,
            force_palette: false,
            zlib: CompressSettings::default(),
        }
    }
}

/// Settings steering the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderSettings {
    /// Convert decoded pixels to `State::info_raw`; when off, pixels
    /// keep the PNG's own mode (reported back via `info_raw`).
    pub color_convert: bool,
    /// Settings for the zlib decompression of the pixel data.
    pub zlib: DecompressSettings,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            color_convert: true,
            zlib: DecompressSettings::default(),
        }
    }
}

/// Encoder/decoder state: the raw-buffer mode, the PNG-file mode, and
/// the settings for both directions.
#[derive(Debug, Clone, Default)]
pub struct State {
    /// Pixel format of the raw buffer on the caller's side.
    pub info_raw: ColorMode,
    /// Properties of the PNG file side.
    pub info_png: PngInfo,
    /// Encoder settings.
    pub encoder: EncoderSettings,
    /// Decoder settings.
    pub decoder: DecoderSettings,
}

impl State {
    /// A state with all defaults (RGBA8 raw buffer, color conversion on).
    pub fn new() -> Self {
        Self::default()
    }
}

/// Validate dimensions against the supported pixel count.
pub(crate) fn check_dimensions(w: u32, h: u32) -> Result<()> {
    if w == 0 || h == 0 {
        return Err(Error::ZeroDimension);
    }
    if w as u64 * h as u64 > MAX_PIXELS {
        return Err(Error::TooManyPixels);
    }
    Ok(())
}

/// Encode raw pixels as a PNG byte stream, using `state.info_raw` as
/// the input description.
pub fn encode_with_state(image: &[u8], w: u32, h: u32, state: &State) -> Result<Vec<u8>> {
    let info_png = &state.info_png;
    let settings = &state.encoder;

    if info_png.color.colortype == ColorType::Palette || settings.force_palette {
        let n = info_png.color.palette().len();
        if n == 0 || n > 256 {
            return Err(Error::PaletteSizeInvalid(n));
        }
    }
    if info_png.interlace > 1 {
        return Err(Error::BadInterlaceMode(info_png.interlace));
    }
    info_png.color.check_validity()?;
    state.info_raw.check_validity()?;
    check_dimensions(w, h)?;

    let expected = state.info_raw.raw_size(w, h);
    if image.len() != expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: image.len(),
        });
    }

    let mut color = if settings.auto_convert {
        auto_choose_color(image, w, h, &state.info_raw)?
    } else {
        info_png.color.clone()
    };
    if settings.force_palette
        && matches!(color.colortype, ColorType::Rgb | ColorType::Rgba)
        && color.palette().is_empty()
    {
        color.set_palette(info_png.color.palette())?;
    }

    let converted;
    let pixels: &[u8] = if state.info_raw != color {
        converted = convert(image, &state.info_raw, &color, w, h)?;
        &converted
    } else {
        image
    };

    let scanlines = pre_process_scanlines(pixels, w, h, &color, info_png.interlace, settings);
    let compressed = zlib_compress(&scanlines, &settings.zlib)?;

    let mut out = Vec::with_capacity(compressed.len() + 256);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_ihdr(&mut out, w, h, &color, info_png.interlace);
    if color.colortype == ColorType::Palette
        || (settings.force_palette
            && matches!(color.colortype, ColorType::Rgb | ColorType::Rgba))
    {
        write_plte(&mut out, &color);
    }
    write_trns(&mut out, &color);
    for idat in compressed.chunks(IDAT_CHUNK_SIZE) {
        chunk::write_chunk(&mut out, b"IDAT", idat);
    }
    chunk::write_chunk(&mut out, b"IEND", &[]);

    Ok(out)
}

/// Encode raw pixels given their color type and bit depth; the output
/// mode is chosen automatically.
pub fn encode(
    image: &[u8],
    w: u32,
    h: u32,
    colortype: ColorType,
    bitdepth: u32,
) -> Result<Vec<u8>> {
    let mut state = State::new();
    state.info_raw = ColorMode::new(colortype, bitdepth)?;
    state.info_png.color = ColorMode::new(colortype, bitdepth)?;
    encode_with_state(image, w, h, &state)
}

/// Encode an RGBA8 buffer.
pub fn encode32(image: &[u8], w: u32, h: u32) -> Result<Vec<u8>> {
    encode(image, w, h, ColorType::Rgba, 8)
}

/// Interlace (if requested), pad, and filter the pixel data into the
/// in-IDAT scanline layout.
fn pre_process_scanlines(
    pixels: &[u8],
    w: u32,
    h: u32,
    color: &ColorMode,
    interlace: u32,
    settings: &EncoderSettings,
) -> Vec<u8> {
    let bpp = color.bpp();
    let strategy = if settings.filter_palette_zero
        && (color.colortype == ColorType::Palette || color.bitdepth < 8)
    {
        FilterStrategy::Zero
    } else {
        settings.filter_strategy
    };

    if interlace == 0 {
        filter_padded(pixels, w as usize, h as usize, bpp as usize, strategy)
    } else {
        let passes = adam7::get_pass_values(w, h, bpp);
        let mut reduced = vec![0u8; passes.start[7]];
        adam7::interlace(&mut reduced, pixels, w, h, bpp);

        let mut out = Vec::with_capacity(passes.filter_start[7]);
        for i in 0..7 {
            let pw = passes.w[i] as usize;
            let ph = passes.h[i] as usize;
            if pw == 0 || ph == 0 {
                continue;
            }
            let pass = &reduced[passes.start[i]..passes.start[i + 1]];
            out.extend_from_slice(&filter_padded(pass, pw, ph, bpp as usize, strategy));
        }
        out
    }
}

/// Pad scanlines to whole bytes if needed, then filter.
fn filter_padded(
    pixels: &[u8],
    w: usize,
    h: usize,
    bpp: usize,
    strategy: FilterStrategy,
) -> Vec<u8> {
    let linebytes = (w * bpp).div_ceil(8);
    if bpp < 8 && w * bpp != linebytes * 8 {
        let mut padded = vec![0u8; h * linebytes];
        adam7::add_padding_bits(&mut padded, pixels, linebytes * 8, w * bpp, h);
        filter::filter_image(&padded, h, linebytes, bpp, strategy)
    } else {
        filter::filter_image(pixels, h, linebytes, bpp, strategy)
    }
}

/// Write the IHDR chunk.
fn write_ihdr(out: &mut Vec<u8>, w: u32, h: u32, color: &ColorMode, interlace: u32) {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&w.to_be_bytes());
    data.extend_from_slice(&h.to_be_bytes());
    data.push(color.bitdepth as u8);
    data.push(color.colortype as u8);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(interlace as u8);
    chunk::write_chunk(out, b"IHDR", &data);
}

/// Write the PLTE chunk.
fn write_plte(out: &mut Vec<u8>, color: &ColorMode) {
    let mut data = Vec::with_capacity(color.palette().len() * 3);
    for entry in color.palette() {
        data.extend_from_slice(&entry[..3]);
    }
    chunk::write_chunk(out, b"PLTE", &data);
}

/// Write the tRNS chunk when the mode calls for one: per-entry palette
/// alpha (with the all-opaque tail trimmed), or the 2/6-byte color key.
fn write_trns(out: &mut Vec<u8>, color: &ColorMode) {
    match color.colortype {
        ColorType::Palette => {
            let palette = color.palette();
            // The trailing run of opaque entries need not be written.
            let mut amount = palette.len();
            while amount > 0 && palette[amount - 1][3] == 255 {
                amount -= 1;
            }
            if amount > 0 {
                let data: Vec<u8> = palette[..amount].iter().map(|p| p[3]).collect();
                chunk::write_chunk(out, b"tRNS", &data);
            }
        }
        ColorType::Grey => {
            if let Some((key_r, _, _)) = color.key {
                chunk::write_chunk(out, b"tRNS", &key_r.to_be_bytes());
            }
        }
        ColorType::Rgb => {
            if let Some((key_r, key_g, key_b)) = color.key {
                let mut data = Vec::with_capacity(6);
                data.extend_from_slice(&key_r.to_be_bytes());
                data.extend_from_slice(&key_g.to_be_bytes());
                data.extend_from_slice(&key_b.to_be_bytes());
                chunk::write_chunk(out, b"tRNS", &data);
            }
        }
        _ => {}
    }
}
