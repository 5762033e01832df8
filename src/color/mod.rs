//! Color types, modes, and conversions.

pub mod convert;
pub mod profile;
pub mod tree;

use crate::error::{Error, Result};

/// PNG color types with their numeric chunk values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorType {
    /// Grayscale, 1 channel.
    Grey = 0,
    /// Red, green, blue: 3 channels.
    Rgb = 2,
    /// Palette indices, 1 channel.
    Palette = 3,
    /// Grayscale with alpha, 2 channels.
    GreyAlpha = 4,
    /// Red, green, blue, alpha: 4 channels.
    Rgba = 6,
}

impl ColorType {
    /// Number of channels (palette counts as one).
    #[inline]
    pub const fn channels(self) -> u32 {
        match self {
            ColorType::Grey | ColorType::Palette => 1,
            ColorType::GreyAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }

    /// Whether this type is grayscale (with or without alpha).
    #[inline]
    pub const fn is_greyscale(self) -> bool {
        matches!(self, ColorType::Grey | ColorType::GreyAlpha)
    }
}

impl TryFrom<u8> for ColorType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ColorType::Grey),
            2 => Ok(ColorType::Rgb),
            3 => Ok(ColorType::Palette),
            4 => Ok(ColorType::GreyAlpha),
            6 => Ok(ColorType::Rgba),
            other => Err(Error::IllegalColorMode {
                colortype: other,
                bitdepth: 0,
            }),
        }
    }
}

/// A complete pixel format description: color type, bit depth, and the
/// optional palette and color key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMode {
    /// The PNG color type.
    pub colortype: ColorType,
    /// Bits per channel (or per palette index).
    pub bitdepth: u32,
    /// RGBA palette entries; meaningful only for `ColorType::Palette`.
    palette: Vec<[u8; 4]>,
    /// Color key marking fully transparent pixels, at this mode's bit
    /// depth. Only valid for Grey and RGB.
    pub key: Option<(u16, u16, u16)>,
}

impl Default for ColorMode {
    fn default() -> Self {
        Self {
            colortype: ColorType::Rgba,
            bitdepth: 8,
            palette: Vec::new(),
            key: None,
        }
    }
}

impl ColorMode {
    /// Create a mode, validating the color type / bit depth pair.
    pub fn new(colortype: ColorType, bitdepth: u32) -> Result<Self> {
        check_color_validity(colortype, bitdepth)?;
        Ok(Self {
            colortype,
            bitdepth,
            palette: Vec::new(),
            key: None,
        })
    }

    /// 8-bit RGBA, the default working format.
    pub fn rgba8() -> Self {
        Self::default()
    }

    /// The palette entries.
    #[inline]
    pub fn palette(&self) -> &[[u8; 4]] {
        &self.palette
    }

    /// Append one palette entry. At most 256 fit.
    pub fn palette_add(&mut self, rgba: [u8; 4]) -> Result<()> {
        if self.palette.len() >= 256 {
            return Err(Error::PaletteTooBig);
        }
        self.palette.push(rgba);
        Ok(())
    }

    /// Remove all palette entries.
    pub fn palette_clear(&mut self) {
        self.palette.clear();
    }

    /// Replace the palette with `entries`.
    pub fn set_palette(&mut self, entries: &[[u8; 4]]) -> Result<()> {
        if entries.len() > 256 {
            return Err(Error::PaletteTooBig);
        }
        self.palette = entries.to_vec();
        Ok(())
    }

    /// Look up a palette entry; out-of-range indices read as opaque
    /// black, matching what PNG decoders conventionally do.
    #[inline]
    pub(crate) fn palette_or_black(&self, index: usize) -> [u8; 4] {
        self.palette.get(index).copied().unwrap_or([0, 0, 0, 255])
    }

    /// Bits per pixel for this mode.
    #[inline]
    pub fn bpp(&self) -> u32 {
        self.colortype.channels() * self.bitdepth
    }

    /// Whether any palette entry has alpha below 255.
    pub fn has_palette_alpha(&self) -> bool {
        self.palette.iter().any(|p| p[3] != 255)
    }

    /// Whether pixels in this mode can be non-opaque.
    pub fn can_have_alpha(&self) -> bool {
        matches!(self.colortype, ColorType::GreyAlpha | ColorType::Rgba)
            || self.key.is_some()
            || self.has_palette_alpha()
    }

    /// Byte size of a raw image in this mode (no scanline padding).
    pub fn raw_size(&self, w: u32, h: u32) -> usize {
        let bits = w as u64 * h as u64 * self.bpp() as u64;
        ((bits + 7) / 8) as usize
    }

    /// Validate this mode's color type / bit depth pair.
    pub fn check_validity(&self) -> Result<()> {
        check_color_validity(self.colortype, self.bitdepth)
    }
}

/// The valid `(colortype, bitdepth)` pairs of the PNG specification.
pub(crate) fn check_color_validity(colortype: ColorType, bitdepth: u32) -> Result<()> {
    let ok = match colortype {
        ColorType::Grey => matches!(bitdepth, 1 | 2 | 4 | 8 | 16),
        ColorType::Rgb | ColorType::GreyAlpha | ColorType::Rgba => matches!(bitdepth, 8 | 16),
        ColorType::Palette => matches!(bitdepth, 1 | 2 | 4 | 8),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::IllegalColorMode {
            colortype: colortype as u8,
            bitdepth,
        })
    }
}

/// Read one bit from an MSB-first bit stream (PNG pixel packing order,
/// the opposite of DEFLATE's).
#[inline]
pub(crate) fn read_bit_reversed(bitpointer: &mut usize, bitstream: &[u8]) -> u8 {
    let bit = (bitstream[*bitpointer >> 3] >> (7 - (*bitpointer & 7))) & 1;
    *bitpointer += 1;
    bit
}

/// Read `nbits` bits MSB-first.
#[inline]
pub(crate) fn read_bits_reversed(bitpointer: &mut usize, bitstream: &[u8], nbits: usize) -> u32 {
    let mut result = 0u32;
    for _ in 0..nbits {
        result = (result << 1) | read_bit_reversed(bitpointer, bitstream) as u32;
    }
    result
}

/// Set one bit in an MSB-first bit stream whose target bit is known to
/// be zero (freshly allocated buffers).
#[inline]
pub(crate) fn set_bit_reversed_zeroed(bitpointer: &mut usize, bitstream: &mut [u8], bit: u8) {
    if bit != 0 {
        bitstream[*bitpointer >> 3] |= 1 << (7 - (*bitpointer & 7));
    }
    *bitpointer += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels() {
        assert_eq!(ColorType::Grey.channels(), 1);
        assert_eq!(ColorType::Palette.channels(), 1);
        assert_eq!(ColorType::GreyAlpha.channels(), 2);
        assert_eq!(ColorType::Rgb.channels(), 3);
        assert_eq!(ColorType::Rgba.channels(), 4);
    }

    #[test]
    fn test_colortype_from_u8() {
        assert_eq!(ColorType::try_from(0).unwrap(), ColorType::Grey);
        assert_eq!(ColorType::try_from(2).unwrap(), ColorType::Rgb);
        assert_eq!(ColorType::try_from(3).unwrap(), ColorType::Palette);
        assert_eq!(ColorType::try_from(4).unwrap(), ColorType::GreyAlpha);
        assert_eq!(ColorType::try_from(6).unwrap(), ColorType::Rgba);
        assert!(ColorType::try_from(1).is_err());
        assert!(ColorType::try_from(5).is_err());
    }

    #[test]
    fn test_bitdepth_validity() {
        assert!(ColorMode::new(ColorType::Grey, 1).is_ok());
        assert!(ColorMode::new(ColorType::Grey, 16).is_ok());
        assert!(ColorMode::new(ColorType::Grey, 3).is_err());
        assert!(ColorMode::new(ColorType::Rgb, 8).is_ok());
        assert!(ColorMode::new(ColorType::Rgb, 4).is_err());
        assert!(ColorMode::new(ColorType::Palette, 8).is_ok());
        assert!(ColorMode::new(ColorType::Palette, 16).is_err());
        assert!(ColorMode::new(ColorType::Rgba, 16).is_ok());
        assert!(ColorMode::new(ColorType::Rgba, 2).is_err());
    }

    #[test]
    fn test_raw_size_rounds_up_bits() {
        let grey1 = ColorMode::new(ColorType::Grey, 1).unwrap();
        assert_eq!(grey1.raw_size(10, 1), 2); // 10 bits -> 2 bytes
        assert_eq!(grey1.raw_size(8, 3), 3);

        let rgba16 = ColorMode::new(ColorType::Rgba, 16).unwrap();
        assert_eq!(rgba16.raw_size(2, 2), 32);
    }

    #[test]
    fn test_palette_limit() {
        let mut mode = ColorMode::new(ColorType::Palette, 8).unwrap();
        for i in 0..256 {
            mode.palette_add([i as u8, 0, 0, 255]).unwrap();
        }
        assert_eq!(mode.palette_add([1, 2, 3, 255]), Err(Error::PaletteTooBig));
    }

    #[test]
    fn test_out_of_range_palette_reads_black() {
        let mut mode = ColorMode::new(ColorType::Palette, 8).unwrap();
        mode.palette_add([10, 20, 30, 40]).unwrap();
        assert_eq!(mode.palette_or_black(0), [10, 20, 30, 40]);
        assert_eq!(mode.palette_or_black(5), [0, 0, 0, 255]);
    }

    #[test]
    fn test_reversed_bit_io() {
        let data = [0b1010_0000u8];
        let mut bp = 0;
        assert_eq!(read_bit_reversed(&mut bp, &data), 1);
        assert_eq!(read_bit_reversed(&mut bp, &data), 0);
        assert_eq!(read_bit_reversed(&mut bp, &data), 1);

        let mut bp = 0;
        assert_eq!(read_bits_reversed(&mut bp, &data, 4), 0b1010);

        let mut out = [0u8; 1];
        let mut bp = 0;
        for bit in [1, 0, 1, 0] {
            set_bit_reversed_zeroed(&mut bp, &mut out, bit);
        }
        assert_eq!(out[0], 0b1010_0000);
    }
}
