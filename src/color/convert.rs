//! Pixel format conversion between any two supported color modes.
//!
//! Everything funnels through RGBA: when both sides are 16-bit the
//! intermediate is RGBA16 so no precision is lost, otherwise RGBA8.
//! Same-mode conversions degenerate to a copy, and RGBA8/RGB8 outputs
//! take a bulk path.

use super::tree::ColorTree;
use super::{read_bits_reversed, ColorMode, ColorType};
use crate::error::{Error, Result};

/// Convert a raw buffer from `mode_in` to `mode_out`.
///
/// Converting into a palette mode requires every pixel color to occur
/// in the target palette; when `mode_out` has no palette of its own the
/// input's palette is used.
pub fn convert(
    input: &[u8],
    mode_in: &ColorMode,
    mode_out: &ColorMode,
    w: u32,
    h: u32,
) -> Result<Vec<u8>> {
    let numpixels = w as usize * h as usize;

    let expected = mode_in.raw_size(w, h);
    if input.len() < expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: input.len(),
        });
    }

    if mode_in == mode_out {
        return Ok(input[..expected].to_vec());
    }

    let mut out = vec![0u8; mode_out.raw_size(w, h)];

    // Set up the palette index lookup when writing palette pixels.
    let mut tree = None;
    if mode_out.colortype == ColorType::Palette {
        let mut palette = mode_out.palette();
        let palsize = 1usize << mode_out.bitdepth;
        // If the caller specified no palette for the output, assume it
        // wants the input's (a new palette is never invented here).
        if palette.is_empty() {
            palette = mode_in.palette();
            // With equal bit depths this makes both modes the same
            // palette type; copy to preserve the exact indices even
            // when the palette holds duplicate colors.
            if mode_in.colortype == ColorType::Palette && mode_in.bitdepth == mode_out.bitdepth
            {
                return Ok(input[..mode_in.raw_size(w, h)].to_vec());
            }
        }
        let palette = &palette[..palette.len().min(palsize)];
        let mut t = ColorTree::new();
        for (i, p) in palette.iter().enumerate() {
            t.add(p[0], p[1], p[2], p[3], i as u16);
        }
        tree = Some(t);
    }

    if mode_in.bitdepth == 16 && mode_out.bitdepth == 16 {
        for i in 0..numpixels {
            let (r, g, b, a) = get_pixel_rgba16(input, i, mode_in);
            put_pixel_rgba16(&mut out, i, mode_out, r, g, b, a);
        }
    } else if mode_out.bitdepth == 8 && mode_out.colortype == ColorType::Rgba {
        get_pixels_rgba8(&mut out, numpixels, input, mode_in);
    } else if mode_out.bitdepth == 8 && mode_out.colortype == ColorType::Rgb {
        get_pixels_rgb8(&mut out, numpixels, input, mode_in);
    } else {
        for i in 0..numpixels {
            let (r, g, b, a) = get_pixel_rgba8(input, i, mode_in);
            put_pixel_rgba8(&mut out, i, mode_out, tree.as_ref(), r, g, b, a)?;
        }
    }

    Ok(out)
}

/// Read pixel `i` as RGBA8. Grey replicates into all three channels;
/// sub-8-bit grey scales to the 0-255 range; a color-key match reads as
/// fully transparent.
pub(crate) fn get_pixel_rgba8(input: &[u8], i: usize, mode: &ColorMode) -> (u8, u8, u8, u8) {
    match mode.colortype {
        ColorType::Grey => match mode.bitdepth {
            8 => {
                let v = input[i];
                let a = match mode.key {
                    Some((kr, _, _)) if v as u16 == kr => 0,
                    _ => 255,
                };
                (v, v, v, a)
            }
            16 => {
                let v16 = 256 * input[i * 2] as u16 + input[i * 2 + 1] as u16;
                let v = input[i * 2];
                let a = match mode.key {
                    Some((kr, _, _)) if v16 == kr => 0,
                    _ => 255,
                };
                (v, v, v, a)
            }
            _ => {
                let highest = (1u32 << mode.bitdepth) - 1;
                let mut j = i * mode.bitdepth as usize;
                let value = read_bits_reversed(&mut j, input, mode.bitdepth as usize);
                let v = ((value * 255) / highest) as u8;
                let a = match mode.key {
                    Some((kr, _, _)) if value as u16 == kr => 0,
                    _ => 255,
                };
                (v, v, v, a)
            }
        },
        ColorType::Rgb => {
            if mode.bitdepth == 8 {
                let (r, g, b) = (input[i * 3], input[i * 3 + 1], input[i * 3 + 2]);
                let a = match mode.key {
                    Some((kr, kg, kb))
                        if (r as u16, g as u16, b as u16) == (kr, kg, kb) =>
                    {
                        0
                    }
                    _ => 255,
                };
                (r, g, b, a)
            } else {
                let r16 = 256 * input[i * 6] as u16 + input[i * 6 + 1] as u16;
                let g16 = 256 * input[i * 6 + 2] as u16 + input[i * 6 + 3] as u16;
                let b16 = 256 * input[i * 6 + 4] as u16 + input[i * 6 + 5] as u16;
                let a = match mode.key {
                    Some(key) if (r16, g16, b16) == key => 0,
                    _ => 255,
                };
                (input[i * 6], input[i * 6 + 2], input[i * 6 + 4], a)
            }
        }
        ColorType::Palette => {
            let index = if mode.bitdepth == 8 {
                input[i] as usize
            } else {
                let mut j = i * mode.bitdepth as usize;
                read_bits_reversed(&mut j, input, mode.bitdepth as usize) as usize
            };
            let p = mode.palette_or_black(index);
            (p[0], p[1], p[2], p[3])
        }
        ColorType::GreyAlpha => {
            if mode.bitdepth == 8 {
                (input[i * 2], input[i * 2], input[i * 2], input[i * 2 + 1])
            } else {
                (
                    input[i * 4],
                    input[i * 4],
                    input[i * 4],
                    input[i * 4 + 2],
                )
            }
        }
        ColorType::Rgba => {
            if mode.bitdepth == 8 {
                (
                    input[i * 4],
                    input[i * 4 + 1],
                    input[i * 4 + 2],
                    input[i * 4 + 3],
                )
            } else {
                (input[i * 8], input[i * 8 + 2], input[i * 8 + 4], input[i * 8 + 6])
            }
        }
    }
}

/// Bulk form of [`get_pixel_rgba8`] writing packed RGBA quads.
fn get_pixels_rgba8(out: &mut [u8], numpixels: usize, input: &[u8], mode: &ColorMode) {
    for i in 0..numpixels {
        let (r, g, b, a) = get_pixel_rgba8(input, i, mode);
        out[i * 4] = r;
        out[i * 4 + 1] = g;
        out[i * 4 + 2] = b;
        out[i * 4 + 3] = a;
    }
}

/// Bulk conversion writing packed RGB triples, dropping alpha.
fn get_pixels_rgb8(out: &mut [u8], numpixels: usize, input: &[u8], mode: &ColorMode) {
    for i in 0..numpixels {
        let (r, g, b, _) = get_pixel_rgba8(input, i, mode);
        out[i * 3] = r;
        out[i * 3 + 1] = g;
        out[i * 3 + 2] = b;
    }
}

/// Read pixel `i` as RGBA16. Only valid for 16-bit modes.
pub(crate) fn get_pixel_rgba16(input: &[u8], i: usize, mode: &ColorMode) -> (u16, u16, u16, u16) {
    debug_assert_eq!(mode.bitdepth, 16);
    let word = |offset: usize| 256 * input[offset] as u16 + input[offset + 1] as u16;
    match mode.colortype {
        ColorType::Grey => {
            let v = word(i * 2);
            let a = match mode.key {
                Some((kr, _, _)) if v == kr => 0,
                _ => 65535,
            };
            (v, v, v, a)
        }
        ColorType::Rgb => {
            let (r, g, b) = (word(i * 6), word(i * 6 + 2), word(i * 6 + 4));
            let a = match mode.key {
                Some(key) if (r, g, b) == key => 0,
                _ => 65535,
            };
            (r, g, b, a)
        }
        ColorType::GreyAlpha => {
            let v = word(i * 4);
            (v, v, v, word(i * 4 + 2))
        }
        ColorType::Rgba => (word(i * 8), word(i * 8 + 2), word(i * 8 + 4), word(i * 8 + 6)),
        // 16-bit palettes don't exist; the dispatch never sends them here.
        ColorType::Palette => unreachable!("palette modes are at most 8-bit"),
    }
}

/// Pack `value` (holding `bits` significant bits) into the output at
/// pixel index `index`, MSB-first within each byte.
fn add_color_bits(out: &mut [u8], index: usize, bits: u32, value: u32) {
    // Pixels per byte minus one; doubles as the sub-byte position mask.
    let m = match bits {
        1 => 7,
        2 => 3,
        _ => 1,
    };
    let p = index & m;
    let mut value = value & ((1 << bits) - 1);
    value <<= bits * (m - p) as u32;
    let byte = index * bits as usize / 8;
    if p == 0 {
        out[byte] = value as u8;
    } else {
        out[byte] |= value as u8;
    }
}

/// Write an RGBA8 pixel in `mode` at index `i`.
fn put_pixel_rgba8(
    out: &mut [u8],
    i: usize,
    mode: &ColorMode,
    tree: Option<&ColorTree>,
    r: u8,
    g: u8,
    b: u8,
    a: u8,
) -> Result<()> {
    match mode.colortype {
        ColorType::Grey => {
            let grey = r;
            match mode.bitdepth {
                8 => out[i] = grey,
                16 => {
                    out[i * 2] = grey;
                    out[i * 2 + 1] = grey;
                }
                _ => {
                    // Keep the most significant bits.
                    let small = (grey as u32) >> (8 - mode.bitdepth);
                    add_color_bits(out, i, mode.bitdepth, small);
                }
            }
        }
        ColorType::Rgb => {
            if mode.bitdepth == 8 {
                out[i * 3] = r;
                out[i * 3 + 1] = g;
                out[i * 3 + 2] = b;
            } else {
                for (c, v) in [r, g, b].into_iter().enumerate() {
                    out[i * 6 + c * 2] = v;
                    out[i * 6 + c * 2 + 1] = v;
                }
            }
        }
        ColorType::Palette => {
            let index = tree
                .and_then(|t| t.get(r, g, b, a))
                .ok_or(Error::ColorNotInPalette)?;
            if mode.bitdepth == 8 {
                out[i] = index as u8;
            } else {
                add_color_bits(out, i, mode.bitdepth, index as u32);
            }
        }
        ColorType::GreyAlpha => {
            let grey = r;
            if mode.bitdepth == 8 {
                out[i * 2] = grey;
                out[i * 2 + 1] = a;
            } else {
                out[i * 4] = grey;
                out[i * 4 + 1] = grey;
                out[i * 4 + 2] = a;
                out[i * 4 + 3] = a;
            }
        }
        ColorType::Rgba => {
            if mode.bitdepth == 8 {
                out[i * 4] = r;
                out[i * 4 + 1] = g;
                out[i * 4 + 2] = b;
                out[i * 4 + 3] = a;
            } else {
                for (c, v) in [r, g, b, a].into_iter().enumerate() {
                    out[i * 8 + c * 2] = v;
                    out[i * 8 + c * 2 + 1] = v;
                }
            }
        }
    }
    Ok(())
}

/// Write an RGBA16 pixel in a 16-bit `mode` at index `i`.
fn put_pixel_rgba16(out: &mut [u8], i: usize, mode: &ColorMode, r: u16, g: u16, b: u16, a: u16) {
    debug_assert_eq!(mode.bitdepth, 16);
    let put = |out: &mut [u8], offset: usize, v: u16| {
        out[offset] = (v >> 8) as u8;
        out[offset + 1] = (v & 255) as u8;
    };
    match mode.colortype {
        ColorType::Grey => put(out, i * 2, r),
        ColorType::Rgb => {
            put(out, i * 6, r);
            put(out, i * 6 + 2, g);
            put(out, i * 6 + 4, b);
        }
        ColorType::GreyAlpha => {
            put(out, i * 4, r);
            put(out, i * 4 + 2, a);
        }
        ColorType::Rgba => {
            put(out, i * 8, r);
            put(out, i * 8 + 2, g);
            put(out, i * 8 + 4, b);
            put(out, i * 8 + 6, a);
        }
        ColorType::Palette => unreachable!("palette modes are at most 8-bit"),
    }
}
