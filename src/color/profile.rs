//! Single-pass color statistics and automatic output mode selection.
//!
//! The profile scans the image once, short-circuiting each property
//! (coloredness, alpha, color count, bit depth) as soon as its most
//! expensive answer is known. The chooser then picks the smallest
//! lossless PNG mode from the collected statistics.

use super::convert::{get_pixel_rgba16, get_pixel_rgba8};
use super::tree::ColorTree;
use super::{ColorMode, ColorType};
use crate::error::Result;

/// Statistics about the colors appearing in an image.
#[derive(Debug, Clone)]
pub struct ColorProfile {
    /// Any pixel has r != g or r != b.
    pub colored: bool,
    /// All transparency can be expressed with a single color key.
    pub key: bool,
    /// Color key red channel, always 16-bit (8-bit values repeat their
    /// byte, so 255 becomes 65535).
    pub key_r: u16,
    /// Color key green channel.
    pub key_g: u16,
    /// Color key blue channel.
    pub key_b: u16,
    /// A real alpha channel (or alpha palette) is required.
    pub alpha: bool,
    /// Number of distinct colors, counted up to 257.
    pub numcolors: u32,
    /// The first 256 distinct colors encountered.
    pub palette: Vec<[u8; 4]>,
    /// Minimum bits per channel: 1, 2, 4, 8, or 16.
    pub bits: u32,
    /// Number of pixels scanned.
    pub numpixels: usize,
}

impl Default for ColorProfile {
    fn default() -> Self {
        Self {
            colored: false,
            key: false,
            key_r: 0,
            key_g: 0,
            key_b: 0,
            alpha: false,
            numcolors: 0,
            palette: Vec::new(),
            bits: 1,
            numpixels: 0,
        }
    }
}

/// Minimum grey bit depth that represents `value` losslessly.
/// The 2-bit and 4-bit scalings use multiples of 85 and 17.
fn value_required_bits(value: u8) -> u32 {
    if value == 0 || value == 255 {
        1
    } else if value % 17 == 0 {
        if value % 85 == 0 {
            2
        } else {
            4
        }
    } else {
        8
    }
}

/// Scan the image and produce its color profile.
pub fn compute_profile(
    image: &[u8],
    w: u32,
    h: u32,
    mode_in: &ColorMode,
) -> Result<ColorProfile> {
    mode_in.check_validity()?;
    let numpixels = w as usize * h as usize;
    let bpp = mode_in.bpp();

    let mut profile = ColorProfile {
        numpixels,
        ..ColorProfile::default()
    };

    // Properties whose most expensive outcome is already implied by the
    // input mode start out done.
    let mut colored_done = mode_in.colortype.is_greyscale();
    let mut alpha_done = !mode_in.can_have_alpha();
    let mut numcolors_done = false;
    let mut bits_done = bpp == 1;

    let maxnumcolors: u32 = if bpp <= 8 { 257.min(1u32 << bpp) } else { 257 };

    let mut tree = ColorTree::new();

    // A 16-bit image that never uses the low bytes profiles as 8-bit.
    let mut sixteen = false;
    if mode_in.bitdepth == 16 {
        for i in 0..numpixels {
            let (r, g, b, a) = get_pixel_rgba16(image, i, mode_in);
            if (r & 255) != (r >> 8)
                || (g & 255) != (g >> 8)
                || (b & 255) != (b >> 8)
                || (a & 255) != (a >> 8)
            {
                profile.bits = 16;
                sixteen = true;
                bits_done = true;
                // Palettes cannot hold 16-bit colors.
                numcolors_done = true;
                break;
            }
        }
    }

    if sixteen {
        for i in 0..numpixels {
            let (r, g, b, a) = get_pixel_rgba16(image, i, mode_in);

            if !colored_done && (r != g || r != b) {
                profile.colored = true;
                colored_done = true;
            }

            if !alpha_done {
                let matchkey =
                    r == profile.key_r && g == profile.key_g && b == profile.key_b;
                if a != 65535 && (a != 0 || (profile.key && !matchkey)) {
                    profile.alpha = true;
                    profile.key = false;
                    alpha_done = true;
                } else if a == 0 && !profile.alpha && !profile.key {
                    profile.key = true;
                    profile.key_r = r;
                    profile.key_g = g;
                    profile.key_b = b;
                } else if a == 65535 && profile.key && matchkey {
                    // An opaque pixel with the key's color: the key
                    // cannot be used.
                    profile.alpha = true;
                    profile.key = false;
                    alpha_done = true;
                }
            }

            if alpha_done && numcolors_done && colored_done && bits_done {
                break;
            }
        }

        if profile.key && !profile.alpha {
            for i in 0..numpixels {
                let (r, g, b, a) = get_pixel_rgba16(image, i, mode_in);
                if a != 0 && r == profile.key_r && g == profile.key_g && b == profile.key_b {
                    profile.alpha = true;
                    profile.key = false;
                }
            }
        }
    } else {
        for i in 0..numpixels {
            let (r, g, b, a) = get_pixel_rgba8(image, i, mode_in);

            if !bits_done && profile.bits < 8 {
                // Only r matters: sub-8-bit depths are grey-only.
                let bits = value_required_bits(r);
                if bits > profile.bits {
                    profile.bits = bits;
                }
            }
            bits_done = profile.bits >= bpp;

            if !colored_done && (r != g || r != b) {
                profile.colored = true;
                colored_done = true;
                // PNG has no colored modes below 8 bits per channel.
                if profile.bits < 8 {
                    profile.bits = 8;
                }
            }

            if !alpha_done {
                let matchkey = r as u16 == profile.key_r
                    && g as u16 == profile.key_g
                    && b as u16 == profile.key_b;
                if a != 255 && (a != 0 || (profile.key && !matchkey)) {
                    profile.alpha = true;
                    profile.key = false;
                    alpha_done = true;
                    if profile.bits < 8 {
                        profile.bits = 8;
                    }
                } else if a == 0 && !profile.alpha && !profile.key {
                    profile.key = true;
                    profile.key_r = r as u16;
                    profile.key_g = g as u16;
                    profile.key_b = b as u16;
                } else if a == 255 && profile.key && matchkey {
                    profile.alpha = true;
                    profile.key = false;
                    alpha_done = true;
                    if profile.bits < 8 {
                        profile.bits = 8;
                    }
                }
            }

            if !numcolors_done && !tree.has(r, g, b, a) {
                tree.add(r, g, b, a, profile.numcolors.min(255) as u16);
                if profile.numcolors < 256 {
                    profile.palette.push([r, g, b, a]);
                }
                profile.numcolors += 1;
                numcolors_done = profile.numcolors >= maxnumcolors;
            }

            if alpha_done && numcolors_done && colored_done && bits_done {
                break;
            }
        }

        if profile.key && !profile.alpha {
            // Confirm no opaque pixel shares the key color.
            for i in 0..numpixels {
                let (r, g, b, a) = get_pixel_rgba8(image, i, mode_in);
                if a != 0
                    && r as u16 == profile.key_r
                    && g as u16 == profile.key_g
                    && b as u16 == profile.key_b
                {
                    profile.alpha = true;
                    profile.key = false;
                    if profile.bits < 8 {
                        profile.bits = 8;
                    }
                }
            }
        }

        // Make the key 16-bit for consistency: repeat each byte twice.
        profile.key_r += profile.key_r << 8;
        profile.key_g += profile.key_g << 8;
        profile.key_b += profile.key_b << 8;
    }

    Ok(profile)
}

/// Choose the smallest lossless output mode for an image.
pub fn auto_choose_color(
    image: &[u8],
    w: u32,
    h: u32,
    mode_in: &ColorMode,
) -> Result<ColorMode> {
    let profile = compute_profile(image, w, h, mode_in)?;
    choose_color_from_profile(&profile, mode_in)
}

/// Pick the output mode from an already computed profile.
pub fn choose_color_from_profile(
    profile: &ColorProfile,
    mode_in: &ColorMode,
) -> Result<ColorMode> {
    let numpixels = profile.numpixels;

    let mut alpha = profile.alpha;
    let mut key = profile.key;
    let mut bits = profile.bits;

    if key && numpixels <= 16 {
        // Too few pixels to justify tRNS chunk overhead.
        alpha = true;
        key = false;
        if bits < 8 {
            bits = 8;
        }
    }

    let grey_ok = !profile.colored;
    let n = profile.numcolors;
    let palettebits = if n <= 2 {
        1
    } else if n <= 4 {
        2
    } else if n <= 16 {
        4
    } else {
        8
    };
    let mut palette_ok = n != 0 && n <= 256 && bits <= 8;
    if (numpixels as u64) < n as u64 * 2 {
        palette_ok = false; // don't add palette overhead for tiny images
    }
    if grey_ok && !alpha && !key && bits <= palettebits {
        palette_ok = false; // grey is less overhead
    }

    let mut mode_out;
    if palette_ok {
        mode_out = ColorMode::new(ColorType::Palette, palettebits)?;
        mode_out.set_palette(&profile.palette)?;

        if mode_in.colortype == ColorType::Palette
            && mode_in.palette().len() >= mode_out.palette().len()
            && mode_in.bitdepth == mode_out.bitdepth
        {
            // The input palette already covers these colors: keep it to
            // preserve its order and avoid converting pixel data.
            mode_out = mode_in.clone();
        }
    } else {
        let colortype = match (alpha, profile.colored) {
            (true, true) => ColorType::Rgba,
            (true, false) => ColorType::GreyAlpha,
            (false, true) => ColorType::Rgb,
            (false, false) => ColorType::Grey,
        };
        mode_out = ColorMode::new(colortype, bits)?;
        if key {
            // The profile key is 16-bit; mask it down to the bit depth.
            let mask = ((1u32 << bits) - 1) as u16;
            mode_out.key = Some((
                profile.key_r & mask,
                profile.key_g & mask,
                profile.key_b & mask,
            ));
        }
    }

    Ok(mode_out)
}
