//! Color conversion and auto-selection tests against the public API.

use pngine::{auto_choose_color, compute_profile, convert, ColorMode, ColorType, Error};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn mode(colortype: ColorType, bitdepth: u32) -> ColorMode {
    ColorMode::new(colortype, bitdepth).unwrap()
}

/// A->B->A is the identity whenever B can hold everything A can.
#[test]
fn test_widening_composition_roundtrips() {
    let mut rng = StdRng::seed_from_u64(8);
    let (w, h) = (9u32, 5u32);

    let pairs = [
        (mode(ColorType::Grey, 8), mode(ColorType::GreyAlpha, 8)),
        (mode(ColorType::Grey, 8), mode(ColorType::Rgb, 8)),
        (mode(ColorType::Grey, 8), mode(ColorType::Rgba, 16)),
        (mode(ColorType::Rgb, 8), mode(ColorType::Rgba, 8)),
        (mode(ColorType::Rgb, 8), mode(ColorType::Rgb, 16)),
        (mode(ColorType::GreyAlpha, 8), mode(ColorType::Rgba, 8)),
        (mode(ColorType::Rgba, 8), mode(ColorType::Rgba, 16)),
        (mode(ColorType::Rgb, 16), mode(ColorType::Rgba, 16)),
        (mode(ColorType::Grey, 4), mode(ColorType::Grey, 8)),
        (mode(ColorType::Grey, 1), mode(ColorType::Rgba, 8)),
    ];

    for (a, b) in pairs {
        let mut img = vec![0u8; a.raw_size(w, h)];
        rng.fill(&mut img[..]);
        // Only whole pixels round-trip; clear the padding bits in the
        // final byte of sub-byte formats.
        let used_bits = (w * h * a.bpp()) as usize;
        if used_bits % 8 != 0 {
            img[used_bits / 8] &= 0xFFu8 << (8 - used_bits % 8);
        }

        let there = convert(&img, &a, &b, w, h).unwrap();
        let back = convert(&there, &b, &a, w, h).unwrap();
        assert_eq!(back, img, "{:?}/{} -> {:?}/{}", a.colortype, a.bitdepth, b.colortype, b.bitdepth);
    }
}

/// Palette -> RGBA -> palette restores the exact indices.
#[test]
fn test_palette_composition() {
    let mut pal = mode(ColorType::Palette, 4);
    for i in 0..12u8 {
        pal.palette_add([i * 20, 255 - i * 10, i, if i == 3 { 0 } else { 255 }])
            .unwrap();
    }
    let rgba = mode(ColorType::Rgba, 8);

    let (w, h) = (10u32, 3u32);
    let mut img = vec![0u8; pal.raw_size(w, h)];
    for (i, byte) in img.iter_mut().enumerate() {
        *byte = (((i * 5) % 12) as u8) << 4 | ((i * 7 + 1) % 12) as u8;
    }

    let expanded = convert(&img, &pal, &rgba, w, h).unwrap();
    let back = convert(&expanded, &rgba, &pal, w, h).unwrap();
    assert_eq!(back, img);
}

/// Converting to a palette lacking a color is an error.
#[test]
fn test_unrepresentable_color() {
    let mut pal = mode(ColorType::Palette, 8);
    pal.palette_add([0, 0, 0, 255]).unwrap();
    let rgba = mode(ColorType::Rgba, 8);

    let result = convert(&[1, 2, 3, 255], &rgba, &pal, 1, 1);
    assert_eq!(result, Err(Error::ColorNotInPalette));
}

/// The chosen mode never loses information: converting there and back
/// through RGBA8 reproduces the image.
#[test]
fn test_auto_choice_is_lossless() {
    let rgba = mode(ColorType::Rgba, 8);
    let mut rng = StdRng::seed_from_u64(21);

    let mut images: Vec<(u32, u32, Vec<u8>)> = Vec::new();
    // Random opaque color image.
    let mut img = vec![0u8; 12 * 5 * 4];
    rng.fill(&mut img[..]);
    for px in img.chunks_mut(4) {
        px[3] = 255;
    }
    images.push((12, 5, img));
    // Black and white.
    let mut img = Vec::new();
    for i in 0..30 {
        let v = if i % 3 == 0 { 0 } else { 255 };
        img.extend_from_slice(&[v, v, v, 255]);
    }
    images.push((10, 3, img));
    // Translucent gradient.
    let mut img = Vec::new();
    for i in 0..40u32 {
        img.extend_from_slice(&[(i * 6) as u8, 0, 0, (i * 5) as u8]);
    }
    images.push((8, 5, img));

    for (w, h, img) in images {
        let chosen = auto_choose_color(&img, w, h, &rgba).unwrap();
        let there = convert(&img, &rgba, &chosen, w, h).unwrap();
        let back = convert(&there, &chosen, &rgba, w, h).unwrap();
        assert_eq!(back, img, "{w}x{h} via {:?}", chosen.colortype);
    }
}

/// The chosen mode is at least as small as the input mode.
#[test]
fn test_auto_choice_minimality() {
    let rgba = mode(ColorType::Rgba, 8);

    // Opaque grey: 8 bpp beats 32.
    let mut img = Vec::new();
    for i in 0..100u32 {
        let v = (i % 251) as u8;
        img.extend_from_slice(&[v, v, v, 255]);
    }
    let chosen = auto_choose_color(&img, 10, 10, &rgba).unwrap();
    assert_eq!(chosen.colortype, ColorType::Grey);
    assert_eq!(chosen.bpp(), 8);

    // Two colors: 1 bpp palette or grey.
    let mut img = Vec::new();
    for i in 0..100u32 {
        let v = if i % 2 == 0 { 0 } else { 255 };
        img.extend_from_slice(&[v, v, v, 255]);
    }
    let chosen = auto_choose_color(&img, 10, 10, &rgba).unwrap();
    assert_eq!(chosen.bpp(), 1);
}

/// Profile counts colors and flags exactly.
#[test]
fn test_profile_counts() {
    let rgba = mode(ColorType::Rgba, 8);
    let mut img = Vec::new();
    for color in [
        [1u8, 2, 3, 255],
        [1, 2, 3, 255],
        [9, 9, 9, 255],
        [4, 5, 6, 200],
        [1, 2, 3, 255],
    ] {
        img.extend_from_slice(&color);
    }

    let profile = compute_profile(&img, 5, 1, &rgba).unwrap();
    assert_eq!(profile.numcolors, 3);
    assert!(profile.colored);
    assert!(profile.alpha);
    assert!(!profile.key);
    assert_eq!(profile.palette.len(), 3);
}

/// 16-bit data that only uses high bytes profiles as 8-bit and
/// converts down losslessly.
#[test]
fn test_16bit_downconversion() {
    let rgba16 = mode(ColorType::Rgba, 16);
    let rgba8 = mode(ColorType::Rgba, 8);

    let mut img = Vec::new();
    for i in 0..20u32 {
        for c in 0..4u32 {
            let v = ((i * 13 + c * 7) % 256) as u8;
            img.extend_from_slice(&[v, v]);
        }
    }

    let profile = compute_profile(&img, 5, 4, &rgba16).unwrap();
    assert!(profile.bits <= 8);

    let down = convert(&img, &rgba16, &rgba8, 5, 4).unwrap();
    let up = convert(&down, &rgba8, &rgba16, 5, 4).unwrap();
    assert_eq!(up, img);
}
