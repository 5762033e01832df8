//! PNG decoding: chunk parsing through pixel reconstruction.
//!
//! Decoding walks the chunk stream, zlib-decompresses the IDAT data,
//! unfilters and (for interlaced files) deinterlaces the scanlines,
//! then converts to the caller's requested pixel format.

use super::inflate::zlib_decompress;
use crate::color::{convert::convert, ColorMode, ColorType};
use crate::error::{Error, Result};
use crate::png::chunk::ChunkIter;
use crate::png::{adam7, check_dimensions, filter, PngInfo, State, PNG_SIGNATURE};

/// A decoded raster image with unpadded scanlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pixel data; layout is given by the color mode it was decoded to.
    pub pixels: Vec<u8>,
}

/// Read and validate the signature and IHDR without touching pixel
/// data. Returns the dimensions and file properties.
pub fn inspect(input: &[u8]) -> Result<(u32, u32, PngInfo)> {
    if input.is_empty() {
        return Err(Error::EmptyInput);
    }
    if input.len() < 33 {
        return Err(Error::FileTooShort);
    }
    if input[0..8] != PNG_SIGNATURE {
        return Err(Error::BadSignature);
    }

    let ihdr_len = u32::from_be_bytes(input[8..12].try_into().unwrap()) as usize;
    if &input[12..16] != b"IHDR" {
        return Err(Error::FirstChunkNotIhdr);
    }
    if ihdr_len != 13 {
        return Err(Error::BadIhdrSize(ihdr_len));
    }

    let stored_crc = u32::from_be_bytes(input[29..33].try_into().unwrap());
    if crate::compress::crc32(&input[12..29]) != stored_crc {
        return Err(Error::CrcMismatch);
    }

    let w = u32::from_be_bytes(input[16..20].try_into().unwrap());
    let h = u32::from_be_bytes(input[20..24].try_into().unwrap());
    let bitdepth = input[24] as u32;
    let colortype = input[25];
    let compression = input[26];
    let filter_method = input[27];
    let interlace = input[28];

    check_dimensions(w, h)?;

    let colortype = ColorType::try_from(colortype).map_err(|_| Error::IllegalColorMode {
        colortype,
        bitdepth,
    })?;
    let color = ColorMode::new(colortype, bitdepth)?;

    if compression != 0 {
        return Err(Error::IllegalCompressionMethod(compression));
    }
    if filter_method != 0 {
        return Err(Error::IllegalFilterMethod(filter_method));
    }
    if interlace > 1 {
        return Err(Error::IllegalInterlaceMethod(interlace));
    }

    Ok((
        w,
        h,
        PngInfo {
            color,
            interlace: interlace as u32,
        },
    ))
}

/// Consume a PLTE chunk into the color mode.
fn read_plte(color: &mut ColorMode, data: &[u8]) -> Result<()> {
    if data.len() % 3 != 0 || data.len() / 3 > 256 {
        return Err(Error::PaletteTooBig);
    }
    color.palette_clear();
    for entry in data.chunks_exact(3) {
        color.palette_add([entry[0], entry[1], entry[2], 255])?;
    }
    Ok(())
}

/// Consume a tRNS chunk: per-entry palette alpha, or the 2/6-byte
/// color key for grey/RGB.
fn read_trns(color: &mut ColorMode, data: &[u8]) -> Result<()> {
    match color.colortype {
        ColorType::Palette => {
            if data.len() > color.palette().len() {
                return Err(Error::TrnsWrongSize);
            }
            let mut palette = color.palette().to_vec();
            for (entry, &alpha) in palette.iter_mut().zip(data) {
                entry[3] = alpha;
            }
            color.set_palette(&palette)?;
        }
        ColorType::Grey => {
            if data.len() != 2 {
                return Err(Error::TrnsWrongSize);
            }
            let key = 256 * data[0] as u16 + data[1] as u16;
            color.key = Some((key, key, key));
        }
        ColorType::Rgb => {
            if data.len() != 6 {
                return Err(Error::TrnsWrongSize);
            }
            color.key = Some((
                256 * data[0] as u16 + data[1] as u16,
                256 * data[2] as u16 + data[3] as u16,
                256 * data[4] as u16 + data[5] as u16,
            ));
        }
        _ => return Err(Error::TrnsNotAllowed),
    }
    Ok(())
}

/// Byte size of the filtered scanline data the IDAT stream must
/// decompress to, for either interlace method.
fn expected_scanline_bytes(w: u32, h: u32, info: &PngInfo) -> usize {
    let bpp = info.color.bpp();
    if info.interlace == 0 {
        let line = ((w as usize * bpp as usize) + 7) / 8;
        h as usize * (1 + line)
    } else {
        adam7::get_pass_values(w, h, bpp).filter_start[7]
    }
}

/// Unfilter, strip padding, and deinterlace the decompressed scanline
/// data into packed raw pixels.
fn post_process_scanlines(
    scanlines: &[u8],
    w: u32,
    h: u32,
    info: &PngInfo,
) -> Result<Vec<u8>> {
    let bpp = info.color.bpp() as usize;

    if info.interlace == 0 {
        unfilter_and_unpad(scanlines, w as usize, h as usize, bpp)
    } else {
        let passes = adam7::get_pass_values(w, h, info.color.bpp());
        let mut reduced = vec![0u8; passes.start[7]];
        for i in 0..7 {
            let pw = passes.w[i] as usize;
            let ph = passes.h[i] as usize;
            if pw == 0 || ph == 0 {
                continue;
            }
            let pass = &scanlines[passes.filter_start[i]..passes.filter_start[i + 1]];
            let packed = unfilter_and_unpad(pass, pw, ph, bpp)?;
            reduced[passes.start[i]..passes.start[i] + packed.len()].copy_from_slice(&packed);
        }

        let mut out = vec![0u8; info.color.raw_size(w, h)];
        adam7::deinterlace(&mut out, &reduced, w, h, info.color.bpp());
        Ok(out)
    }
}

/// Unfilter one (sub)image and remove scanline padding bits if the
/// row width is not a whole number of bytes.
fn unfilter_and_unpad(scanlines: &[u8], w: usize, h: usize, bpp: usize) -> Result<Vec<u8>> {
    let linebytes = (w * bpp).div_ceil(8);
    let unfiltered = filter::unfilter_image(scanlines, h, linebytes, bpp)?;
    if bpp < 8 && w * bpp != linebytes * 8 {
        let mut packed = vec![0u8; (h * w * bpp).div_ceil(8)];
        adam7::remove_padding_bits(&mut packed, &unfiltered, w * bpp, linebytes * 8, h);
        Ok(packed)
    } else {
        Ok(unfiltered)
    }
}

/// Decode a PNG byte stream with explicit state.
///
/// On success `state.info_png` describes the file; the returned pixels
/// are in `state.info_raw`'s mode when color conversion is enabled,
/// otherwise in the file's own mode (and `info_raw` is updated to it).
pub fn decode_with_state(input: &[u8], state: &mut State) -> Result<RawImage> {
    let (w, h, mut info) = inspect(input)?;

    let mut idat = Vec::new();
    for chunk in ChunkIter::new(&input[33..]) {
        let chunk = chunk?;
        if !chunk.crc_ok() {
            return Err(Error::CrcMismatch);
        }
        match &chunk.chunk_type {
            b"IDAT" => idat.extend_from_slice(chunk.data),
            b"PLTE" => read_plte(&mut info.color, chunk.data)?,
            b"tRNS" => read_trns(&mut info.color, chunk.data)?,
            b"IEND" => break,
            // All other chunks, critical or not, are skipped.
            _ => {}
        }
    }

    let scanlines = zlib_decompress(&idat, &state.decoder.zlib)?;
    let expected = expected_scanline_bytes(w, h, &info);
    if scanlines.len() != expected {
        return Err(Error::DecompressedSizeMismatch {
            expected,
            actual: scanlines.len(),
        });
    }

    let data = post_process_scanlines(&scanlines, w, h, &info)?;
    state.info_png = info;

    let pixels = if !state.decoder.color_convert {
        state.info_raw = state.info_png.color.clone();
        data
    } else if state.info_raw == state.info_png.color {
        data
    } else {
        // Conversion targets are restricted to RGB/RGBA or 8-bit modes;
        // other targets would need information the file may not carry.
        if !matches!(
            state.info_raw.colortype,
            ColorType::Rgb | ColorType::Rgba
        ) && state.info_raw.bitdepth != 8
        {
            return Err(Error::UnsupportedConversion);
        }
        convert(&data, &state.info_png.color, &state.info_raw, w, h)?
    };

    Ok(RawImage {
        width: w,
        height: h,
        pixels,
    })
}

/// Decode a PNG, converting to the given color type and bit depth.
pub fn decode(input: &[u8], colortype: ColorType, bitdepth: u32) -> Result<RawImage> {
    let mut state = State::new();
    state.info_raw = ColorMode::new(colortype, bitdepth)?;
    decode_with_state(input, &mut state)
}

/// Decode a PNG to RGBA8.
pub fn decode32(input: &[u8]) -> Result<RawImage> {
    decode(input, ColorType::Rgba, 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::chunk::write_chunk;
    use crate::png::encode32;

    fn minimal_png() -> Vec<u8> {
        encode32(&[1, 2, 3, 255], 1, 1).unwrap()
    }

    #[test]
    fn test_inspect_reports_header_fields() {
        let png = minimal_png();
        let (w, h, info) = inspect(&png).unwrap();
        assert_eq!((w, h), (1, 1));
        assert_eq!(info.interlace, 0);
        assert_eq!(info.color.bitdepth, 8);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode32(&[]), Err(Error::EmptyInput));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(decode32(&[0x89]), Err(Error::FileTooShort));
    }

    #[test]
    fn test_bad_signature() {
        let mut png = minimal_png();
        png[0] = 0x88;
        assert_eq!(decode32(&png), Err(Error::BadSignature));
    }

    #[test]
    fn test_first_chunk_must_be_ihdr() {
        let mut png = vec![];
        png.extend_from_slice(&PNG_SIGNATURE);
        write_chunk(&mut png, b"IDAT", &[0u8; 13]);
        write_chunk(&mut png, b"IEND", &[]);
        assert_eq!(decode32(&png), Err(Error::FirstChunkNotIhdr));
    }

    #[test]
    fn test_corrupt_crc_detected() {
        let mut png = minimal_png();
        // Flip a bit inside the IDAT payload, leaving lengths intact.
        let idat_pos = png
            .windows(4)
            .position(|w| w == b"IDAT")
            .expect("IDAT present");
        png[idat_pos + 5] ^= 0x01;
        assert_eq!(decode32(&png), Err(Error::CrcMismatch));
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let png = minimal_png();
        // Rebuild the file with an extra ancillary chunk inserted
        // after IHDR (offset 33).
        let mut patched = png[..33].to_vec();
        write_chunk(&mut patched, b"teXt", b"ignored");
        patched.extend_from_slice(&png[33..]);

        let image = decode32(&patched).unwrap();
        assert_eq!(image.pixels, vec![1, 2, 3, 255]);
    }

    #[test]
    fn test_decode_without_color_convert_reports_file_mode() {
        // A grey image re-read without conversion.
        let png = crate::png::encode(&[7, 200], 2, 1, ColorType::Grey, 8).unwrap();
        let mut state = State::new();
        state.decoder.color_convert = false;
        let image = decode_with_state(&png, &mut state).unwrap();
        assert_eq!(state.info_raw.colortype, state.info_png.color.colortype);
        assert_eq!(image.pixels.len(), state.info_raw.raw_size(2, 1));
    }

    #[test]
    fn test_decode_conversion_target_restriction() {
        let png = minimal_png();
        let mut state = State::new();
        state.info_raw = ColorMode::new(ColorType::Grey, 4).unwrap();
        assert_eq!(
            decode_with_state(&png, &mut state),
            Err(Error::UnsupportedConversion)
        );
    }
}
