//! PNG scanline filters: five byte-wise predictors applied before
//! compression and inverted after decompression.
//!
//! `bytewidth` is the distance to the "left" byte: 1 for sub-byte
//! pixels, the pixel byte size otherwise. Bytes outside the image read
//! as zero.

use crate::error::{Error, Result};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Filter selection strategy for the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStrategy {
    /// Always filter type 0. Mandatory for palette and sub-byte images
    /// when `filter_palette_zero` is set.
    Zero,
    /// Per row, pick the type with the smallest sum of absolute
    /// residuals (the heuristic suggested by the PNG standard).
    #[default]
    Minsum,
    /// Per row, pick the type whose filtered bytes have the lowest
    /// byte-histogram entropy.
    Entropy,
}

const FILTER_NONE: u8 = 0;
const FILTER_SUB: u8 = 1;
const FILTER_UP: u8 = 2;
const FILTER_AVERAGE: u8 = 3;
const FILTER_PAETH: u8 = 4;

/// Paeth predictor: the neighbor closest to `left + above - upperleft`,
/// ties resolved left, above, upper-left.
#[inline]
fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let a_i = a as i16;
    let b_i = b as i16;
    let c_i = c as i16;

    let p = a_i + b_i - c_i;
    let pa = (p - a_i).abs();
    let pb = (p - b_i).abs();
    let pc = (p - c_i).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Filter one row with a fixed type, appending the residuals to `out`.
fn filter_scanline(out: &mut Vec<u8>, row: &[u8], prev: &[u8], bytewidth: usize, filter: u8) {
    match filter {
        FILTER_NONE => out.extend_from_slice(row),
        FILTER_SUB => {
            for (i, &byte) in row.iter().enumerate() {
                let left = if i >= bytewidth { row[i - bytewidth] } else { 0 };
                out.push(byte.wrapping_sub(left));
            }
        }
        FILTER_UP => {
            for (i, &byte) in row.iter().enumerate() {
                out.push(byte.wrapping_sub(prev[i]));
            }
        }
        FILTER_AVERAGE => {
            for (i, &byte) in row.iter().enumerate() {
                let left = if i >= bytewidth {
                    row[i - bytewidth] as u16
                } else {
                    0
                };
                let avg = ((left + prev[i] as u16) / 2) as u8;
                out.push(byte.wrapping_sub(avg));
            }
        }
        FILTER_PAETH => {
            for (i, &byte) in row.iter().enumerate() {
                let left = if i >= bytewidth { row[i - bytewidth] } else { 0 };
                let upper_left = if i >= bytewidth { prev[i - bytewidth] } else { 0 };
                let predicted = paeth_predictor(left, prev[i], upper_left);
                out.push(byte.wrapping_sub(predicted));
            }
        }
        _ => unreachable!(),
    }
}

/// Sum of absolute residuals, treating each byte as signed.
#[inline]
fn minsum_score(filtered: &[u8]) -> u64 {
    filtered
        .iter()
        .map(|&b| (b as i8).unsigned_abs() as u64)
        .sum()
}

/// Entropy of the byte histogram in bits per byte, including the
/// filter-type byte itself.
fn entropy_score(filtered: &[u8], filter: u8) -> f32 {
    let mut count = [0u32; 256];
    for &b in filtered {
        count[b as usize] += 1;
    }
    count[filter as usize] += 1;

    let total = (filtered.len() + 1) as f32;
    let mut sum = 0.0f32;
    for &c in &count {
        if c > 0 {
            let p = c as f32 / total;
            sum += (1.0 / p).log2() * p;
        }
    }
    sum
}

/// Filter one row adaptively, appending the filter byte and residuals.
fn filter_row_adaptive(
    out: &mut Vec<u8>,
    row: &[u8],
    prev: &[u8],
    bytewidth: usize,
    strategy: FilterStrategy,
    attempts: &mut [Vec<u8>; 5],
) {
    for (filter, attempt) in attempts.iter_mut().enumerate() {
        attempt.clear();
        filter_scanline(attempt, row, prev, bytewidth, filter as u8);
    }

    let best = match strategy {
        FilterStrategy::Minsum => {
            let mut best = 0usize;
            let mut smallest = u64::MAX;
            for (filter, attempt) in attempts.iter().enumerate() {
                // Type 0 is no difference filter, so its score counts
                // unsigned; it rarely wins, which is intended.
                let sum = if filter == 0 {
                    attempt.iter().map(|&b| b as u64).sum()
                } else {
                    minsum_score(attempt)
                };
                if sum < smallest {
                    smallest = sum;
                    best = filter;
                }
            }
            best
        }
        FilterStrategy::Entropy => {
            let mut best = 0usize;
            let mut smallest = f32::INFINITY;
            for (filter, attempt) in attempts.iter().enumerate() {
                let sum = entropy_score(attempt, filter as u8);
                if sum < smallest {
                    smallest = sum;
                    best = filter;
                }
            }
            best
        }
        FilterStrategy::Zero => 0,
    };

    out.push(best as u8);
    out.extend_from_slice(&attempts[best]);
}

/// Filter a whole (padded) image, producing one filter-type byte plus
/// `linebytes` residual bytes per row.
pub(crate) fn filter_image(
    input: &[u8],
    h: usize,
    linebytes: usize,
    bpp: usize,
    strategy: FilterStrategy,
) -> Vec<u8> {
    let bytewidth = bpp.div_ceil(8);
    let zero_row = vec![0u8; linebytes];

    if strategy == FilterStrategy::Zero {
        let mut out = Vec::with_capacity(h * (linebytes + 1));
        for y in 0..h {
            out.push(FILTER_NONE);
            out.extend_from_slice(&input[y * linebytes..(y + 1) * linebytes]);
        }
        return out;
    }

    #[cfg(feature = "parallel")]
    {
        if h > 64 && linebytes >= 32 {
            return filter_image_parallel(input, h, linebytes, bytewidth, strategy);
        }
    }

    let mut out = Vec::with_capacity(h * (linebytes + 1));
    let mut attempts: [Vec<u8>; 5] = Default::default();
    for y in 0..h {
        let row = &input[y * linebytes..(y + 1) * linebytes];
        let prev = if y == 0 {
            &zero_row[..]
        } else {
            &input[(y - 1) * linebytes..y * linebytes]
        };
        filter_row_adaptive(&mut out, row, prev, bytewidth, strategy, &mut attempts);
    }
    out
}

#[cfg(feature = "parallel")]
fn filter_image_parallel(
    input: &[u8],
    h: usize,
    linebytes: usize,
    bytewidth: usize,
    strategy: FilterStrategy,
) -> Vec<u8> {
    let zero_row = vec![0u8; linebytes];
    let mut out = vec![0u8; h * (linebytes + 1)];

    out.par_chunks_mut(linebytes + 1)
        .enumerate()
        .for_each(|(y, out_row)| {
            let row = &input[y * linebytes..(y + 1) * linebytes];
            let prev = if y == 0 {
                &zero_row[..]
            } else {
                &input[(y - 1) * linebytes..y * linebytes]
            };
            let mut attempts: [Vec<u8>; 5] = Default::default();
            let mut row_buf = Vec::with_capacity(linebytes + 1);
            filter_row_adaptive(&mut row_buf, row, prev, bytewidth, strategy, &mut attempts);
            out_row.copy_from_slice(&row_buf);
        });

    out
}

/// Invert one row's filter in place; `prev` is the reconstructed
/// previous row (or empty for the first row).
fn unfilter_scanline(
    recon: &mut [u8],
    prev: Option<&[u8]>,
    bytewidth: usize,
    filter: u8,
) -> Result<()> {
    let length = recon.len();
    match filter {
        FILTER_NONE => {}
        FILTER_SUB => {
            for i in bytewidth..length {
                recon[i] = recon[i].wrapping_add(recon[i - bytewidth]);
            }
        }
        FILTER_UP => {
            if let Some(prev) = prev {
                for i in 0..length {
                    recon[i] = recon[i].wrapping_add(prev[i]);
                }
            }
        }
        FILTER_AVERAGE => {
            if let Some(prev) = prev {
                for i in 0..bytewidth {
                    recon[i] = recon[i].wrapping_add(prev[i] >> 1);
                }
                for i in bytewidth..length {
                    let avg = ((recon[i - bytewidth] as u16 + prev[i] as u16) / 2) as u8;
                    recon[i] = recon[i].wrapping_add(avg);
                }
            } else {
                for i in bytewidth..length {
                    recon[i] = recon[i].wrapping_add(recon[i - bytewidth] >> 1);
                }
            }
        }
        FILTER_PAETH => {
            if let Some(prev) = prev {
                for i in 0..bytewidth {
                    // paeth(0, above, 0) is always above.
                    recon[i] = recon[i].wrapping_add(prev[i]);
                }
                for i in bytewidth..length {
                    let predicted =
                        paeth_predictor(recon[i - bytewidth], prev[i], prev[i - bytewidth]);
                    recon[i] = recon[i].wrapping_add(predicted);
                }
            } else {
                for i in bytewidth..length {
                    // paeth(left, 0, 0) is always left.
                    recon[i] = recon[i].wrapping_add(recon[i - bytewidth]);
                }
            }
        }
        other => return Err(Error::IllegalFilterType(other)),
    }
    Ok(())
}

/// Invert the filters of a whole image: `input` holds `h` rows of one
/// filter byte plus `linebytes` data bytes, the result holds the
/// reconstructed rows.
pub(crate) fn unfilter_image(
    input: &[u8],
    h: usize,
    linebytes: usize,
    bpp: usize,
) -> Result<Vec<u8>> {
    let bytewidth = bpp.div_ceil(8);
    let mut out = vec![0u8; h * linebytes];

    for y in 0..h {
        let in_start = y * (linebytes + 1);
        let filter = input[in_start];
        let (done, rest) = out.split_at_mut(y * linebytes);
        let recon = &mut rest[..linebytes];
        recon.copy_from_slice(&input[in_start + 1..in_start + 1 + linebytes]);

        let prev = if y == 0 {
            None
        } else {
            Some(&done[(y - 1) * linebytes..])
        };
        unfilter_scanline(recon, prev, bytewidth, filter)?;
    }

    Ok(out)
}
