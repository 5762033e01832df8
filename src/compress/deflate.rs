//! DEFLATE compression (RFC 1951) and the zlib wrapper (RFC 1950).
//!
//! The encoder emits dynamic Huffman blocks only: each block runs LZ77,
//! builds its own literal/length and distance trees with Package-Merge,
//! run-length-compresses the code lengths, and writes the block header
//! followed by the encoded symbol stream.

use crate::bits::BitWriter;
use crate::compress::adler32::adler32;
use crate::compress::huffman::{HuffmanTree, CLCL_ORDER, NUM_CODE_LENGTH_CODES};
use crate::compress::lz77::{encode_lz77, HashChains, Token, MAX_SUPPORTED_DEFLATE_LENGTH};
use crate::compress::CompressSettings;
use crate::error::{Error, Result};

/// Length code base values (codes 257-285).
pub(crate) const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for length codes.
pub(crate) const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance code base values (codes 0-29).
pub(crate) const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance codes.
pub(crate) const DISTANCE_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Smallest DEFLATE block the encoder will produce.
const MIN_BLOCK_SIZE: usize = 65536;
/// Largest DEFLATE block the encoder will produce.
const MAX_BLOCK_SIZE: usize = 262144;

/// Get `(symbol, extra_bits, extra_value)` for a match length.
fn length_code(length: u16) -> (u16, u8, u16) {
    debug_assert!((3..=MAX_SUPPORTED_DEFLATE_LENGTH as u16).contains(&length));

    for (i, &base) in LENGTH_BASE.iter().enumerate() {
        let next_base = if i + 1 < LENGTH_BASE.len() {
            LENGTH_BASE[i + 1]
        } else {
            259
        };
        if length >= base && length < next_base {
            return (257 + i as u16, LENGTH_EXTRA[i], length - base);
        }
    }

    // Length 258.
    (285, 0, 0)
}

/// Get `(symbol, extra_bits, extra_value)` for a match distance.
fn distance_code(distance: u16) -> (u16, u8, u16) {
    debug_assert!(distance >= 1, "invalid distance");

    for (i, &base) in DISTANCE_BASE.iter().enumerate() {
        let next_base = if i + 1 < DISTANCE_BASE.len() {
            DISTANCE_BASE[i + 1] as u32
        } else {
            32769
        };
        if distance >= base && (distance as u32) < next_base {
            return (i as u16, DISTANCE_EXTRA[i], distance - base);
        }
    }

    unreachable!("distance {} outside 1..=32768", distance)
}

/// Run-length-compress the concatenated code lengths with the DEFLATE
/// repeat codes: 16 copies the previous length 3-6 times, 17 encodes
/// 3-10 zeros, 18 encodes 11-138 zeros. The returned stream interleaves
/// each repeat code with its count argument.
fn compress_code_lengths(bitlen_lld: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bitlen_lld.len());
    let mut i = 0;
    while i < bitlen_lld.len() {
        // Number of additional repetitions of bitlen_lld[i].
        let mut j = 0;
        while i + j + 1 < bitlen_lld.len() && bitlen_lld[i + j + 1] == bitlen_lld[i] {
            j += 1;
        }

        if bitlen_lld[i] == 0 && j >= 2 {
            j += 1; // include the first zero
            if j <= 10 {
                out.push(17);
                out.push((j - 3) as u8);
            } else {
                if j > 138 {
                    j = 138;
                }
                out.push(18);
                out.push((j - 11) as u8);
            }
            i += j - 1;
        } else if j >= 3 {
            let num = j / 6;
            let rest = j % 6;
            out.push(bitlen_lld[i]);
            for _ in 0..num {
                out.push(16);
                out.push(6 - 3);
            }
            if rest >= 3 {
                out.push(16);
                out.push((rest - 3) as u8);
            } else {
                j -= rest;
            }
            i += j;
        } else {
            out.push(bitlen_lld[i]);
        }
        i += 1;
    }
    out
}

/// Write the LZ77 token stream with the given trees.
fn write_lz77_data(
    writer: &mut BitWriter,
    tokens: &[Token],
    tree_ll: &HuffmanTree,
    tree_d: &HuffmanTree,
) {
    for &token in tokens {
        match token {
            Token::Literal(byte) => {
                let symbol = byte as usize;
                writer.write_bits_reversed(tree_ll.code(symbol), tree_ll.length(symbol));
            }
            Token::Match { length, distance } => {
                let (len_symbol, len_extra_bits, len_extra_value) = length_code(length);
                writer.write_bits_reversed(
                    tree_ll.code(len_symbol as usize),
                    tree_ll.length(len_symbol as usize),
                );
                if len_extra_bits > 0 {
                    writer.write_bits(len_extra_value as u32, len_extra_bits);
                }

                let (dist_symbol, dist_extra_bits, dist_extra_value) = distance_code(distance);
                writer.write_bits_reversed(
                    tree_d.code(dist_symbol as usize),
                    tree_d.length(dist_symbol as usize),
                );
                if dist_extra_bits > 0 {
                    writer.write_bits(dist_extra_value as u32, dist_extra_bits);
                }
            }
        }
    }
}

/// Emit one dynamic block covering `data[start..end]`.
fn deflate_dynamic_block(
    writer: &mut BitWriter,
    hash: &mut HashChains,
    data: &[u8],
    start: usize,
    end: usize,
    settings: &CompressSettings,
    final_block: bool,
) -> Result<()> {
    let mut tokens = Vec::with_capacity(end - start);
    encode_lz77(&mut tokens, hash, data, start, end, settings)?;

    let mut freq_ll = [0u32; 286];
    let mut freq_d = [0u32; 30];
    for &token in &tokens {
        match token {
            Token::Literal(byte) => freq_ll[byte as usize] += 1,
            Token::Match { length, distance } => {
                freq_ll[length_code(length).0 as usize] += 1;
                freq_d[distance_code(distance).0 as usize] += 1;
            }
        }
    }
    // There will be exactly one end code, at the end of the block.
    freq_ll[256] = 1;

    let tree_ll = HuffmanTree::from_frequencies(&freq_ll, 257, 15)?;
    // A two-symbol minimum accommodates decoders that reject
    // single-symbol distance trees.
    let tree_d = HuffmanTree::from_frequencies(&freq_d, 2, 15)?;

    let numcodes_ll = tree_ll.numcodes().min(286);
    let numcodes_d = tree_d.numcodes().min(30);

    let mut bitlen_lld = Vec::with_capacity(numcodes_ll + numcodes_d);
    for i in 0..numcodes_ll {
        bitlen_lld.push(tree_ll.length(i));
    }
    for i in 0..numcodes_d {
        bitlen_lld.push(tree_d.length(i));
    }

    let bitlen_lld_e = compress_code_lengths(&bitlen_lld);

    let mut freq_cl = [0u32; NUM_CODE_LENGTH_CODES];
    let mut i = 0;
    while i < bitlen_lld_e.len() {
        freq_cl[bitlen_lld_e[i] as usize] += 1;
        // The count argument after a repeat code is not a symbol.
        if bitlen_lld_e[i] >= 16 {
            i += 1;
        }
        i += 1;
    }

    let tree_cl = HuffmanTree::from_frequencies(&freq_cl, NUM_CODE_LENGTH_CODES, 7)?;

    // Trim trailing zeros in the fixed transmission order, but HCLEN
    // cannot go below 4 entries.
    let mut numcodes_cl = NUM_CODE_LENGTH_CODES;
    while numcodes_cl > 4 && tree_cl.length(CLCL_ORDER[numcodes_cl - 1]) == 0 {
        numcodes_cl -= 1;
    }

    writer.write_bits(final_block as u32, 1);
    writer.write_bits(2, 2); // BTYPE: dynamic

    let hlit = (numcodes_ll - 257) as u32;
    let hdist = (numcodes_d - 1) as u32;
    let hclen = (numcodes_cl - 4) as u32;
    writer.write_bits(hlit, 5);
    writer.write_bits(hdist, 5);
    writer.write_bits(hclen, 4);

    for i in 0..numcodes_cl {
        writer.write_bits(tree_cl.length(CLCL_ORDER[i]) as u32, 3);
    }

    let mut i = 0;
    while i < bitlen_lld_e.len() {
        let symbol = bitlen_lld_e[i] as usize;
        writer.write_bits_reversed(tree_cl.code(symbol), tree_cl.length(symbol));
        match symbol {
            16 => {
                i += 1;
                writer.write_bits(bitlen_lld_e[i] as u32, 2);
            }
            17 => {
                i += 1;
                writer.write_bits(bitlen_lld_e[i] as u32, 3);
            }
            18 => {
                i += 1;
                writer.write_bits(bitlen_lld_e[i] as u32, 7);
            }
            _ => {}
        }
        i += 1;
    }

    write_lz77_data(writer, &tokens, &tree_ll, &tree_d);

    if tree_ll.length(256) == 0 {
        return Err(Error::EmptyEndCode);
    }
    writer.write_bits_reversed(tree_ll.code(256), tree_ll.length(256));

    Ok(())
}

/// Compress `data` into a raw DEFLATE stream.
///
/// The input is split into blocks of `clamp(len/8+8, 64K, 256K)` bytes;
/// the final block carries the BFINAL bit. The hash chains persist
/// across blocks so back-references may cross block boundaries.
pub fn deflate(data: &[u8], settings: &CompressSettings) -> Result<Vec<u8>> {
    let blocksize = (data.len() / 8 + 8).clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
    let num_blocks = (data.len().div_ceil(blocksize)).max(1);

    let mut hash = HashChains::new(settings.windowsize)?;
    let mut writer = BitWriter::with_capacity(data.len() / 2 + 64);

    for i in 0..num_blocks {
        let start = i * blocksize;
        let end = (start + blocksize).min(data.len());
        deflate_dynamic_block(
            &mut writer,
            &mut hash,
            data,
            start,
            end,
            settings,
            i == num_blocks - 1,
        )?;
    }

    Ok(writer.finish())
}

/// Compress `data` into a zlib stream: CMF/FLG header, DEFLATE payload,
/// big-endian Adler-32 of the uncompressed input.
pub fn zlib_compress(data: &[u8], settings: &CompressSettings) -> Result<Vec<u8>> {
    // CMF 0x78: compression method 8 with a 32K window; FCHECK makes the
    // 16-bit header divisible by 31, FDICT and FLEVEL stay 0.
    let cmf: u32 = 120;
    let flevel: u32 = 0;
    let fdict: u32 = 0;
    let mut cmfflg: u32 = 256 * cmf + fdict * 32 + flevel * 64;
    let fcheck = 31 - cmfflg % 31;
    cmfflg += fcheck;

    let deflated = deflate(data, settings)?;

    let mut out = Vec::with_capacity(deflated.len() + 6);
    out.push((cmfflg >> 8) as u8);
    out.push((cmfflg & 255) as u8);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&adler32(data).to_be_bytes());
    Ok(out)
}
