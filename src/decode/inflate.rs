//! DEFLATE decompression (RFC 1951) and zlib unwrapping (RFC 1950).

use super::bit_reader::BitReader;
use crate::compress::adler32::adler32;
use crate::compress::deflate::{DISTANCE_BASE, DISTANCE_EXTRA, LENGTH_BASE, LENGTH_EXTRA};
use crate::compress::huffman::{
    fixed_distance_tree, fixed_literal_tree, HuffmanTree, CLCL_ORDER, NUM_CODE_LENGTH_CODES,
    NUM_DEFLATE_CODE_SYMBOLS, NUM_DISTANCE_SYMBOLS,
};
use crate::error::{Error, Result};

/// Settings for zlib decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressSettings {
    /// Verify the Adler-32 trailer against the decompressed data.
    pub check_adler32: bool,
}

impl Default for DecompressSettings {
    fn default() -> Self {
        Self {
            check_adler32: true,
        }
    }
}

/// Decompress a raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 3 + 8);
    inflate_into(data, &mut out)?;
    Ok(out)
}

fn inflate_into(data: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut reader = BitReader::new(data);

    loop {
        let bfinal = reader.read_bits(1)?;
        let btype = reader.read_bits(2)?;

        match btype {
            0 => inflate_stored(&mut reader, out)?,
            1 => inflate_huffman_block(
                &mut reader,
                out,
                fixed_literal_tree(),
                fixed_distance_tree(),
            )?,
            2 => {
                let (tree_ll, tree_d) = read_dynamic_trees(&mut reader)?;
                inflate_huffman_block(&mut reader, out, &tree_ll, &tree_d)?;
            }
            _ => return Err(Error::InvalidBlockType),
        }

        if bfinal == 1 {
            break;
        }
    }

    Ok(())
}

/// Stored block: byte-align, LEN and its complement, then raw bytes.
fn inflate_stored(reader: &mut BitReader, out: &mut Vec<u8>) -> Result<()> {
    reader.align_to_byte();

    let len = reader.read_bits(16)? as usize;
    let nlen = reader.read_bits(16)? as usize;
    if len + nlen != 65535 {
        return Err(Error::NlenMismatch);
    }

    let start = out.len();
    out.resize(start + len, 0);
    reader.read_bytes(&mut out[start..])?;
    Ok(())
}

/// Read the code-length-encoded literal/length and distance trees of a
/// dynamic block.
fn read_dynamic_trees(reader: &mut BitReader) -> Result<(HuffmanTree, HuffmanTree)> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;
    if hlit > 286 || hdist > 30 {
        return Err(Error::DynamicTreeBitsOutOfRange);
    }

    let mut bitlen_cl = [0u8; NUM_CODE_LENGTH_CODES];
    for i in 0..hclen {
        bitlen_cl[CLCL_ORDER[i]] = reader.read_bits(3)? as u8;
    }
    let tree_cl = HuffmanTree::from_lengths(&bitlen_cl, 7)?;

    let mut bitlen_ll = [0u8; NUM_DEFLATE_CODE_SYMBOLS];
    let mut bitlen_d = [0u8; 32];
    fn set(bitlen_ll: &mut [u8], bitlen_d: &mut [u8], hlit: usize, idx: usize, value: u8) {
        if idx < hlit {
            bitlen_ll[idx] = value;
        } else {
            bitlen_d[idx - hlit] = value;
        }
    }

    let total = hlit + hdist;
    let mut i = 0;
    while i < total {
        let code = tree_cl.decode_symbol(reader)?;
        match code {
            0..=15 => {
                set(&mut bitlen_ll, &mut bitlen_d, hlit, i, code as u8);
                i += 1;
            }
            16 => {
                if i == 0 {
                    return Err(Error::DynamicTreeRepeatWithoutPrev);
                }
                let replength = 3 + reader.read_bits(2)? as usize;
                let value = if i <= hlit {
                    bitlen_ll[i - 1]
                } else {
                    bitlen_d[i - hlit - 1]
                };
                if i + replength > total {
                    return Err(Error::DynamicTreeOverflow);
                }
                for _ in 0..replength {
                    set(&mut bitlen_ll, &mut bitlen_d, hlit, i, value);
                    i += 1;
                }
            }
            17 => {
                let replength = 3 + reader.read_bits(3)? as usize;
                if i + replength > total {
                    return Err(Error::DynamicTreeOverflow);
                }
                i += replength;
            }
            18 => {
                let replength = 11 + reader.read_bits(7)? as usize;
                if i + replength > total {
                    return Err(Error::DynamicTreeOverflow);
                }
                i += replength;
            }
            _ => return Err(Error::DynamicTreeBitsOutOfRange),
        }
    }

    if bitlen_ll[256] == 0 {
        return Err(Error::EmptyEndCode);
    }

    let tree_ll = HuffmanTree::from_lengths(&bitlen_ll, 15)?;
    let tree_d = HuffmanTree::from_lengths(&bitlen_d[..NUM_DISTANCE_SYMBOLS], 15)?;
    Ok((tree_ll, tree_d))
}

/// Decode one compressed block with the given trees.
fn inflate_huffman_block(
    reader: &mut BitReader,
    out: &mut Vec<u8>,
    tree_ll: &HuffmanTree,
    tree_d: &HuffmanTree,
) -> Result<()> {
    loop {
        let symbol = tree_ll.decode_symbol(reader)?;
        match symbol {
            0..=255 => out.push(symbol as u8),
            256 => break,
            257..=285 => {
                let len_idx = (symbol - 257) as usize;
                let length = LENGTH_BASE[len_idx] as usize
                    + reader.read_bits(LENGTH_EXTRA[len_idx])? as usize;

                let dist_symbol = tree_d.decode_symbol(reader)?;
                if dist_symbol > 29 {
                    return Err(Error::InvalidDistanceCode);
                }
                let dist_idx = dist_symbol as usize;
                let distance = DISTANCE_BASE[dist_idx] as usize
                    + reader.read_bits(DISTANCE_EXTRA[dist_idx])? as usize;

                if distance > out.len() {
                    return Err(Error::DistanceTooFarBack);
                }

                let start = out.len() - distance;
                if distance < length {
                    // Overlapping copy must proceed byte by byte.
                    for i in 0..length {
                        let byte = out[start + i];
                        out.push(byte);
                    }
                } else {
                    out.extend_from_within(start..start + length);
                }
            }
            _ => return Err(Error::InvalidSymbol),
        }
    }
    Ok(())
}

/// Decompress a zlib stream: validate the 2-byte header, inflate the
/// payload, optionally verify the Adler-32 trailer.
pub fn zlib_decompress(data: &[u8], settings: &DecompressSettings) -> Result<Vec<u8>> {
    if data.len() < 6 {
        return Err(Error::ZlibTooSmall);
    }

    let cmf = data[0] as u32;
    let flg = data[1] as u32;
    if (cmf * 256 + flg) % 31 != 0 {
        return Err(Error::BadFcheck);
    }
    if cmf & 0x0F != 8 || (cmf >> 4) > 7 {
        return Err(Error::UnsupportedCmCinfo);
    }
    if flg & 0x20 != 0 {
        return Err(Error::PresetDictNotAllowed);
    }

    let out = inflate(&data[2..data.len() - 4])?;

    if settings.check_adler32 {
        let stored = u32::from_be_bytes(data[data.len() - 4..].try_into().unwrap());
        let computed = adler32(&out);
        if stored != computed {
            return Err(Error::AdlerMismatch { stored, computed });
        }
    }

    Ok(out)
}
