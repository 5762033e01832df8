//! Huffman code tables for DEFLATE.
//!
//! One structure serves both directions: the encoder looks up canonical
//! `(code, length)` pairs per symbol, the decoder walks a flattened
//! binary trie one bit at a time.

use std::sync::LazyLock;

use crate::compress::package_merge::length_limited_code_lengths;
use crate::decode::bit_reader::BitReader;
use crate::error::{Error, Result};

/// Number of symbols in the literal/length alphabet (including the two
/// reserved codes 286 and 287).
pub const NUM_DEFLATE_CODE_SYMBOLS: usize = 288;
/// Number of symbols in the distance alphabet.
pub const NUM_DISTANCE_SYMBOLS: usize = 30;
/// Number of symbols in the code-length alphabet.
pub const NUM_CODE_LENGTH_CODES: usize = 19;

/// Order in which the code-length alphabet's own code lengths are stored
/// in a dynamic block header.
pub const CLCL_ORDER: [usize; NUM_CODE_LENGTH_CODES] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Sentinel for an unfilled trie cell during construction.
const UNFILLED: u32 = 32767;

/// A canonical Huffman code table.
pub struct HuffmanTree {
    /// Code length per symbol; 0 means the symbol is absent.
    lengths: Vec<u8>,
    /// Canonical code bits per symbol, high-order bit first.
    codes: Vec<u32>,
    /// Flattened binary trie for decoding: cell values below `numcodes`
    /// are leaf symbols, values at or above it point to the internal
    /// node `value - numcodes`.
    tree2d: Vec<u32>,
    numcodes: usize,
}

impl HuffmanTree {
    /// Build a tree from explicit code lengths (RFC 1951 §3.2.2).
    pub fn from_lengths(lengths: &[u8], maxbitlen: u32) -> Result<Self> {
        let numcodes = lengths.len();
        let mut tree = HuffmanTree {
            lengths: lengths.to_vec(),
            codes: vec![0; numcodes],
            tree2d: Vec::new(),
            numcodes,
        };
        tree.assign_canonical_codes(maxbitlen);
        tree.build_decode_trie()?;
        Ok(tree)
    }

    /// Build a tree from symbol frequencies using Package-Merge.
    ///
    /// Trailing zero-frequency symbols are trimmed, but never below
    /// `mincodes` symbols.
    pub fn from_frequencies(
        frequencies: &[u32],
        mincodes: usize,
        maxbitlen: u32,
    ) -> Result<Self> {
        let mut numcodes = frequencies.len();
        while numcodes > mincodes && frequencies[numcodes - 1] == 0 {
            numcodes -= 1;
        }
        let lengths = length_limited_code_lengths(&frequencies[..numcodes], maxbitlen)?;
        Self::from_lengths(&lengths, maxbitlen)
    }

    /// Number of symbols in this alphabet instance.
    pub fn numcodes(&self) -> usize {
        self.numcodes
    }

    /// The canonical code bits of `symbol` (high-order bit first).
    #[inline]
    pub fn code(&self, symbol: usize) -> u32 {
        self.codes[symbol]
    }

    /// The code length of `symbol`; 0 if the symbol is absent.
    #[inline]
    pub fn length(&self, symbol: usize) -> u8 {
        self.lengths[symbol]
    }

    /// Assign canonical codes: count lengths, derive the first code of
    /// each length, then hand out codes in symbol order.
    fn assign_canonical_codes(&mut self, maxbitlen: u32) {
        let maxbitlen = maxbitlen as usize;
        let mut bl_count = vec![0u32; maxbitlen + 1];
        for &len in &self.lengths {
            bl_count[len as usize] += 1;
        }

        let mut next_code = vec![0u32; maxbitlen + 1];
        for bits in 1..=maxbitlen {
            next_code[bits] = (next_code[bits - 1] + bl_count[bits - 1]) << 1;
        }

        for (symbol, &len) in self.lengths.iter().enumerate() {
            if len > 0 {
                self.codes[symbol] = next_code[len as usize] & ((1u32 << len) - 1);
                next_code[len as usize] += 1;
            }
        }
    }

    /// Convert the codes into the flattened 2-D trie used for decoding.
    ///
    /// A well-formed tree uses at most `numcodes - 1` internal nodes;
    /// needing more means the lengths oversubscribe the code space.
    fn build_decode_trie(&mut self) -> Result<()> {
        self.tree2d = vec![UNFILLED; self.numcodes * 2];

        let mut nodefilled = 0u32;
        let mut treepos = 0usize;

        for symbol in 0..self.numcodes {
            let len = self.lengths[symbol] as usize;
            for i in 0..len {
                let bit = ((self.codes[symbol] >> (len - i - 1)) & 1) as usize;
                if treepos + 2 > self.numcodes {
                    return Err(Error::HuffmanOversubscribed);
                }
                let cell = 2 * treepos + bit;
                if self.tree2d[cell] == UNFILLED {
                    if i + 1 == len {
                        self.tree2d[cell] = symbol as u32;
                        treepos = 0;
                    } else {
                        nodefilled += 1;
                        self.tree2d[cell] = nodefilled + self.numcodes as u32;
                        treepos = nodefilled as usize;
                    }
                } else {
                    treepos = (self.tree2d[cell] - self.numcodes as u32) as usize;
                }
            }
        }

        for cell in &mut self.tree2d {
            if *cell == UNFILLED {
                *cell = 0;
            }
        }
        Ok(())
    }

    /// Decode one symbol by walking the trie, one bit per step.
    #[inline]
    pub fn decode_symbol(&self, reader: &mut BitReader) -> Result<u32> {
        let mut treepos = 0usize;
        loop {
            let bit = reader
                .read_bits(1)
                .map_err(|_| Error::HuffmanOutOfInput)? as usize;
            let ct = self.tree2d[(treepos << 1) | bit];
            if (ct as usize) < self.numcodes {
                return Ok(ct);
            }
            treepos = (ct as usize) - self.numcodes;
            if treepos >= self.numcodes {
                return Err(Error::HuffmanJumpOutsideTree);
            }
        }
    }
}

/// The fixed literal/length code lengths of RFC 1951 §3.2.6.
fn fixed_literal_lengths() -> Vec<u8> {
    let mut lengths = vec![0u8; NUM_DEFLATE_CODE_SYMBOLS];
    for (i, len) in lengths.iter_mut().enumerate() {
        *len = match i {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8,
        };
    }
    lengths
}

static FIXED_LITERAL_TREE: LazyLock<HuffmanTree> = LazyLock::new(|| {
    HuffmanTree::from_lengths(&fixed_literal_lengths(), 15)
        .expect("fixed literal tree is well-formed")
});

static FIXED_DISTANCE_TREE: LazyLock<HuffmanTree> = LazyLock::new(|| {
    // All 32 distance symbols use 5 bits (symbols 30 and 31 are reserved
    // but participate in the code space).
    HuffmanTree::from_lengths(&[5u8; 32], 15).expect("fixed distance tree is well-formed")
});

/// The fixed literal/length tree, built once.
#[inline]
pub fn fixed_literal_tree() -> &'static HuffmanTree {
    &FIXED_LITERAL_TREE
}

/// The fixed distance tree, built once.
#[inline]
pub fn fixed_distance_tree() -> &'static HuffmanTree {
    &FIXED_DISTANCE_TREE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_codes_rfc_example() {
        // The example from RFC 1951 §3.2.2: lengths (3,3,3,3,3,2,4,4)
        // produce codes 010..111, 00, 1110, 1111.
        let lengths = [3u8, 3, 3, 3, 3, 2, 4, 4];
        let tree = HuffmanTree::from_lengths(&lengths, 15).unwrap();

        assert_eq!(tree.code(0), 0b010);
        assert_eq!(tree.code(1), 0b011);
        assert_eq!(tree.code(2), 0b100);
        assert_eq!(tree.code(3), 0b101);
        assert_eq!(tree.code(4), 0b110);
        assert_eq!(tree.code(5), 0b00);
        assert_eq!(tree.code(6), 0b1110);
        assert_eq!(tree.code(7), 0b1111);
    }

    #[test]
    fn test_prefix_free() {
        let lengths = [2u8, 3, 3, 2, 3, 3];
        let tree = HuffmanTree::from_lengths(&lengths, 15).unwrap();

        for i in 0..lengths.len() {
            for j in (i + 1)..lengths.len() {
                let min_len = tree.length(i).min(tree.length(j));
                let prefix_i = tree.code(i) >> (tree.length(i) - min_len);
                let prefix_j = tree.code(j) >> (tree.length(j) - min_len);
                assert_ne!(prefix_i, prefix_j, "codes {} and {} share a prefix", i, j);
            }
        }
    }

    #[test]
    fn test_oversubscribed_lengths_rejected() {
        // Three codes of length 1 cannot coexist.
        let lengths = [1u8, 1, 1];
        assert_eq!(
            HuffmanTree::from_lengths(&lengths, 15).err(),
            Some(Error::HuffmanOversubscribed)
        );
    }

    #[test]
    fn test_decode_symbol_roundtrip() {
        use crate::bits::BitWriter;

        let lengths = [2u8, 2, 2, 2];
        let tree = HuffmanTree::from_lengths(&lengths, 15).unwrap();

        let mut writer = BitWriter::new();
        for symbol in [3usize, 0, 2, 1, 1, 3] {
            writer.write_bits_reversed(tree.code(symbol), tree.length(symbol));
        }
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        for expected in [3u32, 0, 2, 1, 1, 3] {
            assert_eq!(tree.decode_symbol(&mut reader).unwrap(), expected);
        }
    }

    #[test]
    fn test_decode_out_of_input() {
        let lengths = [3u8, 3, 3, 3, 3, 3, 3, 3];
        let tree = HuffmanTree::from_lengths(&lengths, 15).unwrap();
        let mut reader = BitReader::new(&[0b101]);
        // One byte holds two full symbols plus two dangling bits.
        tree.decode_symbol(&mut reader).unwrap();
        tree.decode_symbol(&mut reader).unwrap();
        assert_eq!(
            tree.decode_symbol(&mut reader),
            Err(Error::HuffmanOutOfInput)
        );
    }

    #[test]
    fn test_fixed_literal_tree_lengths() {
        let tree = fixed_literal_tree();
        assert_eq!(tree.numcodes(), 288);
        assert_eq!(tree.length(0), 8);
        assert_eq!(tree.length(143), 8);
        assert_eq!(tree.length(144), 9);
        assert_eq!(tree.length(255), 9);
        assert_eq!(tree.length(256), 7);
        assert_eq!(tree.length(279), 7);
        assert_eq!(tree.length(280), 8);
        assert_eq!(tree.length(287), 8);
    }

    #[test]
    fn test_fixed_distance_tree_lengths() {
        let tree = fixed_distance_tree();
        assert_eq!(tree.numcodes(), 32);
        for symbol in 0..32 {
            assert_eq!(tree.length(symbol), 5);
        }
    }

    #[test]
    fn test_from_frequencies_trims_but_keeps_mincodes() {
        let mut freqs = vec![0u32; 286];
        freqs[65] = 10;
        freqs[66] = 3;
        freqs[256] = 1;
        let tree = HuffmanTree::from_frequencies(&freqs, 257, 15).unwrap();
        assert_eq!(tree.numcodes(), 257);
        assert!(tree.length(65) > 0);
        assert!(tree.length(256) > 0);
    }
}
