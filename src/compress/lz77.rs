//! LZ77 match finding over a circular sliding window.
//!
//! The match finder keeps two chain sets per window position: the
//! primary chains keyed by a 3-byte hash, and secondary chains keyed by
//! the length of the zero run starting at a position. Filtered PNG data
//! is dominated by zero bytes, and the zero chains let the search skip
//! directly to candidates with a matching run length.

use crate::compress::CompressSettings;
use crate::error::{Error, Result};

/// Maximum length of a DEFLATE match.
pub const MAX_SUPPORTED_DEFLATE_LENGTH: usize = 258;

/// Number of hash buckets.
const HASH_NUM_VALUES: usize = 1 << 16;
const HASH_BIT_MASK: u32 = 0xFFFF;

/// LZ77 output symbol: an uncompressed byte or a back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Uncompressed byte.
    Literal(u8),
    /// Back-reference match.
    Match {
        /// Match length (3-258).
        length: u16,
        /// Backward distance to the match (1-32768).
        distance: u16,
    },
}

/// Hash chains over a circular window.
///
/// `head[hash]` is the most recent window position inserted under a hash
/// (-1 if none); `chain[wpos]` links to the previous occurrence, with
/// `chain[wpos] == wpos` terminating the chain. `val[wpos]` remembers
/// which hash a slot was inserted under so stale slots can be detected.
/// The z-variants are the zero-run chains keyed by run length.
pub struct HashChains {
    head: Vec<i32>,
    chain: Vec<u16>,
    val: Vec<i32>,
    headz: Vec<i32>,
    chainz: Vec<u16>,
    zeros: Vec<u16>,
    windowsize: usize,
}

impl HashChains {
    /// Allocate chains for the given window size.
    pub fn new(windowsize: usize) -> Result<Self> {
        if windowsize == 0 || windowsize > 32768 {
            return Err(Error::WindowOutOfRange(windowsize));
        }
        if !windowsize.is_power_of_two() {
            return Err(Error::WindowNotPowerOfTwo(windowsize));
        }
        Ok(Self {
            head: vec![-1; HASH_NUM_VALUES],
            chain: (0..windowsize as u16).collect(),
            val: vec![-1; windowsize],
            headz: vec![-1; MAX_SUPPORTED_DEFLATE_LENGTH + 1],
            chainz: (0..windowsize as u16).collect(),
            zeros: vec![0; windowsize],
            windowsize,
        })
    }

    #[inline]
    fn update(&mut self, wpos: usize, hashval: u32, numzeros: u16) {
        self.val[wpos] = hashval as i32;
        if self.head[hashval as usize] != -1 {
            self.chain[wpos] = self.head[hashval as usize] as u16;
        }
        self.head[hashval as usize] = wpos as i32;

        self.zeros[wpos] = numzeros;
        if self.headz[numzeros as usize] != -1 {
            self.chainz[wpos] = self.headz[numzeros as usize] as u16;
        }
        self.headz[numzeros as usize] = wpos as i32;
    }
}

/// Shift-xor hash of the 3 bytes at `pos`. Filtered PNG data is mostly
/// zeros, so a stronger hash would cost more than it saves.
#[inline]
fn get_hash(data: &[u8], pos: usize) -> u32 {
    let mut result: u32 = 0;
    if pos + 2 < data.len() {
        result ^= data[pos] as u32;
        result ^= (data[pos + 1] as u32) << 4;
        result ^= (data[pos + 2] as u32) << 8;
    } else {
        if pos >= data.len() {
            return 0;
        }
        for (i, &b) in data[pos..].iter().enumerate() {
            result ^= (b as u32) << (i as u32 * 4);
        }
    }
    result & HASH_BIT_MASK
}

/// Count zero bytes starting at `pos`, capped at the maximum match length.
#[inline]
fn count_zeros(data: &[u8], pos: usize) -> u16 {
    let end = (pos + MAX_SUPPORTED_DEFLATE_LENGTH).min(data.len());
    let mut count = 0;
    for &b in &data[pos..end] {
        if b != 0 {
            break;
        }
        count += 1;
    }
    count
}

/// Incrementally maintain the zero-run count when advancing one byte.
#[inline]
fn update_zeros(data: &[u8], pos: usize, hashval: u32, numzeros: &mut u16) {
    if hashval == 0 {
        if *numzeros == 0 {
            *numzeros = count_zeros(data, pos);
        } else if pos + *numzeros as usize > data.len()
            || data[pos + *numzeros as usize - 1] != 0
        {
            *numzeros -= 1;
        }
    } else {
        *numzeros = 0;
    }
}

/// Run LZ77 over `data[inpos..inend]`, appending tokens to `out`.
///
/// The hash chains carry over between consecutive calls within one
/// deflate run, so matches may reach back across block boundaries.
pub fn encode_lz77(
    out: &mut Vec<Token>,
    hash: &mut HashChains,
    data: &[u8],
    inpos: usize,
    inend: usize,
    settings: &CompressSettings,
) -> Result<()> {
    // Hashes and matches must not look past the block end; positions
    // before `inpos` stay addressable for back-references.
    let data = &data[..inend];
    let windowsize = hash.windowsize;
    let wmask = windowsize - 1;
    let nicematch = settings.nicematch.min(MAX_SUPPORTED_DEFLATE_LENGTH);

    // For large windows assume the caller wants no compression loss;
    // small windows cap the chain walk for speed.
    let maxchainlength = if windowsize >= 8192 {
        windowsize
    } else {
        windowsize / 8
    };
    let maxlazymatch = if windowsize >= 8192 {
        MAX_SUPPORTED_DEFLATE_LENGTH
    } else {
        64
    };

    let mut numzeros: u16 = 0;
    let mut lazy = false;
    let mut lazylength: usize = 0;
    let mut lazyoffset: usize = 0;

    let mut pos = inpos;
    while pos < data.len() {
        let wpos = pos & wmask;
        let hashval = get_hash(data, pos);
        update_zeros(data, pos, hashval, &mut numzeros);
        hash.update(wpos, hashval, numzeros);

        let mut length: usize = 0;
        let mut offset: usize = 0;

        let max_len = (data.len() - pos).min(MAX_SUPPORTED_DEFLATE_LENGTH);
        let mut hashpos = hash.chain[wpos] as usize;
        let mut prev_offset: usize = 0;
        let mut chainlength = 0;

        loop {
            if chainlength >= maxchainlength {
                break;
            }
            chainlength += 1;

            let current_offset = if hashpos <= wpos {
                wpos - hashpos
            } else {
                wpos - hashpos + windowsize
            };
            // A smaller offset than before means the walk wrapped all the
            // way around the circular window.
            if current_offset < prev_offset {
                break;
            }
            prev_offset = current_offset;

            if current_offset > 0 {
                let back = pos - current_offset;
                // Zero runs on both sides are equal up to the shorter run,
                // so start the comparison past them.
                let mut current_length = if numzeros >= 3 {
                    (hash.zeros[hashpos] as usize).min(numzeros as usize)
                } else {
                    0
                };
                while current_length < max_len
                    && data[back + current_length] == data[pos + current_length]
                {
                    current_length += 1;
                }

                if current_length > length {
                    length = current_length;
                    offset = current_offset;
                    if current_length >= nicematch {
                        break;
                    }
                }
            }

            if hashpos == hash.chain[hashpos] as usize {
                break;
            }

            if numzeros >= 3 && length > numzeros as usize {
                hashpos = hash.chainz[hashpos] as usize;
                if hash.zeros[hashpos] != numzeros {
                    break;
                }
            } else {
                hashpos = hash.chain[hashpos] as usize;
                // Stale slot: this window position was last inserted
                // under a different hash.
                if hash.val[hashpos] != hashval as i32 {
                    break;
                }
            }
        }

        if settings.lazymatching {
            if !lazy
                && length >= 3
                && length <= maxlazymatch
                && length < MAX_SUPPORTED_DEFLATE_LENGTH
            {
                lazy = true;
                lazylength = length;
                lazyoffset = offset;
                pos += 1;
                continue;
            }
            if lazy {
                lazy = false;
                if pos == 0 {
                    return Err(Error::Lz77LazyAtStart);
                }
                if length > lazylength + 1 {
                    // The next position found a longer match: the held
                    // byte goes out as a literal.
                    out.push(Token::Literal(data[pos - 1]));
                } else {
                    length = lazylength;
                    offset = lazyoffset;
                    // The same chain update will happen again after the
                    // position moves back, so cancel this one.
                    hash.head[hashval as usize] = -1;
                    hash.headz[numzeros as usize] = -1;
                    pos -= 1;
                }
            }
        }

        if length >= 3 && offset > windowsize {
            return Err(Error::Lz77InvalidOffset);
        }

        if length < 3 || length < settings.minmatch || (length == 3 && offset > 4096) {
            // A 3-byte match at a large distance costs more in extra
            // distance bits than the literal it would save.
            out.push(Token::Literal(data[pos]));
        } else {
            out.push(Token::Match {
                length: length as u16,
                distance: offset as u16,
            });
            // Keep every skipped position discoverable for future matches.
            for _ in 1..length {
                pos += 1;
                let wpos = pos & wmask;
                let hashval = get_hash(data, pos);
                update_zeros(data, pos, hashval, &mut numzeros);
                hash.update(wpos, hashval, numzeros);
            }
        }

        pos += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CompressSettings {
        CompressSettings::default()
    }

    fn run(data: &[u8]) -> Vec<Token> {
        let settings = settings();
        let mut hash = HashChains::new(settings.windowsize).unwrap();
        let mut out = Vec::new();
        encode_lz77(&mut out, &mut hash, data, 0, data.len(), &settings).unwrap();
        out
    }

    /// Reconstruct the input from a token stream.
    fn expand(tokens: &[Token]) -> Vec<u8> {
        let mut out = Vec::new();
        for &token in tokens {
            match token {
                Token::Literal(b) => out.push(b),
                Token::Match { length, distance } => {
                    let start = out.len() - distance as usize;
                    for i in 0..length as usize {
                        let b = out[start + i];
                        out.push(b);
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_no_matches() {
        let data = b"abcdefgh";
        let tokens = run(data);
        assert_eq!(tokens.len(), 8);
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_simple_repeat() {
        let data = b"abcabcabcabc";
        let tokens = run(data);
        assert!(tokens.len() < data.len());
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_zero_run_uses_long_match() {
        let data = vec![0u8; 1000];
        let tokens = run(&data);
        assert!(
            tokens.len() <= 1 + 1000 / 250,
            "zero run should collapse into a few matches, got {} tokens",
            tokens.len()
        );
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_zeros_then_tail() {
        let mut data = vec![0u8; 300];
        data.extend_from_slice(b"tail");
        let tokens = run(&data);
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_mixed_content_roundtrip() {
        let mut data = Vec::new();
        for i in 0u32..5000 {
            data.push((i.wrapping_mul(2654435761) >> 13) as u8 % 17);
        }
        let tokens = run(&data);
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_window_validation() {
        assert_eq!(
            HashChains::new(0).err(),
            Some(Error::WindowOutOfRange(0))
        );
        assert_eq!(
            HashChains::new(65536).err(),
            Some(Error::WindowOutOfRange(65536))
        );
        assert_eq!(
            HashChains::new(3000).err(),
            Some(Error::WindowNotPowerOfTwo(3000))
        );
        assert!(HashChains::new(32768).is_ok());
    }

    #[test]
    fn test_matches_do_not_exceed_window() {
        let settings = CompressSettings {
            windowsize: 1024,
            ..CompressSettings::default()
        };
        let mut data = b"needle".to_vec();
        data.extend(std::iter::repeat(b'x').take(5000));
        data.extend_from_slice(b"needle");

        let mut hash = HashChains::new(settings.windowsize).unwrap();
        let mut out = Vec::new();
        encode_lz77(&mut out, &mut hash, &data, 0, data.len(), &settings).unwrap();
        for token in &out {
            if let Token::Match { distance, .. } = token {
                assert!((*distance as usize) <= settings.windowsize);
            }
        }
        assert_eq!(expand(&out), data);
    }

    #[test]
    fn test_lazy_matching_still_lossless() {
        // Data designed so a longer match starts one byte later.
        let mut data = Vec::new();
        data.extend_from_slice(b"aabcde");
        data.extend_from_slice(b"abcdefgh");
        data.extend_from_slice(b"aabcdefgh");
        let tokens = run(&data);
        assert_eq!(expand(&tokens), data);
    }
}
