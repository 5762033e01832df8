//! Adler-32 checksum (RFC 1950) for the zlib wrapper.

const MOD_ADLER: u32 = 65_521;

/// Largest number of bytes that can be summed before the 32-bit
/// accumulators must be reduced modulo 65521.
const NMAX: usize = 5552;

/// Calculate the Adler-32 checksum of `data`.
///
/// Modulo reductions are deferred to chunk boundaries of NMAX bytes.
#[inline]
pub fn adler32(data: &[u8]) -> u32 {
    update_adler32(1, data)
}

/// Continue an Adler-32 computation from a previous checksum value.
///
/// `adler32(data)` equals folding `update_adler32` over any partition
/// of `data`, starting from the initial value 1.
pub fn update_adler32(adler: u32, data: &[u8]) -> u32 {
    let mut s1 = adler & 0xFFFF;
    let mut s2 = (adler >> 16) & 0xFFFF;

    for chunk in data.chunks(NMAX) {
        for &b in chunk {
            s1 += b as u32;
            s2 += s1;
        }
        s1 %= MOD_ADLER;
        s2 %= MOD_ADLER;
    }

    (s2 << 16) | s1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler32_empty() {
        assert_eq!(adler32(&[]), 1);
    }

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(adler32(b"hello"), 0x062C0215);
        assert_eq!(adler32(b"Adler-32"), 0x0C34027B);
        assert_eq!(adler32(b"123456789"), 0x091E01DE);
    }

    #[test]
    fn test_adler32_chunking_independence() {
        let data: Vec<u8> = (0..20000).map(|i| (i * 7 % 256) as u8).collect();
        let full = adler32(&data);

        for split in [1, 100, 5551, 5552, 5553, 19999] {
            let partial = update_adler32(1, &data[..split]);
            let combined = update_adler32(partial, &data[split..]);
            assert_eq!(combined, full, "split at {split}");
        }
    }
}
