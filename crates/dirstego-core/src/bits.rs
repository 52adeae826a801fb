//! Bit codec (C1): conversions between unsigned integers, bytes, and bit
//! sequences. All multi-bit values are MSB-first: bit 0 of a sequence is the
//! most significant bit of the integer it represents.

use crate::error::{Result, StegoError};

/// Returns the smallest positive `k` such that `n` fits in `k` bits.
///
/// `reserve_bits(0) == 1` by convention (there is no such thing as a
/// zero-bit field).
pub fn reserve_bits(n: u64) -> u32 {
    if n == 0 {
        1
    } else {
        64 - n.leading_zeros()
    }
}

/// Encodes `n` as exactly `width` bits, MSB-first.
///
/// Fails if `n` does not fit in `width` bits.
pub fn encode_uint(n: u64, width: u32) -> Result<Vec<bool>> {
    if width < 64 && n >= (1u64 << width) {
        return Err(StegoError::CapacityExceeded(format!(
            "{n} does not fit in {width} bits"
        )));
    }
    Ok((0..width).map(|i| (n >> (width - 1 - i)) & 1 == 1).collect())
}

/// Decodes a bit sequence as an unsigned integer, MSB-first.
///
/// The length is not bounded by this function; callers that need a `u64`
/// result must ensure `bits.len() <= 64`.
pub fn decode_uint(bits: &[bool]) -> u64 {
    bits.iter().fold(0u64, |acc, &b| (acc << 1) | b as u64)
}

/// Emits each byte MSB-first as 8 bits.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits
}

/// Packs a bit sequence (MSB-first within each byte) back into bytes.
///
/// Fails if the length is not a multiple of 8.
pub fn bits_to_bytes(bits: &[bool]) -> Result<Vec<u8>> {
    if bits.len() % 8 != 0 {
        return Err(StegoError::CorruptPayload(format!(
            "bit length {} is not a multiple of 8",
            bits.len()
        )));
    }
    Ok(bits
        .chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_bits_matches_spec_examples() {
        assert_eq!(reserve_bits(0), 1);
        assert_eq!(reserve_bits(1), 1);
        assert_eq!(reserve_bits(2), 2);
        assert_eq!(reserve_bits(3), 2);
        assert_eq!(reserve_bits(4), 3);
        assert_eq!(reserve_bits(255), 8);
        assert_eq!(reserve_bits(256), 9);
        assert_eq!(reserve_bits(u64::MAX), 64);
    }

    #[test]
    fn uint_round_trip_over_widths() {
        for n in [0u64, 1, 2, 17, 255, 256, 65535, 1 << 40] {
            let width = reserve_bits(n);
            for extra in 0..3 {
                let w = width + extra;
                let bits = encode_uint(n, w).unwrap();
                assert_eq!(bits.len() as u32, w);
                assert_eq!(decode_uint(&bits), n);
            }
        }
    }

    #[test]
    fn encode_uint_rejects_overflow() {
        assert!(encode_uint(256, 8).is_err());
        assert!(encode_uint(255, 8).is_ok());
    }

    #[test]
    fn bytes_bits_round_trip() {
        let data = b"hi\n\0\xff".to_vec();
        let bits = bytes_to_bits(&data);
        assert_eq!(bits.len(), data.len() * 8);
        assert_eq!(bits_to_bytes(&bits).unwrap(), data);
    }

    #[test]
    fn bits_to_bytes_rejects_non_byte_aligned_length() {
        let bits = vec![true, false, true];
        assert!(bits_to_bytes(&bits).is_err());
    }
}
