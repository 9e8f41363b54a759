//! Byte <-> bit conversion and streaming delimiter detection.
//!
//! Bits are plain `bool`s, most significant bit of each byte first.

/// Expand bytes into bits, MSB first.
pub fn to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

/// Pack bits back into bytes. A trailing group of fewer than 8 bits is dropped.
pub fn from_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|byte| byte.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
        .collect()
}

/// Streaming matcher that reports when the most recent bits equal a delimiter.
///
/// Keeps a sliding window of the last `delimiter.len()` bits, so the check is
/// O(1) per pushed bit no matter how long the scan runs.
#[derive(Debug, Clone)]
pub struct DelimiterScanner {
    target: u128,
    window: u128,
    mask: u128,
    width: usize,
    seen: usize,
}

impl DelimiterScanner {
    /// Create a scanner for `delimiter_bits` (at most 128 bits).
    pub fn new(delimiter_bits: &[bool]) -> Self {
        let width = delimiter_bits.len().min(128);
        let target = delimiter_bits[..width]
            .iter()
            .fold(0u128, |acc, &bit| (acc << 1) | bit as u128);
        let mask = if width == 128 {
            u128::MAX
        } else {
            (1u128 << width) - 1
        };
        Self {
            target,
            window: 0,
            mask,
            width,
            seen: 0,
        }
    }

    /// Feed one bit; returns true when the window now ends with the delimiter.
    pub fn push(&mut self, bit: bool) -> bool {
        self.window = ((self.window << 1) | bit as u128) & self.mask;
        self.seen += 1;
        self.width > 0 && self.seen >= self.width && self.window == self.target
    }

    /// Number of bits in the delimiter.
    pub fn width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_msb_first() {
        assert_eq!(
            to_bits(&[0b1000_0001]),
            vec![true, false, false, false, false, false, false, true]
        );
    }

    #[test]
    fn test_partial_byte_truncated() {
        let mut bits = to_bits(b"AB");
        bits.extend([true, true, true]);
        assert_eq!(from_bits(&bits), b"AB");
        assert!(from_bits(&[true; 7]).is_empty());
    }

    #[test]
    fn test_scanner_finds_delimiter_after_prefix() {
        let delimiter = to_bits(b"###END###");
        let mut scanner = DelimiterScanner::new(&delimiter);
        let stream = to_bits(b"payload###END###trailing");

        let hit = stream.iter().position(|&bit| scanner.push(bit));
        assert_eq!(hit, Some(16 * 8 - 1));
    }

    #[test]
    fn test_scanner_needs_full_window() {
        let mut scanner = DelimiterScanner::new(&[false, false]);
        assert!(!scanner.push(false));
        assert!(scanner.push(false));
    }

    proptest! {
        #[test]
        fn prop_bits_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let bits = to_bits(&bytes);
            prop_assert_eq!(bits.len(), bytes.len() * 8);
            prop_assert_eq!(from_bits(&bits), bytes);
        }
    }
}
