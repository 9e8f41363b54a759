//! Forward error correction for embedded frames
//!
//! A FEC block is `nsym (u16 BE) || RS(frame)`. The frame is split into
//! codewords of `255 - nsym` data symbols, the last one shortened. No length
//! is stored: the decoder walks codewords in order and stops at the first
//! final codeword whose data completes a frame ending in [`DELIMITER`].
//!
//! `nsym == 0` stores the frame verbatim after the prefix.

pub mod rs;

use crate::error::StegoError;
use crate::payload::{find_delimiter, DELIMITER};
use rs::{ReedSolomon, CODEWORD_LEN};

/// Largest parity count that still leaves one data symbol per codeword
pub const MAX_NSYM: usize = CODEWORD_LEN - 1;

/// Parity estimates never go below this
pub const MIN_ESTIMATED_NSYM: usize = 8;

/// Size of the big-endian nsym prefix
pub const PREFIX_LEN: usize = 2;

fn fec_failure(reason: impl Into<String>) -> StegoError {
    StegoError::FecFailure {
        reason: reason.into(),
    }
}

/// Encoded size of `len` frame bytes, excluding the prefix
pub fn encoded_len(len: usize, nsym: usize) -> usize {
    if nsym == 0 {
        return len;
    }
    let data_per_codeword = CODEWORD_LEN - nsym.min(MAX_NSYM);
    len + len.div_ceil(data_per_codeword) * nsym
}

/// Total block size including the prefix
pub fn block_len(len: usize, nsym: usize) -> usize {
    PREFIX_LEN + encoded_len(len, nsym)
}

/// Encode a frame into a FEC block
pub fn encode(frame: &[u8], nsym: usize) -> Result<Vec<u8>, StegoError> {
    if nsym > MAX_NSYM {
        return Err(fec_failure(format!("nsym {nsym} exceeds {MAX_NSYM}")));
    }

    let mut block = Vec::with_capacity(block_len(frame.len(), nsym));
    block.extend_from_slice(&(nsym as u16).to_be_bytes());
    if nsym == 0 {
        block.extend_from_slice(frame);
        return Ok(block);
    }

    let codec = ReedSolomon::new(nsym).map_err(|e| fec_failure(e.to_string()))?;
    for data in frame.chunks(codec.data_len()) {
        let codeword = codec.encode(data).map_err(|e| fec_failure(e.to_string()))?;
        block.extend_from_slice(&codeword);
    }
    Ok(block)
}

/// Values to try for a possibly corrupted prefix, in order
///
/// The prefix as read, then the low byte alone (the high byte is always zero
/// for valid parity counts), then the low byte with each single bit flipped.
/// Zero is only tried last since an unprotected frame cannot be verified.
pub fn prefix_candidates(prefix: [u8; PREFIX_LEN]) -> Vec<usize> {
    let raw = u16::from_be_bytes(prefix) as usize;
    let low = prefix[1];

    let mut ordered = vec![raw, low as usize];
    ordered.extend((0..8).map(|bit| (low ^ (1 << bit)) as usize));

    let mut candidates: Vec<usize> = Vec::with_capacity(ordered.len());
    for nsym in ordered {
        if nsym > 0 && nsym <= MAX_NSYM && !candidates.contains(&nsym) {
            candidates.push(nsym);
        }
    }
    candidates.push(0);
    candidates
}

/// Decode a FEC block (typically the whole LSB plane of an image) back into
/// its frame, delimiter included.
pub fn decode(block: &[u8]) -> Result<Vec<u8>, StegoError> {
    if block.len() < PREFIX_LEN {
        return Err(fec_failure("block shorter than the nsym prefix"));
    }
    let prefix = [block[0], block[1]];
    let body = &block[PREFIX_LEN..];

    let mut last_error = fec_failure("no prefix candidate decoded");
    for nsym in prefix_candidates(prefix) {
        match decode_body(body, nsym) {
            Ok(frame) => {
                tracing::debug!(nsym, frame_len = frame.len(), "decoded FEC block");
                return Ok(frame);
            }
            Err(err) => {
                tracing::debug!(nsym, error = %err, "nsym candidate rejected");
                last_error = err;
            }
        }
    }
    Err(last_error)
}

/// Decode the part of a block after the prefix with a known parity count
pub fn decode_body(body: &[u8], nsym: usize) -> Result<Vec<u8>, StegoError> {
    if nsym == 0 {
        let end = find_delimiter(body).ok_or(StegoError::NoHiddenDataFound)?;
        return Ok(body[..end + DELIMITER.len()].to_vec());
    }

    let codec = ReedSolomon::new(nsym).map_err(|e| fec_failure(e.to_string()))?;
    let walker = CodewordWalker {
        codec: &codec,
        body,
        xor_prefix: xor_prefix(body),
    };
    walker.walk()
}

/// `out[i]` is the XOR of `bytes[..i]`
fn xor_prefix(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(0u8);
    let mut acc = 0u8;
    for &b in bytes {
        acc ^= b;
        out.push(acc);
    }
    out
}

fn completes_frame(accumulated: &[u8], tail: &[u8]) -> bool {
    let total = accumulated.len() + tail.len();
    if total < DELIMITER.len() {
        return false;
    }
    let from_tail = tail.len().min(DELIMITER.len());
    let from_acc = DELIMITER.len() - from_tail;
    tail[tail.len() - from_tail..] == DELIMITER[from_acc..]
        && accumulated[accumulated.len() - from_acc..] == DELIMITER[..from_acc]
}

struct CodewordWalker<'a> {
    codec: &'a ReedSolomon,
    body: &'a [u8],
    xor_prefix: Vec<u8>,
}

impl CodewordWalker<'_> {
    fn walk(&self) -> Result<Vec<u8>, StegoError> {
        let nsym = self.codec.nsym();
        let mut frame = Vec::new();
        let mut pos = 0usize;
        let mut corrected = 0usize;
        // (offset, frame length) of every codeword accepted as full
        let mut full_codewords = Vec::new();

        loop {
            if let Some(tail) = self.clean_final(pos, &frame) {
                frame.extend_from_slice(&tail);
                tracing::debug!(nsym, corrected, "frame end found");
                return Ok(frame);
            }

            let full = self
                .body
                .get(pos..pos + CODEWORD_LEN)
                .and_then(|codeword| self.codec.decode(codeword).ok());
            if let Some((data, fixed)) = full {
                full_codewords.push((pos, frame.len()));
                frame.extend_from_slice(&data);
                corrected += fixed;
                pos += CODEWORD_LEN;
                if frame.ends_with(DELIMITER) {
                    tracing::debug!(nsym, corrected, "frame ends on a full codeword");
                    return Ok(frame);
                }
                continue;
            }

            if let Some((tail, fixed)) = self.corrected_final(pos, &frame) {
                frame.extend_from_slice(&tail);
                tracing::debug!(nsym, corrected = corrected + fixed, "frame end found");
                return Ok(frame);
            }
            break;
        }

        // A damaged final codeword can be mistaken for a full one when the
        // window beyond it happens to decode.
        for &(offset, frame_len) in full_codewords.iter().rev() {
            if let Some((tail, _)) = self.corrected_final(offset, &frame[..frame_len]) {
                let mut recovered = frame[..frame_len].to_vec();
                recovered.extend_from_slice(&tail);
                tracing::debug!(nsym, offset, "frame end found after backtracking");
                return Ok(recovered);
            }
        }

        Err(fec_failure(format!(
            "no final codeword ending in the delimiter (nsym {nsym})"
        )))
    }

    fn final_lengths(&self, pos: usize) -> std::ops::RangeInclusive<usize> {
        let available = self.body.len().saturating_sub(pos + self.codec.nsym());
        1..=available.min(self.codec.data_len())
    }

    /// Uncorrupted final codeword: S_0 (the XOR of all symbols) is checked
    /// first so most lengths cost O(1).
    fn clean_final(&self, pos: usize, frame: &[u8]) -> Option<Vec<u8>> {
        let nsym = self.codec.nsym();
        self.final_lengths(pos).find_map(|data_len| {
            let end = pos + data_len + nsym;
            if self.xor_prefix[end] != self.xor_prefix[pos] {
                return None;
            }
            let data = &self.body[pos..pos + data_len];
            (completes_frame(frame, data) && self.codec.is_codeword(&self.body[pos..end]))
                .then(|| data.to_vec())
        })
    }

    fn corrected_final(&self, pos: usize, frame: &[u8]) -> Option<(Vec<u8>, usize)> {
        let nsym = self.codec.nsym();
        self.final_lengths(pos).find_map(|data_len| {
            let received = &self.body[pos..pos + data_len + nsym];
            self.codec
                .decode(received)
                .ok()
                .filter(|(data, _)| completes_frame(frame, data))
        })
    }
}

/// Parity for an expected corruption rate:
/// `clamp(ceil(2 * len * fraction * safety), 8, MAX_NSYM)`
pub fn estimate_parity(block_len: usize, expected_corrupt_fraction: f64, safety_factor: f64) -> usize {
    let raw = (2.0 * block_len as f64 * expected_corrupt_fraction * safety_factor).ceil();
    if raw.is_nan() || raw <= MIN_ESTIMATED_NSYM as f64 {
        return MIN_ESTIMATED_NSYM;
    }
    (raw as usize).min(MAX_NSYM)
}

/// Parity symbols per codeword for a redundancy percentage
///
/// The percentage applies to one codeword, so frames longer than a codeword
/// are sized against 255 symbols.
pub fn parity_for_percent(pct: u32, combined_len: usize) -> usize {
    let span = combined_len.min(CODEWORD_LEN) as u64;
    let nsym = (pct as u64 * span).div_ceil(100) as usize;
    nsym.min(MAX_NSYM)
}

/// Largest parity count, halving from `desired`, whose block fits in
/// `capacity_bytes`.
pub fn choose_nsym_for_capacity(
    desired: usize,
    combined_len: usize,
    capacity_bytes: usize,
) -> Result<usize, StegoError> {
    let mut nsym = desired.min(MAX_NSYM);
    loop {
        if block_len(combined_len, nsym) <= capacity_bytes {
            if nsym != desired {
                tracing::debug!(desired, chosen = nsym, capacity_bytes, "shrunk parity to fit");
            }
            return Ok(nsym);
        }
        if nsym == 0 {
            return Err(StegoError::CapacityExceeded {
                needed_bits: block_len(combined_len, 0) * 8,
                available_bits: capacity_bytes * 8,
            });
        }
        nsym /= 2;
    }
}
