//! Reed-Solomon codec over GF(2^8)
//!
//! Primitive polynomial 0x11D, first consecutive root alpha^0, systematic
//! encoding. Codewords hold at most 255 symbols; shorter codewords are
//! treated as full-length ones with implicit leading zeros. Decoding uses
//! Berlekamp-Massey, Chien search and Forney.

use std::sync::OnceLock;
use thiserror::Error;

const PRIM_POLY: u16 = 0x11D;

/// Symbols in a full codeword
pub const CODEWORD_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RsError {
    #[error("too many symbol errors to correct")]
    TooManyErrors,
    #[error("correction falls in the shortened (implicit zero) region")]
    ErrorInPadding,
    #[error("codeword of {len} symbols does not fit {nsym} parity symbols")]
    BadLength { len: usize, nsym: usize },
}

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn gf_tables() -> &'static GfTables {
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut exp = [0u8; 512];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255usize {
            exp[i] = x as u8;
            exp[i + 255] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIM_POLY;
            }
        }
        exp[510] = exp[0];
        exp[511] = exp[1];
        GfTables { exp, log }
    })
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = gf_tables();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Multiplicative inverse; zero has none and maps to zero.
fn gf_inv(a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    let t = gf_tables();
    t.exp[255 - t.log[a as usize] as usize]
}

/// alpha^power for any (possibly negative) exponent
fn alpha_pow(power: i64) -> u8 {
    gf_tables().exp[power.rem_euclid(255) as usize]
}

/// Evaluate a highest-degree-first polynomial at `x`
fn poly_eval(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0u8, |acc, &coeff| gf_mul(acc, x) ^ coeff)
}

/// Evaluate a lowest-degree-first polynomial at `x`
fn poly_eval_asc(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0u8, |acc, &coeff| gf_mul(acc, x) ^ coeff)
}

fn poly_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len() + b.len() - 1];
    for (i, &ac) in a.iter().enumerate() {
        for (j, &bc) in b.iter().enumerate() {
            out[i + j] ^= gf_mul(ac, bc);
        }
    }
    out
}

/// Codec for a fixed number of parity symbols
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    nsym: usize,
    /// g(x) = prod (x - alpha^i), i in 0..nsym, highest degree first
    generator: Vec<u8>,
}

impl ReedSolomon {
    /// `nsym` must leave room for at least one data symbol.
    pub fn new(nsym: usize) -> Result<Self, RsError> {
        if nsym == 0 || nsym >= CODEWORD_LEN {
            return Err(RsError::BadLength {
                len: CODEWORD_LEN,
                nsym,
            });
        }
        let generator = (0..nsym).fold(vec![1u8], |g, i| poly_mul(&g, &[1, alpha_pow(i as i64)]));
        Ok(Self { nsym, generator })
    }

    pub fn nsym(&self) -> usize {
        self.nsym
    }

    /// Data symbols in a full codeword
    pub fn data_len(&self) -> usize {
        CODEWORD_LEN - self.nsym
    }

    /// Maximum number of correctable symbol errors per codeword
    pub fn max_errors(&self) -> usize {
        self.nsym / 2
    }

    /// Systematic encode: `data || parity`
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, RsError> {
        if data.is_empty() || data.len() > self.data_len() {
            return Err(RsError::BadLength {
                len: data.len() + self.nsym,
                nsym: self.nsym,
            });
        }

        let mut remainder = vec![0u8; self.nsym];
        for &byte in data {
            let feedback = byte ^ remainder[0];
            for j in 0..self.nsym - 1 {
                remainder[j] = remainder[j + 1] ^ gf_mul(feedback, self.generator[j + 1]);
            }
            remainder[self.nsym - 1] = gf_mul(feedback, self.generator[self.nsym]);
        }

        let mut codeword = Vec::with_capacity(data.len() + self.nsym);
        codeword.extend_from_slice(data);
        codeword.extend_from_slice(&remainder);
        Ok(codeword)
    }

    /// S_i = r(alpha^i). Implicit leading zeros do not change the value.
    fn syndromes(&self, received: &[u8]) -> Vec<u8> {
        (0..self.nsym)
            .map(|i| poly_eval(received, alpha_pow(i as i64)))
            .collect()
    }

    /// True when `received` is a valid codeword as-is
    pub fn is_codeword(&self, received: &[u8]) -> bool {
        received.len() > self.nsym
            && received.len() <= CODEWORD_LEN
            && self.syndromes(received).iter().all(|&s| s == 0)
    }

    /// Correct `received` and return its data symbols with the number of
    /// symbols that were corrected.
    pub fn decode(&self, received: &[u8]) -> Result<(Vec<u8>, usize), RsError> {
        let len = received.len();
        if len <= self.nsym || len > CODEWORD_LEN {
            return Err(RsError::BadLength {
                len,
                nsym: self.nsym,
            });
        }
        let data_len = len - self.nsym;

        let syndromes = self.syndromes(received);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok((received[..data_len].to_vec(), 0));
        }

        let sigma = berlekamp_massey(&syndromes);
        let degree = sigma.len() - 1;
        if degree > self.max_errors() {
            return Err(RsError::TooManyErrors);
        }

        // GF positions count from the last symbol; index in `received` is len - 1 - p
        let positions = chien_search(&sigma).ok_or(RsError::TooManyErrors)?;
        if positions.iter().any(|&p| p >= len) {
            return Err(RsError::ErrorInPadding);
        }

        let magnitudes = forney(&sigma, &syndromes, &positions);
        let mut corrected = received.to_vec();
        for (&p, &magnitude) in positions.iter().zip(&magnitudes) {
            corrected[len - 1 - p] ^= magnitude;
        }

        if !self.is_codeword(&corrected) {
            return Err(RsError::TooManyErrors);
        }
        corrected.truncate(data_len);
        Ok((corrected, degree))
    }
}

/// Error locator sigma(x), lowest degree first, trimmed to its degree
fn berlekamp_massey(syndromes: &[u8]) -> Vec<u8> {
    let n = syndromes.len();
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut c_len = 1usize;
    let mut b_len = 1usize;
    let mut ell = 0usize;
    let mut last_delta = 1u8;
    let mut shift = 1usize;

    for r in 0..n {
        let mut delta = syndromes[r];
        for i in 1..c_len.min(r + 1) {
            delta ^= gf_mul(c[i], syndromes[r - i]);
        }
        if delta == 0 {
            shift += 1;
            continue;
        }

        let factor = gf_mul(delta, gf_inv(last_delta));
        let previous = (2 * ell <= r).then(|| (c.clone(), c_len));

        c_len = c_len.max(b_len + shift).min(n + 1);
        for j in 0..b_len {
            if j + shift <= n {
                c[j + shift] ^= gf_mul(factor, b[j]);
            }
        }

        match previous {
            Some((old_c, old_len)) => {
                b = old_c;
                b_len = old_len;
                ell = r + 1 - ell;
                last_delta = delta;
                shift = 1;
            }
            None => shift += 1,
        }
    }

    while c_len > 1 && c[c_len - 1] == 0 {
        c_len -= 1;
    }
    c.truncate(c_len);
    c
}

/// GF positions p in 0..255 with sigma(alpha^-p) = 0; None unless the
/// number of roots equals the degree of sigma.
fn chien_search(sigma: &[u8]) -> Option<Vec<usize>> {
    let degree = sigma.len() - 1;
    let roots: Vec<usize> = (0..CODEWORD_LEN)
        .filter(|&p| poly_eval_asc(sigma, alpha_pow(-(p as i64))) == 0)
        .collect();
    (roots.len() == degree).then_some(roots)
}

/// Error magnitudes for first consecutive root 0:
/// e = X * Omega(X^-1) / Sigma'(X^-1)
fn forney(sigma: &[u8], syndromes: &[u8], positions: &[usize]) -> Vec<u8> {
    let two_t = syndromes.len();
    let mut omega = vec![0u8; two_t];
    for (i, &s_coeff) in sigma.iter().enumerate().take(two_t) {
        for (j, &syndrome) in syndromes.iter().enumerate().take(two_t - i) {
            omega[i + j] ^= gf_mul(s_coeff, syndrome);
        }
    }

    // formal derivative: only odd powers survive in characteristic 2
    let mut sigma_prime = vec![0u8; sigma.len().saturating_sub(1)];
    for i in (1..sigma.len()).step_by(2) {
        sigma_prime[i - 1] = sigma[i];
    }

    positions
        .iter()
        .map(|&p| {
            let x = alpha_pow(p as i64);
            let x_inv = alpha_pow(-(p as i64));
            let denominator = poly_eval_asc(&sigma_prime, x_inv);
            if denominator == 0 {
                return 0;
            }
            gf_mul(x, gf_mul(poly_eval_asc(&omega, x_inv), gf_inv(denominator)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gf_tables() {
        let t = gf_tables();
        assert_eq!(t.exp[0], 1);
        assert_eq!(t.exp[8], 0x1D);
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1);
        }
    }

    #[test]
    fn test_generator_roots() -> Result<(), RsError> {
        let rs = ReedSolomon::new(10)?;
        assert_eq!(rs.generator.len(), 11);
        for i in 0..10 {
            assert_eq!(poly_eval(&rs.generator, alpha_pow(i)), 0);
        }
        Ok(())
    }

    #[test]
    fn test_encode_is_systematic_codeword() -> Result<(), RsError> {
        let rs = ReedSolomon::new(16)?;
        let data: Vec<u8> = (0..100).collect();
        let codeword = rs.encode(&data)?;
        assert_eq!(&codeword[..100], &data[..]);
        assert!(rs.is_codeword(&codeword));
        Ok(())
    }

    #[test]
    fn test_corrects_up_to_half_parity() -> Result<(), RsError> {
        let rs = ReedSolomon::new(20)?;
        let data: Vec<u8> = (0..rs.data_len()).map(|i| (i * 7) as u8).collect();
        let mut codeword = rs.encode(&data)?;
        for k in 0..10 {
            codeword[k * 23] ^= 0xA5;
        }
        let (decoded, corrected) = rs.decode(&codeword)?;
        assert_eq!(decoded, data);
        assert_eq!(corrected, 10);
        Ok(())
    }

    #[test]
    fn test_shortened_codeword() -> Result<(), RsError> {
        let rs = ReedSolomon::new(8)?;
        let mut codeword = rs.encode(b"short message")?;
        codeword[0] ^= 0xFF;
        codeword[12] ^= 0x01;
        codeword[15] ^= 0x40;
        let (decoded, corrected) = rs.decode(&codeword)?;
        assert_eq!(decoded, b"short message");
        assert_eq!(corrected, 3);
        Ok(())
    }

    #[test]
    fn test_errors_in_parity_region() -> Result<(), RsError> {
        let rs = ReedSolomon::new(6)?;
        let mut codeword = rs.encode(&[42u8; 50])?;
        let last = codeword.len() - 1;
        codeword[last] ^= 1;
        codeword[last - 3] ^= 2;
        assert_eq!(rs.decode(&codeword)?.0, vec![42u8; 50]);
        Ok(())
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ReedSolomon::new(0).is_err());
        assert!(ReedSolomon::new(255).is_err());
        let rs = ReedSolomon::new(254).unwrap();
        assert_eq!(rs.data_len(), 1);
        assert!(rs.encode(&[1, 2]).is_err());
        assert!(rs.decode(&[0u8; 254]).is_err());
    }
}
