//! Common test utilities for steghider integration tests
//!
//! This module provides shared helper functions to reduce code duplication
//! across integration test files.

#![allow(dead_code)]

use std::sync::OnceLock;

pub use steghider::{CoverImage, Credentials, KeyPair, SecurityLevel, StegoError};

/// Message used by the end-to-end scenarios: 16 bytes repeated to 640 bytes
pub const HELLO: &str = "Hello StegHider!";

pub fn hello_message() -> String {
    HELLO.repeat(40)
}

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A cover with varied channel values so LSBs start out mixed
pub fn textured_cover(width: u32, height: u32) -> CoverImage {
    let mut image = CoverImage::new(width, height, [0, 0, 0]);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 7 + y * 3) as u8;
            let g = (x * 13 ^ y * 5) as u8;
            let b = (x + y * 11) as u8;
            image.set_pixel(x, y, [r, g, b]);
        }
    }
    image
}

pub fn covers(count: usize, side: u32) -> Vec<CoverImage> {
    (0..count)
        .map(|i| {
            let mut cover = textured_cover(side, side);
            cover.set_pixel(0, 0, [i as u8, 0, 0]);
            cover
        })
        .collect()
}

/// Deterministic, poorly compressible bytes
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as u8
        })
        .collect()
}

/// One RSA key pair shared by every test in the binary
pub fn shared_key_pair() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate().expect("RSA key generation"))
}

/// Credentials able to both seal and open at `level`
pub fn credentials_for(level: SecurityLevel) -> Credentials {
    match level {
        SecurityLevel::Basic => Credentials::new(),
        SecurityLevel::Advanced => Credentials::new().with_password("integration-password"),
        SecurityLevel::Premium => {
            let keys = shared_key_pair();
            Credentials::new()
                .with_public_key(keys.public_key_pem.clone())
                .with_private_key(keys.private_key_pem.clone())
        }
    }
}

/// Flip the LSB of one channel at absolute bit position `bit`
pub fn flip_bit(image: &mut CoverImage, bit: usize) {
    let pixel = bit / 3;
    let (x, y) = ((pixel as u32) % image.width(), (pixel as u32) / image.width());
    let mut rgb = image.pixel(x, y);
    rgb[bit % 3] ^= 1;
    image.set_pixel(x, y, rgb);
}
