//! Unified error type for the steghider public API
//!
//! Cryptographic failures keep their own domain type ([`CryptoError`]) and are
//! carried inside [`StegoError::Crypto`]. Everything else is reported directly.
//!
//! # Example
//!
//! ```no_run
//! use steghider::StegoError;
//!
//! fn embed_something() -> Result<(), StegoError> {
//!     // All steghider operations return StegoError
//!     Ok(())
//! }
//! ```

use crate::crypto::CryptoError;
use thiserror::Error;

/// Unified error type for all steghider operations
///
/// # Error Categories
///
/// - **Capacity**: the payload does not fit the cover image(s)
/// - **Credential**: a level or operation needs a password/key that was not supplied
/// - **Crypto**: encryption, decryption, or key handling errors
/// - **Recovery**: FEC, chunk and delimiter failures while extracting
/// - **Format**: image, JSON, zip, base64 and I/O errors from the layers below
#[derive(Debug, Error)]
pub enum StegoError {
    #[error("Message too large for image: need {needed_bits} bits, image has {available_bits}")]
    CapacityExceeded {
        needed_bits: usize,
        available_bits: usize,
    },

    #[error("Cover images too small: payload is {needed_bytes} bytes, covers hold {available_bytes}")]
    InsufficientCapacity {
        needed_bytes: usize,
        available_bytes: usize,
    },

    #[error("Password required for advanced level")]
    MissingPassword,

    #[error("Public key required for premium level")]
    MissingPublicKey,

    #[error("Auto-tune needs a password or private key to verify recovery")]
    MissingVerificationCredential,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Reed-Solomon decoding failed: {reason}")]
    FecFailure { reason: String },

    #[error("Chunk assembly failed: {reason}")]
    AssemblyFailed { reason: String },

    #[error("Chunk {index} missing from image set")]
    ChunkMissing { index: usize },

    #[error("Chunk in image {image} is corrupt: {reason}")]
    ChunkCorrupt { image: usize, reason: String },

    #[error("No hidden message found or delimiter missing")]
    NoHiddenDataFound,

    #[error("Corrupted pixel data at ({x}, {y}): {shape}")]
    CorruptedPixelData { x: u32, y: u32, shape: String },

    #[error("File too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Decompression failed and could not decode as text")]
    Decompression,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl StegoError {
    /// Returns true if escalating redundancy and retrying may succeed
    ///
    /// Only the auto-tuner acts on this; every other operation is single-shot.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FecFailure { .. }
                | Self::ChunkCorrupt { .. }
                | Self::ChunkMissing { .. }
                | Self::NoHiddenDataFound
        )
    }

    /// Returns true if a required password or key was not supplied
    pub fn is_missing_credential(&self) -> bool {
        matches!(
            self,
            Self::MissingPassword | Self::MissingPublicKey | Self::MissingVerificationCredential
        )
    }

    /// Returns true if this is a cryptographic error
    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Self::Crypto(_))
    }

    /// Returns true if the wrong credential was used or the ciphertext is damaged
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::DecryptionFailed))
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::CapacityExceeded { .. } => {
                Some("Try a larger image, a smaller file, or less Reed-Solomon parity")
            }
            Self::InsufficientCapacity { .. } => Some("Add more or larger cover images"),
            Self::MissingPassword => Some("Supply a password or use the basic level"),
            Self::MissingPublicKey => Some("Generate a key pair and pass the public key PEM"),
            Self::FecFailure { .. } => {
                Some("Re-embed with more parity symbols (see AutoTuner) to survive this corruption")
            }
            Self::NoHiddenDataFound => {
                Some("The image carries no payload, or was re-encoded lossily after embedding")
            }
            Self::Crypto(CryptoError::DecryptionFailed) => {
                Some("Check the password or private key used for extraction")
            }
            _ => None,
        }
    }

    /// Returns a stable error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "STEG_E_CAPACITY_EXCEEDED",
            Self::InsufficientCapacity { .. } => "STEG_E_CAPACITY_INSUFFICIENT",
            Self::MissingPassword => "STEG_E_CREDENTIAL_PASSWORD",
            Self::MissingPublicKey => "STEG_E_CREDENTIAL_PUBLIC_KEY",
            Self::MissingVerificationCredential => "STEG_E_CREDENTIAL_VERIFY",
            Self::Crypto(CryptoError::DecryptionFailed) => "STEG_E_CRYPTO_DECRYPT",
            Self::Crypto(_) => "STEG_E_CRYPTO",
            Self::FecFailure { .. } => "STEG_E_FEC",
            Self::AssemblyFailed { .. } => "STEG_E_CHUNK_ASSEMBLY",
            Self::ChunkMissing { .. } => "STEG_E_CHUNK_MISSING",
            Self::ChunkCorrupt { .. } => "STEG_E_CHUNK_CORRUPT",
            Self::NoHiddenDataFound => "STEG_E_NO_DATA",
            Self::CorruptedPixelData { .. } => "STEG_E_PIXEL_DATA",
            Self::PayloadTooLarge { .. } => "STEG_E_PAYLOAD_TOO_LARGE",
            Self::Decompression => "STEG_E_DECOMPRESS",
            Self::InvalidPayload(_) => "STEG_E_PAYLOAD_INVALID",
            Self::Image(_) => "STEG_E_IMAGE",
            Self::Io(_) => "STEG_E_IO",
            Self::Json(_) => "STEG_E_JSON",
            Self::Zip(_) => "STEG_E_ZIP",
            Self::Base64(_) => "STEG_E_BASE64",
        }
    }
}
