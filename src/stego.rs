//! Single-image hide and extract
//!
//! One cover carries one frame, either raw (`frame || ###END###` scanned for
//! the delimiter on extraction) or wrapped in an FEC block.
//!
//! # Example
//!
//! ```no_run
//! use steghider::stego::{extract_message, hide_message, EmbedOptions, ExtractOptions};
//! use steghider::{CoverImage, Credentials, Payload, SecurityLevel};
//!
//! # fn example() -> Result<(), steghider::StegoError> {
//! let cover = CoverImage::new(120, 120, [30, 90, 160]);
//! let creds = Credentials::new().with_password("correct horse");
//! let options = EmbedOptions::new()
//!     .with_level(SecurityLevel::Advanced)
//!     .with_credentials(creds.clone());
//!
//! let (stego, report) = hide_message(&cover, &Payload::text("meet at noon"), &options)?;
//! assert_eq!(report.score, 20);
//!
//! let payload = extract_message(&stego, &creds, &ExtractOptions::default())?;
//! assert_eq!(payload.data, "meet at noon");
//! # Ok(())
//! # }
//! ```

use crate::bits::{from_bits, to_bits};
use crate::crypto::KeyPair;
use crate::error::StegoError;
use crate::fec;
use crate::payload::{
    self, Credentials, NftMetadata, Payload, PayloadKind, SecurityLevel, DELIMITER, MAX_FILE_SIZE,
};
use crate::pixels::{CoverImage, PixelMode};
use std::path::{Path, PathBuf};

/// Score bonus for FEC-protected embeds
const FEC_SCORE_BONUS: u32 = 10;

/// How many Reed-Solomon parity symbols to add to a single-image embed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FecMode {
    Fixed(usize),
    Estimated {
        expected_corrupt_fraction: f64,
        safety_factor: f64,
    },
}

impl FecMode {
    fn desired_nsym(&self, frame_len: usize) -> usize {
        match *self {
            Self::Fixed(nsym) => nsym.min(fec::MAX_NSYM),
            Self::Estimated {
                expected_corrupt_fraction,
                safety_factor,
            } => fec::estimate_parity(frame_len, expected_corrupt_fraction, safety_factor),
        }
    }
}

/// Options for [`hide_message`]
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    pub level: SecurityLevel,
    pub credentials: Credentials,
    pub fec: Option<FecMode>,
    pub max_file_size: usize,
    pub pixel_mode: PixelMode,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            level: SecurityLevel::Basic,
            credentials: Credentials::default(),
            fec: None,
            max_file_size: MAX_FILE_SIZE,
            pixel_mode: PixelMode::default(),
        }
    }
}

impl EmbedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_fec(mut self, mode: FecMode) -> Self {
        self.fec = Some(mode);
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, max: usize) -> Self {
        self.max_file_size = max;
        self
    }

    /// Pixel normalization used when the cover is read from disk
    #[must_use]
    pub fn with_pixel_mode(mut self, mode: PixelMode) -> Self {
        self.pixel_mode = mode;
        self
    }
}

/// Options for [`extract_message`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Read the LSB plane as an FEC block instead of scanning for the delimiter
    pub fec: bool,
    pub pixel_mode: PixelMode,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fec(mut self, fec: bool) -> Self {
        self.fec = fec;
        self
    }

    #[must_use]
    pub fn with_pixel_mode(mut self, mode: PixelMode) -> Self {
        self.pixel_mode = mode;
        self
    }
}

/// What a successful embed produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedReport {
    /// Where the stego PNG was written, for file-based embeds
    pub output: Option<PathBuf>,
    /// Robustness score: 10/20/30 by level, plus 10 with FEC
    pub score: u32,
    pub nsym: usize,
    pub bits_used: usize,
    pub capacity_bits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityReport {
    pub width: u32,
    pub height: u32,
    pub max_bits: usize,
    pub max_bytes: usize,
    /// Bytes every raw frame spends on the delimiter
    pub delimiter_overhead: usize,
}

impl CapacityReport {
    /// Bytes left for the sealed payload in a raw (non-FEC) embed
    pub fn usable_bytes(&self) -> usize {
        self.max_bytes.saturating_sub(self.delimiter_overhead)
    }
}

pub fn capacity_report(image: &CoverImage) -> CapacityReport {
    CapacityReport {
        width: image.width(),
        height: image.height(),
        max_bits: image.capacity_bits(),
        max_bytes: image.capacity_bytes(),
        delimiter_overhead: DELIMITER.len(),
    }
}

/// Hide `payload` in a copy of `cover`
///
/// Fails before touching any pixel if the frame does not fit. With FEC the
/// parity is reduced until the block fits.
pub fn hide_message(
    cover: &CoverImage,
    payload: &Payload,
    options: &EmbedOptions,
) -> Result<(CoverImage, EmbedReport), StegoError> {
    let frame = payload::build_frame_with_limit(
        payload,
        options.level,
        &options.credentials,
        options.max_file_size,
    )?;

    let (bits, nsym) = match options.fec {
        Some(mode) => {
            let desired = mode.desired_nsym(frame.len());
            let nsym = fec::choose_nsym_for_capacity(desired, frame.len(), cover.capacity_bytes())?;
            (to_bits(&fec::encode(&frame, nsym)?), nsym)
        }
        None => (to_bits(&frame), 0),
    };

    let mut stego = cover.clone();
    stego.embed_bits(&bits)?;

    let mut score = options.level.score();
    if options.fec.is_some() {
        score += FEC_SCORE_BONUS;
    }
    tracing::info!(
        kind = ?payload.kind,
        level = %options.level,
        nsym,
        bits = bits.len(),
        capacity = cover.capacity_bits(),
        "embedded payload"
    );

    Ok((
        stego,
        EmbedReport {
            output: None,
            score,
            nsym,
            bits_used: bits.len(),
            capacity_bits: cover.capacity_bits(),
        },
    ))
}

/// [`hide_message`] reading the cover from `input` and writing PNG to `output`
pub fn hide_message_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    payload: &Payload,
    options: &EmbedOptions,
) -> Result<EmbedReport, StegoError> {
    let cover = CoverImage::open(input, options.pixel_mode)?;
    let (stego, mut report) = hide_message(&cover, payload, options)?;
    let output = output.as_ref();
    stego.save_png(output)?;
    report.output = Some(output.to_path_buf());
    Ok(report)
}

/// Recover the payload hidden in `image`
pub fn extract_message(
    image: &CoverImage,
    creds: &Credentials,
    options: &ExtractOptions,
) -> Result<Payload, StegoError> {
    let frame = if options.fec {
        fec::decode(&image.read_lsb_bytes())?
    } else {
        from_bits(&image.extract_until(&to_bits(DELIMITER))?)
    };

    let payload = payload::parse_frame(&frame, creds)?;
    tracing::info!(kind = ?payload.kind, fec = options.fec, frame = frame.len(), "extracted payload");
    Ok(payload)
}

pub fn extract_message_file(
    path: impl AsRef<Path>,
    creds: &Credentials,
    options: &ExtractOptions,
) -> Result<Payload, StegoError> {
    let image = CoverImage::open(path, options.pixel_mode)?;
    extract_message(&image, creds, options)
}

/// Embed owner-only NFT metadata, encrypted with the owner wallet
pub fn embed_nft_secret(
    cover: &CoverImage,
    metadata: &NftMetadata,
) -> Result<(CoverImage, EmbedReport), StegoError> {
    let options = EmbedOptions::new()
        .with_level(SecurityLevel::Advanced)
        .with_credentials(Credentials::new().with_password(metadata.owner.as_str()));
    hide_message(cover, &Payload::nft_secret(metadata.seal()?), &options)
}

/// NFT metadata in `image`, or `None` if it carries some other payload
pub fn extract_nft_secret(image: &CoverImage, wallet: &str) -> Result<Option<NftMetadata>, StegoError> {
    let creds = Credentials::new().with_password(wallet);
    let payload = extract_message(image, &creds, &ExtractOptions::default())?;
    if payload.kind != PayloadKind::NftSecret {
        return Ok(None);
    }
    Ok(Some(NftMetadata::open(&payload.data, wallet)?))
}

/// Fresh RSA-2048 key pair for the premium level
pub fn generate_key_pair() -> Result<KeyPair, StegoError> {
    Ok(KeyPair::generate()?)
}
