//! Splitting a sealed file across several cover images and putting it back
//!
//! The file is compressed and encrypted once. The sealed bytes are then cut
//! into slices sized to each cover; every slice travels as
//!
//! ```text
//! {"index","payload_len","chunk_len","orig_name"} \n\n body ###END###
//! ```
//!
//! FEC-encoded and embedded into its own cover. Images can be reassembled in
//! any order since each one carries its index.

use crate::bits::to_bits;
use crate::error::StegoError;
use crate::fec;
use crate::manifest::Manifest;
use crate::payload::{self, Credentials, SecurityLevel, DELIMITER, MAX_FILE_SIZE};
use crate::pixels::{CoverImage, PixelMode};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Share of each cover's byte capacity given to chunk data
pub const CHUNK_FILL_RATIO: f64 = 0.85;

const HEADER_SEPARATOR: &[u8] = b"\n\n";

/// How many parity symbols each chunk gets before shrinking to fit its cover
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParityPolicy {
    None,
    Fixed(usize),
    /// Percentage of each codeword spent on parity
    Percent(u32),
    Estimate {
        expected_corrupt_fraction: f64,
        safety_factor: f64,
    },
}

impl Default for ParityPolicy {
    fn default() -> Self {
        Self::Percent(10)
    }
}

impl ParityPolicy {
    /// Desired nsym for a frame of `frame_len` bytes
    pub fn desired_nsym(&self, frame_len: usize) -> usize {
        match *self {
            Self::None => 0,
            Self::Fixed(nsym) => nsym.min(fec::MAX_NSYM),
            Self::Percent(pct) => fec::parity_for_percent(pct, frame_len),
            Self::Estimate {
                expected_corrupt_fraction,
                safety_factor,
            } => fec::estimate_parity(frame_len, expected_corrupt_fraction, safety_factor),
        }
    }
}

/// Options for [`chunk_and_embed`]
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub level: SecurityLevel,
    pub credentials: Credentials,
    pub parity: ParityPolicy,
    pub fill_ratio: f64,
    pub max_file_size: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            level: SecurityLevel::Basic,
            credentials: Credentials::default(),
            parity: ParityPolicy::default(),
            fill_ratio: CHUNK_FILL_RATIO,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl ChunkOptions {
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
    pub fn with_parity(mut self, parity: ParityPolicy) -> Self {
        self.parity = parity;
        self
    }

    #[must_use]
    pub fn with_fill_ratio(mut self, ratio: f64) -> Self {
        self.fill_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, max: usize) -> Self {
        self.max_file_size = max;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChunkHeader {
    index: usize,
    payload_len: usize,
    chunk_len: usize,
    orig_name: String,
}

/// One stego image produced by [`chunk_and_embed`]
#[derive(Debug, Clone)]
pub struct StegoChunk {
    pub index: usize,
    pub name: String,
    pub nsym: usize,
    pub image: CoverImage,
}

/// Result of chunking: the stego images in cover order plus their manifest
#[derive(Debug, Clone)]
pub struct ChunkSet {
    pub chunks: Vec<StegoChunk>,
    pub manifest: Manifest,
    level: SecurityLevel,
    credentials: Credentials,
}

impl ChunkSet {
    pub fn images(&self) -> Vec<CoverImage> {
        self.chunks.iter().map(|chunk| chunk.image.clone()).collect()
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Write every stego image as PNG plus the manifest; returns the image paths
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, StegoError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut paths = Vec::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            let path = dir.join(&chunk.name);
            chunk.image.save_png(&path)?;
            paths.push(path);
        }

        let stored = self.manifest.store(self.level, &self.credentials)?;
        std::fs::write(dir.join(stored.file_name()), stored.as_bytes())?;
        tracing::info!(
            dir = %dir.display(),
            images = paths.len(),
            manifest = stored.file_name(),
            "wrote chunk set"
        );
        Ok(paths)
    }
}

/// Bytes a chunk frame adds around its body, FEC prefix included
fn framing_overhead(header: &ChunkHeader) -> Result<usize, StegoError> {
    Ok(serde_json::to_vec(header)?.len() + HEADER_SEPARATOR.len() + DELIMITER.len() + fec::PREFIX_LEN)
}

/// Cover index and byte range of `total` sealed bytes for each chunk, in order
///
/// A slot is the fill-ratio share of the cover, shrunk so that the body plus
/// its framing fits without parity.
fn assign_slices(
    total: usize,
    orig_name: &str,
    covers: &[CoverImage],
    fill_ratio: f64,
) -> Result<Vec<(usize, Range<usize>)>, StegoError> {
    let mut slices = Vec::new();
    let mut offset = 0usize;
    let mut available = 0usize;

    for (cover_index, cover) in covers.iter().enumerate() {
        if offset >= total {
            break;
        }
        let capacity = cover.capacity_bytes();
        let share = (capacity as f64 * fill_ratio).floor() as usize;
        let overhead = framing_overhead(&ChunkHeader {
            index: slices.len(),
            payload_len: total,
            chunk_len: share,
            orig_name: orig_name.to_string(),
        })?;
        let slot = share.min(capacity.saturating_sub(overhead));
        available += slot;
        if slot == 0 {
            tracing::debug!(cover = cover_index, capacity, overhead, "cover too small for a chunk");
            continue;
        }
        let end = (offset + slot).min(total);
        slices.push((cover_index, offset..end));
        offset = end;
    }

    if offset < total {
        return Err(StegoError::InsufficientCapacity {
            needed_bytes: total,
            available_bytes: available,
        });
    }
    Ok(slices)
}

/// Seal `file_bytes` once, split it across `covers` and embed one chunk per
/// cover. Covers beyond what the payload needs are left unused.
pub fn chunk_and_embed(
    file_bytes: &[u8],
    orig_name: &str,
    covers: &[CoverImage],
    options: &ChunkOptions,
) -> Result<ChunkSet, StegoError> {
    if file_bytes.len() > options.max_file_size {
        return Err(StegoError::PayloadTooLarge {
            size: file_bytes.len(),
            max: options.max_file_size,
        });
    }
    options.credentials.check_for(options.level)?;

    let sealed = payload::seal(file_bytes, options.level, &options.credentials)?;
    let slices = assign_slices(sealed.len(), orig_name, covers, options.fill_ratio)?;

    let mut manifest = Manifest::new(orig_name, file_bytes.len());
    let mut chunks = Vec::with_capacity(slices.len());

    for (index, (cover_index, range)) in slices.into_iter().enumerate() {
        let cover = &covers[cover_index];
        let body = &sealed[range];
        let header = ChunkHeader {
            index,
            payload_len: sealed.len(),
            chunk_len: body.len(),
            orig_name: orig_name.to_string(),
        };

        let mut frame = serde_json::to_vec(&header)?;
        frame.extend_from_slice(HEADER_SEPARATOR);
        frame.extend_from_slice(body);
        frame.extend_from_slice(DELIMITER);

        let desired = options.parity.desired_nsym(frame.len());
        let nsym = fec::choose_nsym_for_capacity(desired, frame.len(), cover.capacity_bytes())?;
        let block = fec::encode(&frame, nsym)?;

        let mut image = cover.clone();
        image.embed_bits(&to_bits(&block))?;

        let name = format!("chunk_{index:03}.png");
        manifest.add_chunk(index, name.clone(), body, nsym);
        chunks.push(StegoChunk {
            index,
            name,
            nsym,
            image,
        });
    }

    tracing::info!(
        file = orig_name,
        size = file_bytes.len(),
        sealed = sealed.len(),
        chunks = chunks.len(),
        level = %options.level,
        "chunked payload"
    );

    Ok(ChunkSet {
        chunks,
        manifest,
        level: options.level,
        credentials: options.credentials.clone(),
    })
}

/// A file recovered by [`reassemble_named`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub original_name: String,
    pub data: Vec<u8>,
}

fn read_chunk(image_index: usize, image: &CoverImage) -> Result<(ChunkHeader, Vec<u8>), StegoError> {
    let frame = fec::decode(&image.read_lsb_bytes()).map_err(|err| StegoError::ChunkCorrupt {
        image: image_index,
        reason: err.to_string(),
    })?;
    let unit = frame.strip_suffix(DELIMITER).unwrap_or(&frame[..]);

    let split = unit
        .windows(HEADER_SEPARATOR.len())
        .position(|w| w == HEADER_SEPARATOR)
        .ok_or_else(|| StegoError::AssemblyFailed {
            reason: format!("image {image_index}: no header separator"),
        })?;
    let header: ChunkHeader =
        serde_json::from_slice(&unit[..split]).map_err(|err| StegoError::AssemblyFailed {
            reason: format!("image {image_index}: bad chunk header: {err}"),
        })?;
    let body = unit[split + HEADER_SEPARATOR.len()..].to_vec();

    if body.len() != header.chunk_len {
        return Err(StegoError::ChunkCorrupt {
            image: image_index,
            reason: format!("expected {} bytes, found {}", header.chunk_len, body.len()),
        });
    }
    Ok((header, body))
}

/// Recover the original file bytes and name from stego images in any order
pub fn reassemble_named(images: &[CoverImage], creds: &Credentials) -> Result<Reassembled, StegoError> {
    let mut parts = images
        .iter()
        .enumerate()
        .map(|(i, image)| read_chunk(i, image))
        .collect::<Result<Vec<_>, _>>()?;
    parts.sort_by_key(|(header, _)| header.index);

    let Some((first, _)) = parts.first() else {
        return Err(StegoError::ChunkMissing { index: 0 });
    };
    let payload_len = first.payload_len;
    let original_name = first.orig_name.clone();

    let mut sealed = Vec::new();
    for (expected, (header, body)) in parts.iter().enumerate() {
        if header.index < expected {
            return Err(StegoError::AssemblyFailed {
                reason: format!("chunk {} appears more than once", header.index),
            });
        }
        if header.index > expected {
            return Err(StegoError::ChunkMissing { index: expected });
        }
        if header.payload_len != payload_len {
            return Err(StegoError::AssemblyFailed {
                reason: format!("chunk {} belongs to a different payload", header.index),
            });
        }
        sealed.extend_from_slice(body);
    }

    if sealed.len() < payload_len {
        return Err(StegoError::ChunkMissing { index: parts.len() });
    }
    if sealed.len() > payload_len {
        return Err(StegoError::AssemblyFailed {
            reason: format!("chunks hold {} bytes, payload is {payload_len}", sealed.len()),
        });
    }

    let data = payload::open(&sealed, creds)?;
    tracing::info!(
        file = %original_name,
        chunks = parts.len(),
        size = data.len(),
        "reassembled payload"
    );
    Ok(Reassembled {
        original_name,
        data,
    })
}

/// Recover the original file bytes from stego images in any order
pub fn reassemble(images: &[CoverImage], creds: &Credentials) -> Result<Vec<u8>, StegoError> {
    Ok(reassemble_named(images, creds)?.data)
}

/// [`reassemble`] over image files
pub fn reassemble_files<P: AsRef<Path>>(paths: &[P], creds: &Credentials) -> Result<Vec<u8>, StegoError> {
    let images = paths
        .iter()
        .map(|path| CoverImage::open(path, PixelMode::default()))
        .collect::<Result<Vec<_>, _>>()?;
    reassemble(&images, creds)
}
