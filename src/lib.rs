//! Robust LSB steganography
//!
//! Payloads are compressed, optionally encrypted, optionally protected with
//! Reed-Solomon parity, and written into the least significant bit of every
//! colour channel of a cover image. Large files can be split across several
//! covers, and [`AutoTuner`] searches for the smallest parity that survives a
//! simulated corruption battery.

pub mod bits;
pub mod chunk;
pub mod corrupt;
pub mod crypto;
mod error;
pub mod fec;
pub mod manifest;
pub mod payload;
pub mod pixels;
pub mod prelude;
pub mod stego;
pub mod token;
pub mod tune;

pub use chunk::{
    chunk_and_embed, reassemble, reassemble_files, reassemble_named, ChunkOptions, ChunkSet,
    ParityPolicy, Reassembled, StegoChunk,
};
pub use corrupt::{Chain, Corruptor, JpegRecompress, LsbFlip, ResizeRoundTrip, ZeroRegion};
pub use crypto::{CryptoError, KeyPair};
pub use error::StegoError;
pub use manifest::{Manifest, ManifestChunk, StoredManifest, TuneAnnotation};
pub use payload::{Credentials, NftMetadata, Payload, PayloadKind, SecurityLevel, DELIMITER};
pub use pixels::{CoverImage, PixelMode};
pub use stego::{
    capacity_report, extract_message, generate_key_pair, hide_message, CapacityReport,
    EmbedOptions, EmbedReport, ExtractOptions, FecMode,
};
pub use tune::{AutoTuneConfig, AutoTuner, TuneOutcome, TuneReport, TuneRequest};
