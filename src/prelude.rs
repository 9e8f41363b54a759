//! Steghider Prelude
//!
//! Commonly used types in one import.
//!
//! # Example
//!
//! ```rust
//! use steghider::prelude::*;
//!
//! # fn example() -> Result<(), StegoError> {
//! let cover = CoverImage::new(64, 64, [10, 20, 30]);
//! let (stego, _) = hide_message(&cover, &Payload::text("hi"), &EmbedOptions::new())?;
//! let payload = extract_message(&stego, &Credentials::new(), &ExtractOptions::new())?;
//! assert_eq!(payload.data, "hi");
//! # Ok(())
//! # }
//! ```

pub use crate::chunk::{chunk_and_embed, reassemble, ChunkOptions, ChunkSet, ParityPolicy};
pub use crate::corrupt::{Chain, Corruptor, JpegRecompress, LsbFlip, ResizeRoundTrip, ZeroRegion};
pub use crate::crypto::KeyPair;
pub use crate::error::StegoError;
pub use crate::manifest::Manifest;
pub use crate::payload::{Credentials, NftMetadata, Payload, PayloadKind, SecurityLevel};
pub use crate::pixels::{CoverImage, PixelMode};
pub use crate::stego::{
    extract_message, hide_message, EmbedOptions, EmbedReport, ExtractOptions, FecMode,
};
pub use crate::tune::{AutoTuneConfig, AutoTuner, TuneOutcome, TuneReport, TuneRequest};
