use crate::error::StegoError;
use crate::payload::{self, Credentials, SecurityLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

pub const MANIFEST_VERSION: u32 = 1;
pub const PLAIN_MANIFEST_FILE: &str = "manifest.json";
pub const SEALED_MANIFEST_FILE: &str = "manifest.enc";

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Description of a chunked payload. Informational: reassembly only needs the
/// stego images themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub original_filename: String,
    pub total_size: usize,
    pub total_chunks: usize,
    pub chunks: Vec<ManifestChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_tune: Option<TuneAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    pub index: usize,
    /// File name of the stego image carrying this chunk
    pub cover: String,
    /// Hex SHA-256 of the chunk body
    pub sha256: String,
    pub chunk_len: usize,
    pub nsym: usize,
}

/// Parity level and corruption variant that auto-tuning settled on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneAnnotation {
    pub parity_pct: u32,
    pub variant: String,
}

/// Manifest as persisted next to the stego images
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredManifest {
    Plain(String),
    Sealed(Vec<u8>),
}

impl StoredManifest {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Plain(_) => PLAIN_MANIFEST_FILE,
            Self::Sealed(_) => SEALED_MANIFEST_FILE,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Plain(json) => json.as_bytes(),
            Self::Sealed(bytes) => bytes,
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }
}

impl Manifest {
    pub fn new(original_filename: impl Into<String>, total_size: usize) -> Self {
        Self {
            version: MANIFEST_VERSION,
            original_filename: original_filename.into(),
            total_size,
            total_chunks: 0,
            chunks: Vec::new(),
            created_at: Some(Utc::now()),
            auto_tune: None,
        }
    }

    pub fn add_chunk(&mut self, index: usize, cover: impl Into<String>, body: &[u8], nsym: usize) {
        self.chunks.push(ManifestChunk {
            index,
            cover: cover.into(),
            sha256: sha256_hex(body),
            chunk_len: body.len(),
            nsym,
        });
        self.total_chunks = self.chunks.len();
    }

    pub fn annotate_tuning(&mut self, parity_pct: u32, variant: impl Into<String>) {
        self.auto_tune = Some(TuneAnnotation {
            parity_pct,
            variant: variant.into(),
        });
    }

    /// True if `body` matches the recorded digest for chunk `index`
    pub fn verify_chunk(&self, index: usize, body: &[u8]) -> bool {
        self.chunks
            .iter()
            .find(|chunk| chunk.index == index)
            .is_some_and(|chunk| chunk.chunk_len == body.len() && chunk.sha256 == sha256_hex(body))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Encrypt under the payload's credential, or keep plaintext for basic level
    pub fn store(&self, level: SecurityLevel, creds: &Credentials) -> Result<StoredManifest, StegoError> {
        let json = self.to_json()?;
        match level {
            SecurityLevel::Basic => Ok(StoredManifest::Plain(json)),
            _ => Ok(StoredManifest::Sealed(payload::seal(json.as_bytes(), level, creds)?)),
        }
    }

    /// Parse a stored manifest, plaintext first then sealed
    pub fn load(bytes: &[u8], creds: &Credentials) -> Result<Self, StegoError> {
        if let Ok(manifest) = serde_json::from_slice(bytes) {
            return Ok(manifest);
        }
        let json = payload::open(bytes, creds)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Load `manifest.json` or `manifest.enc` from `dir`
    pub fn read_from_dir(dir: impl AsRef<Path>, creds: &Credentials) -> Result<Self, StegoError> {
        let dir = dir.as_ref();
        let plain = dir.join(PLAIN_MANIFEST_FILE);
        let path = if plain.exists() {
            plain
        } else {
            dir.join(SEALED_MANIFEST_FILE)
        };
        Self::load(&std::fs::read(path)?, creds)
    }
}
