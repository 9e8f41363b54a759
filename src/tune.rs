//! Search for the smallest parity level that survives a corruption battery
//!
//! For each parity percentage the payload is chunked and embedded, the first
//! stego image is damaged by every corruptor in the battery, and each damaged
//! set is reassembled and compared against the original by SHA-256. The first
//! variant that recovers exactly ends the search.
//!
//! # Example
//!
//! ```no_run
//! use steghider::{AutoTuneConfig, AutoTuner, ChunkOptions, CoverImage, Credentials, SecurityLevel, TuneRequest};
//!
//! # fn example() -> Result<(), steghider::StegoError> {
//! let covers = vec![CoverImage::new(128, 128, [90, 120, 200])];
//! let options = ChunkOptions::new()
//!     .with_level(SecurityLevel::Advanced)
//!     .with_credentials(Credentials::new().with_password("pw"));
//! let request = TuneRequest::new(b"secret file", "secret.txt", &covers, options);
//!
//! let report = AutoTuner::new(AutoTuneConfig::default().with_seed(42)).tune(&request)?;
//! println!("recovered: {}", report.is_success());
//! # Ok(())
//! # }
//! ```

use crate::chunk::{self, ChunkOptions, ChunkSet, ParityPolicy};
use crate::corrupt::{default_battery, Corruptor};
use crate::error::StegoError;
use crate::manifest::sha256_hex;
use crate::pixels::CoverImage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Search bounds for [`AutoTuner`], loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTuneConfig {
    pub start_pct: u32,
    pub max_pct: u32,
    pub step_pct: u32,
    /// Upper bound on embed/verify cycles regardless of `max_pct`
    pub max_iterations: Option<usize>,
    /// Seed for corruption randomness; fresh entropy when unset
    pub seed: Option<u64>,
    /// Where the winning chunk set is written
    pub output_dir: Option<PathBuf>,
}

impl Default for AutoTuneConfig {
    fn default() -> Self {
        Self {
            start_pct: 5,
            max_pct: 30,
            step_pct: 5,
            max_iterations: None,
            seed: None,
            output_dir: None,
        }
    }
}

impl AutoTuneConfig {
    #[must_use]
    pub fn with_range(mut self, start_pct: u32, max_pct: u32, step_pct: u32) -> Self {
        self.start_pct = start_pct;
        self.max_pct = max_pct;
        self.step_pct = step_pct;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// What to embed and how; the parity policy in `options` is overridden per step
#[derive(Debug, Clone)]
pub struct TuneRequest<'a> {
    pub file_bytes: &'a [u8],
    pub orig_name: &'a str,
    pub covers: &'a [CoverImage],
    pub options: ChunkOptions,
}

impl<'a> TuneRequest<'a> {
    pub fn new(
        file_bytes: &'a [u8],
        orig_name: &'a str,
        covers: &'a [CoverImage],
        options: ChunkOptions,
    ) -> Self {
        Self {
            file_bytes,
            orig_name,
            covers,
            options,
        }
    }
}

/// Result of verifying one corrupted variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Recovered,
    Mismatch,
    Failed { error_code: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneAttempt {
    pub parity_pct: u32,
    pub nsyms: Vec<usize>,
    pub variant: String,
    pub result: AttemptResult,
}

#[derive(Debug)]
pub enum TuneOutcome {
    Success {
        parity_pct: u32,
        variant: String,
        chunk_set: ChunkSet,
        written: Vec<PathBuf>,
    },
    ExhaustedSearch,
}

#[derive(Debug)]
pub struct TuneReport {
    pub outcome: TuneOutcome,
    pub attempts: Vec<TuneAttempt>,
}

impl TuneReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TuneOutcome::Success { .. })
    }

    pub fn parity_pct(&self) -> Option<u32> {
        match &self.outcome {
            TuneOutcome::Success { parity_pct, .. } => Some(*parity_pct),
            TuneOutcome::ExhaustedSearch => None,
        }
    }
}

enum TuneState {
    Embedding { pct: u32 },
    Corrupting { pct: u32, set: ChunkSet },
    Verifying { pct: u32, set: ChunkSet, variants: Vec<(String, CoverImage)> },
    NextPct { pct: u32 },
    Success { pct: u32, variant: String, set: ChunkSet },
    Exhausted,
}

/// Escalates parity until a damaged chunk set still reassembles
pub struct AutoTuner {
    config: AutoTuneConfig,
    battery: Vec<Box<dyn Corruptor>>,
}

impl AutoTuner {
    /// Tuner using [`default_battery`]
    pub fn new(config: AutoTuneConfig) -> Self {
        Self {
            config,
            battery: default_battery(),
        }
    }

    #[must_use]
    pub fn with_battery(mut self, battery: Vec<Box<dyn Corruptor>>) -> Self {
        self.battery = battery;
        self
    }

    pub fn config(&self) -> &AutoTuneConfig {
        &self.config
    }

    pub fn tune(&self, request: &TuneRequest<'_>) -> Result<TuneReport, StegoError> {
        if !request.options.credentials.can_decrypt() {
            return Err(StegoError::MissingVerificationCredential);
        }

        let expected = sha256_hex(request.file_bytes);
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let step = self.config.step_pct.max(1);
        let mut iterations = 0usize;
        let mut attempts = Vec::new();
        let mut state = TuneState::Embedding {
            pct: self.config.start_pct,
        };

        loop {
            state = match state {
                TuneState::Embedding { pct } => {
                    let exhausted = pct > self.config.max_pct
                        || self.config.max_iterations.is_some_and(|max| iterations >= max);
                    if exhausted {
                        TuneState::Exhausted
                    } else {
                        iterations += 1;
                        let options = request
                            .options
                            .clone()
                            .with_parity(ParityPolicy::Percent(pct));
                        let set = chunk::chunk_and_embed(
                            request.file_bytes,
                            request.orig_name,
                            request.covers,
                            &options,
                        )?;
                        TuneState::Corrupting { pct, set }
                    }
                }

                TuneState::Corrupting { pct, set } => {
                    let first = set
                        .chunks
                        .first()
                        .map(|chunk| chunk.image.clone())
                        .ok_or(StegoError::ChunkMissing { index: 0 })?;
                    let mut variants = Vec::with_capacity(self.battery.len());
                    for corruptor in &self.battery {
                        variants.push((corruptor.name(), corruptor.corrupt(&first, &mut rng)?));
                    }
                    TuneState::Verifying { pct, set, variants }
                }

                TuneState::Verifying { pct, set, variants } => {
                    let nsyms: Vec<usize> = set.chunks.iter().map(|chunk| chunk.nsym).collect();
                    let mut winner = None;

                    for (variant, damaged) in variants {
                        let mut images = set.images();
                        images[0] = damaged;
                        let result = verify(&images, &request.options, &expected);
                        tracing::info!(pct, variant = %variant, ?result, "auto-tune attempt");

                        let recovered = result == AttemptResult::Recovered;
                        attempts.push(TuneAttempt {
                            parity_pct: pct,
                            nsyms: nsyms.clone(),
                            variant: variant.clone(),
                            result,
                        });
                        if recovered {
                            winner = Some(variant);
                            break;
                        }
                    }

                    match winner {
                        Some(variant) => TuneState::Success { pct, variant, set },
                        None => TuneState::NextPct { pct },
                    }
                }

                TuneState::NextPct { pct } => match pct.checked_add(step) {
                    Some(next) => TuneState::Embedding { pct: next },
                    None => TuneState::Exhausted,
                },

                TuneState::Success {
                    pct,
                    variant,
                    mut set,
                } => {
                    set.manifest.annotate_tuning(pct, variant.clone());
                    let written = match &self.config.output_dir {
                        Some(dir) => set.write_to_dir(dir)?,
                        None => Vec::new(),
                    };
                    tracing::info!(pct, variant = %variant, attempts = attempts.len(), "auto-tune succeeded");
                    return Ok(TuneReport {
                        outcome: TuneOutcome::Success {
                            parity_pct: pct,
                            variant,
                            chunk_set: set,
                            written,
                        },
                        attempts,
                    });
                }

                TuneState::Exhausted => {
                    tracing::warn!(
                        max_pct = self.config.max_pct,
                        iterations,
                        attempts = attempts.len(),
                        "auto-tune exhausted without recovering the payload"
                    );
                    return Ok(TuneReport {
                        outcome: TuneOutcome::ExhaustedSearch,
                        attempts,
                    });
                }
            };
        }
    }
}

fn verify(images: &[CoverImage], options: &ChunkOptions, expected: &str) -> AttemptResult {
    match chunk::reassemble(images, &options.credentials) {
        Ok(data) if sha256_hex(&data) == expected => AttemptResult::Recovered,
        Ok(_) => AttemptResult::Mismatch,
        Err(err) => {
            if !err.is_retryable() {
                tracing::debug!(error = %err, "damage surfaced past the FEC layer");
            }
            AttemptResult::Failed {
                error_code: err.error_code(),
                message: err.to_string(),
            }
        }
    }
}
