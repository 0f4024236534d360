//! Pipeline configuration for GradeLit.
//!
//! The whole pipeline runs against an explicit, versioned
//! [`PipelineConfig`] snapshot — never ambient global state — so in-flight
//! requests and cached results stay internally consistent across
//! configuration changes. Loads from TOML with full defaults; every
//! numeric threshold is external data so calibration never needs a code
//! change.
//!
//! Lookups for an `(era, level)` pair that is missing from a table are
//! hard [`ConfigError::MissingEntry`] failures, never silent defaults:
//! silent defaulting is how threshold mismatches go systemic.

use gradelit_core::{CefrLevel, Era, PromptStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration snapshot.
///
/// Cloned wholesale into each request's context; a version bump or reload
/// produces a new snapshot rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Version stamped into every cache key. Bumping it re-keys the cache
    /// non-destructively.
    #[serde(default = "default_pipeline_version")]
    pub pipeline_version: u32,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub narration: NarrationConfig,
}

fn default_pipeline_version() -> u32 {
    1
}

/// Similarity gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Coarse lexical-overlap floor; candidates below it are rejected
    /// without spending an embedding call.
    #[serde(default = "default_precheck_floor")]
    pub precheck_floor: f32,

    /// Width of the acceptable band below the full threshold. A candidate
    /// inside the band passes only with zero rule violations.
    #[serde(default = "default_acceptable_band")]
    pub acceptable_band: f32,

    /// Full-check similarity thresholds per (era, level).
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<ThresholdEntry>,
}

fn default_precheck_floor() -> f32 {
    0.60
}
fn default_acceptable_band() -> f32 {
    0.05
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            precheck_floor: default_precheck_floor(),
            acceptable_band: default_acceptable_band(),
            thresholds: default_thresholds(),
        }
    }
}

/// One row of the similarity threshold table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdEntry {
    pub era: Era,
    pub level: CefrLevel,
    pub threshold: f32,
}

/// Archaic eras get the lowest thresholds, modern the highest: a universal
/// threshold systematically fails archaic source text while barely
/// constraining modern text. Level nudges the base slightly upward toward
/// C2, where rewrites stay close to the source anyway.
fn default_thresholds() -> Vec<ThresholdEntry> {
    let mut entries = Vec::with_capacity(Era::ALL.len() * CefrLevel::ALL.len());
    for era in Era::ALL {
        let base = match era {
            Era::EarlyModern => 0.62,
            Era::Victorian => 0.66,
            Era::American19c => 0.68,
            Era::Modern => 0.74,
        };
        for level in CefrLevel::ALL {
            let adjust = (level.rank() as f32 - 2.5) * 0.008;
            entries.push(ThresholdEntry {
                era,
                level,
                threshold: base + adjust,
            });
        }
    }
    entries
}

/// Generation routing and retry budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier passed to the generative service.
    #[serde(default = "default_model")]
    pub model: String,

    /// Quality attempts before guaranteed fallback to the original text.
    #[serde(default = "default_max_quality_attempts")]
    pub max_quality_attempts: u32,

    /// Temperature reduction applied per retry attempt.
    #[serde(default = "default_retry_temperature_step")]
    pub retry_temperature_step: f32,

    /// Transient-failure retries allowed per quality attempt.
    #[serde(default = "default_transient_retry_limit")]
    pub transient_retry_limit: u32,

    /// Base backoff between transient retries (doubled each retry).
    #[serde(default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    /// Per-call timeout on the generative service.
    #[serde(default = "default_generate_timeout_secs")]
    pub generate_timeout_secs: u64,

    /// First-attempt generation parameters per (era, level).
    #[serde(default = "default_routing")]
    pub routing: Vec<RoutingEntry>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_max_quality_attempts() -> u32 {
    3
}
fn default_retry_temperature_step() -> f32 {
    0.15
}
fn default_transient_retry_limit() -> u32 {
    2
}
fn default_transient_backoff_ms() -> u64 {
    250
}
fn default_generate_timeout_secs() -> u64 {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_quality_attempts: default_max_quality_attempts(),
            retry_temperature_step: default_retry_temperature_step(),
            transient_retry_limit: default_transient_retry_limit(),
            transient_backoff_ms: default_transient_backoff_ms(),
            generate_timeout_secs: default_generate_timeout_secs(),
            routing: default_routing(),
        }
    }
}

/// One row of the generation routing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub era: Era,
    pub level: CefrLevel,
    pub temperature: f32,
    pub strategy: PromptStrategy,
}

/// Archaic text at low target levels routes to HIGHER creativity than the
/// same level on modern text: hitting a low vocabulary ceiling from
/// archaic syntax takes aggressive rewriting, not light pruning.
fn default_routing() -> Vec<RoutingEntry> {
    let mut entries = Vec::with_capacity(Era::ALL.len() * CefrLevel::ALL.len());
    for era in Era::ALL {
        let era_base = match era {
            Era::EarlyModern => 0.65,
            Era::Victorian => 0.60,
            Era::American19c => 0.55,
            Era::Modern => 0.45,
        };
        for level in CefrLevel::ALL {
            let level_boost = (5 - level.rank()) as f32 * 0.03;
            let strategy = if era.is_archaic() && level.rank() <= 1 {
                PromptStrategy::AggressiveRewrite
            } else if !era.is_archaic() && level.rank() >= 4 {
                PromptStrategy::LightPrune
            } else {
                PromptStrategy::Balanced
            };
            entries.push(RoutingEntry {
                era,
                level,
                temperature: era_base + level_boost,
                strategy,
            });
        }
    }
    entries
}

/// Cache tier TTLs and sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_hot_ttl_secs")]
    pub hot_ttl_secs: u64,

    #[serde(default = "default_durable_ttl_secs")]
    pub durable_ttl_secs: u64,

    /// Max entries held by the hot tier before oldest-first eviction.
    #[serde(default = "default_hot_capacity")]
    pub hot_capacity: usize,
}

fn default_hot_ttl_secs() -> u64 {
    15 * 60
}
fn default_durable_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}
fn default_hot_capacity() -> usize {
    4096
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_ttl_secs: default_hot_ttl_secs(),
            durable_ttl_secs: default_durable_ttl_secs(),
            hot_capacity: default_hot_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn hot_ttl(&self) -> Duration {
        Duration::from_secs(self.hot_ttl_secs)
    }

    pub fn durable_ttl(&self) -> Duration {
        Duration::from_secs(self.durable_ttl_secs)
    }
}

/// Background precompute pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent in-flight precompute requests.
    #[serde(default = "default_scheduler_concurrency")]
    pub concurrency: usize,

    /// Pause between chunk submissions, keeping background load low.
    #[serde(default = "default_chunk_pause_ms")]
    pub chunk_pause_ms: u64,
}

fn default_scheduler_concurrency() -> usize {
    2
}
fn default_chunk_pause_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_scheduler_concurrency(),
            chunk_pause_ms: default_chunk_pause_ms(),
        }
    }
}

/// Narration synchronizer timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    /// Crossfade/silence window at a chunk boundary. Valid range 150–250ms.
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: u64,

    /// Synthesis stall tolerated before the resume attempt.
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    /// Elapsed fraction of the chunk that triggers next-chunk prefetch.
    #[serde(default = "default_prefetch_elapsed_fraction")]
    pub prefetch_elapsed_fraction: f32,

    /// Remaining-word count that triggers prefetch regardless of elapsed.
    #[serde(default = "default_prefetch_words_remaining")]
    pub prefetch_words_remaining: usize,
}

fn default_crossfade_ms() -> u64 {
    200
}
fn default_stall_timeout_ms() -> u64 {
    1500
}
fn default_prefetch_elapsed_fraction() -> f32 {
    0.9
}
fn default_prefetch_words_remaining() -> usize {
    10
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            crossfade_ms: default_crossfade_ms(),
            stall_timeout_ms: default_stall_timeout_ms(),
            prefetch_elapsed_fraction: default_prefetch_elapsed_fraction(),
            prefetch_words_remaining: default_prefetch_words_remaining(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_version: default_pipeline_version(),
            scoring: ScoringConfig::default(),
            generation: GenerationConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            narration: NarrationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    ///
    /// Environment variables override file values (highest priority):
    /// - `GRADELIT_PIPELINE_VERSION`
    /// - `GRADELIT_MODEL`
    /// - `GRADELIT_MAX_QUALITY_ATTEMPTS`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `GRADELIT_*` environment variable overrides on top of the
    /// parsed values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(version) = var("GRADELIT_PIPELINE_VERSION").and_then(|v| v.parse().ok()) {
            self.pipeline_version = version;
        }
        if let Some(model) = var("GRADELIT_MODEL") {
            self.generation.model = model;
        }
        if let Some(attempts) = var("GRADELIT_MAX_QUALITY_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.generation.max_quality_attempts = attempts;
        }
    }

    /// Full-check similarity threshold for an (era, level) pair.
    pub fn threshold_for(&self, era: Era, level: CefrLevel) -> Result<f32, ConfigError> {
        self.scoring
            .thresholds
            .iter()
            .find(|e| e.era == era && e.level == level)
            .map(|e| e.threshold)
            .ok_or(ConfigError::MissingEntry {
                table: "thresholds",
                era,
                level,
            })
    }

    /// First-attempt generation routing for an (era, level) pair.
    pub fn routing_for(&self, era: Era, level: CefrLevel) -> Result<&RoutingEntry, ConfigError> {
        self.generation
            .routing
            .iter()
            .find(|e| e.era == era && e.level == level)
            .ok_or(ConfigError::MissingEntry {
                table: "routing",
                era,
                level,
            })
    }

    /// A copy of this snapshot with a new pipeline version. Existing cache
    /// entries are untouched; future keys change.
    pub fn with_version(&self, pipeline_version: u32) -> Self {
        let mut next = self.clone();
        next.pipeline_version = pipeline_version;
        next
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for entry in &self.scoring.thresholds {
            if !(0.0..=1.0).contains(&entry.threshold) {
                return Err(ConfigError::ValidationError(format!(
                    "threshold for ({}, {}) out of [0,1]: {}",
                    entry.era, entry.level, entry.threshold
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.scoring.precheck_floor) {
            return Err(ConfigError::ValidationError(
                "precheck_floor must be within [0,1]".into(),
            ));
        }
        if self.scoring.acceptable_band < 0.0 || self.scoring.acceptable_band > 0.2 {
            return Err(ConfigError::ValidationError(
                "acceptable_band must be within [0, 0.2]".into(),
            ));
        }
        for entry in &self.generation.routing {
            if !(0.0..=2.0).contains(&entry.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "temperature for ({}, {}) out of [0,2]: {}",
                    entry.era, entry.level, entry.temperature
                )));
            }
        }
        if self.generation.max_quality_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_quality_attempts must be at least 1".into(),
            ));
        }
        if !(150..=250).contains(&self.narration.crossfade_ms) {
            return Err(ConfigError::ValidationError(
                "crossfade_ms must be within [150, 250]".into(),
            ));
        }
        if self.scheduler.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No {table} entry configured for era {era}, level {level}")]
    MissingEntry {
        table: &'static str,
        era: Era,
        level: CefrLevel,
    },
}

impl From<ConfigError> for gradelit_core::Error {
    fn from(e: ConfigError) -> Self {
        gradelit_core::Error::Config {
            message: e.to_string(),
        }
    }
}
