//! Aggregate configuration for a memory store and its consumers.
//!
//! Every tuning constant of the retrieval pipeline lives in one of the
//! component configs below. None of them has a derivation behind it; they
//! are starting points meant to be tuned.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::curator::CuratorConfig;
use crate::embedding::DEFAULT_EMBEDDING_DIM;
use crate::error::{Error, Result};
use crate::experience::ExperienceConfig;
use crate::memory::{LinkConfig, SearchConfig};
use crate::playbook::PlaybookConfig;
use crate::retrieval::HybridConfig;

/// Default database file used by [`MemoryConfig::default`].
pub const DEFAULT_DB_PATH: &str = "memory_store.sqlite";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Dimensionality of hash embeddings
    pub embedding_dim: usize,
    /// Auto-linking on upsert
    pub link: LinkConfig,
    /// Neighbourhood search defaults
    pub search: SearchConfig,
    /// Hybrid retrieval defaults
    pub hybrid: HybridConfig,
    /// Curator thresholds
    pub curator: CuratorConfig,
    /// Experience critique and reuse
    pub experience: ExperienceConfig,
    /// Orchestration playbook
    pub playbook: PlaybookConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            link: LinkConfig::default(),
            search: SearchConfig::default(),
            hybrid: HybridConfig::default(),
            curator: CuratorConfig::default(),
            experience: ExperienceConfig::default(),
            playbook: PlaybookConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("AGENTIC_MEMORY_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dim) = env_parse("AGENTIC_MEMORY_DIM") {
            config.embedding_dim = dim;
        }
        if let Some(boost) = env_parse("AGENTIC_MEMORY_RECENCY_BOOST") {
            config.hybrid.recency_boost = boost;
        }
        if let Some(min_score) = env_parse("AGENTIC_MEMORY_LINK_MIN_SCORE") {
            config.link.min_score = min_score;
        }

        config
    }

    /// Parse configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Use a different database file.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Reject values that would make retrieval meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::config("embedding_dim must be positive"));
        }
        if !(-1.0..=1.0).contains(&self.link.min_score) {
            return Err(Error::config(format!(
                "link.min_score must be within [-1, 1], got {}",
                self.link.min_score
            )));
        }
        if !self.hybrid.recency_boost.is_finite() {
            return Err(Error::config("hybrid.recency_boost must be finite"));
        }
        if self.curator.utility_length_cap == 0 {
            return Err(Error::config("curator.utility_length_cap must be positive"));
        }
        for (name, value) in [
            ("curator.novelty_threshold", self.curator.novelty_threshold),
            ("curator.utility_threshold", self.curator.utility_threshold),
            ("experience.critique_threshold", self.experience.critique_threshold),
        ] {
            if !value.is_finite() {
                return Err(Error::config(format!("{} must be finite", name)));
            }
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
