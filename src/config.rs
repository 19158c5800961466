use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config_error;
use crate::errors::Result;
use crate::style_vector::DEFAULT_MIN_GAMES;

/// Style aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Games below which a style vector is flagged low confidence
    pub min_games: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_games: DEFAULT_MIN_GAMES,
        }
    }
}

/// Archetype clustering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of archetypes (fixed, never reduced to fit a small corpus)
    pub k_arch: usize,
    pub max_iterations: usize,
    /// Seed for choosing the initial centroids
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k_arch: 50,
            max_iterations: 100,
            seed: 42,
        }
    }
}

impl ClusterConfig {
    pub fn with_k_arch(mut self, k_arch: usize) -> Self {
        self.k_arch = k_arch;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// How candidate peers are gathered before ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Linear scan over every reference player
    #[default]
    Exhaustive,
    /// Only members of the query's `probes` nearest archetypes, falling back
    /// to the exhaustive scan when that yields fewer than K candidates
    Archetype { probes: usize },
}

/// Peer matching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Number of peers returned
    pub k: usize,
    pub strategy: SearchStrategy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            k: 5,
            strategy: SearchStrategy::Exhaustive,
        }
    }
}

/// Opening recommendation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// Minimum peer games for an opening to be considered reliable
    pub min_games: usize,
    /// Openings returned per side
    pub top_n: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            min_games: 3,
            top_n: 3,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub aggregation: AggregationConfig,
    pub cluster: ClusterConfig,
    pub matching: MatchingConfig,
    pub recommend: RecommendConfig,
}

impl EngineConfig {
    /// Load overrides from a JSON file; missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_k_arch(mut self, k_arch: usize) -> Self {
        self.cluster.k_arch = k_arch;
        self
    }

    pub fn with_peers(mut self, k: usize) -> Self {
        self.matching.k = k;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.matching.strategy = strategy;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.recommend.top_n = top_n;
        self
    }

    /// Reject values that can only produce meaningless results.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.k_arch == 0 {
            return Err(config_error!("cluster.k_arch must be at least 1"));
        }
        if self.cluster.max_iterations == 0 {
            return Err(config_error!("cluster.max_iterations must be at least 1"));
        }
        if self.matching.k == 0 {
            return Err(config_error!("matching.k must be at least 1"));
        }
        if let SearchStrategy::Archetype { probes: 0 } = self.matching.strategy {
            return Err(config_error!("matching.strategy.probes must be at least 1"));
        }
        if self.recommend.top_n == 0 {
            return Err(config_error!("recommend.top_n must be at least 1"));
        }
        Ok(())
    }
}
