// src/config.rs
// Environment-driven configuration for matching, review, and sync.
// Core logic never reads the environment itself; values are passed in
// explicitly from these structs.

use log::{info, warn};
use std::env;
use std::time::Duration;

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Weights for the penalty-adjusted scoring model. Each penalty is
/// independently tunable; the additive-then-clamp semantics are fixed.
#[derive(Debug, Clone)]
pub struct PenaltyWeights {
    pub length_multiplier: f64,
    pub word_count_multiplier: f64,
    pub word_count_cap: f64,
    pub category_term_penalty: f64,
    pub special_chars_penalty: f64,
    pub numbers_penalty: f64,
    pub disagreement_penalty: f64,
    pub disagreement_threshold: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            length_multiplier: 30.0,
            word_count_multiplier: 10.0,
            word_count_cap: 25.0,
            category_term_penalty: 20.0,
            special_chars_penalty: 15.0,
            numbers_penalty: 15.0,
            disagreement_penalty: 15.0,
            disagreement_threshold: 20.0,
        }
    }
}

impl PenaltyWeights {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            length_multiplier: env_f64("LENGTH_PENALTY_MULTIPLIER", d.length_multiplier),
            word_count_multiplier: env_f64("WORD_COUNT_PENALTY_MULTIPLIER", d.word_count_multiplier),
            word_count_cap: env_f64("WORD_COUNT_PENALTY_CAP", d.word_count_cap),
            category_term_penalty: env_f64("DIETARY_TERMS_PENALTY", d.category_term_penalty),
            special_chars_penalty: env_f64("SPECIAL_CHARS_PENALTY", d.special_chars_penalty),
            numbers_penalty: env_f64("NUMBERS_PENALTY", d.numbers_penalty),
            disagreement_penalty: env_f64("ALGORITHM_DISAGREEMENT_PENALTY", d.disagreement_penalty),
            disagreement_threshold: env_f64(
                "ALGORITHM_DISAGREEMENT_THRESHOLD",
                d.disagreement_threshold,
            ),
        }
    }
}

/// Thresholds and limits for retrieval and decisioning.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Scores at or above this auto-resolve without review.
    pub auto_resolve_threshold: f64,
    /// Scores at or above this pre-link the suggested match on the item.
    pub fuzzy_threshold: f64,
    /// Scores below this auto-reject; [auto_reject, auto_resolve) needs review.
    pub auto_reject_threshold: f64,
    /// Floor for the batch high-confidence approval band.
    pub high_confidence_floor: f64,
    /// Candidates fetched per query.
    pub retrieval_limit: usize,
    /// Alternatives recorded on a review, excluding the suggestion.
    pub alternatives_limit: usize,
    /// Item/review writes are flushed to the store every this many items.
    pub batch_size: usize,
    pub penalties: PenaltyWeights,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            auto_resolve_threshold: 97.0,
            fuzzy_threshold: 85.0,
            auto_reject_threshold: 50.0,
            high_confidence_floor: 90.0,
            retrieval_limit: 10,
            alternatives_limit: 3,
            batch_size: 1000,
            penalties: PenaltyWeights::default(),
        }
    }
}

impl MatchingConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            auto_resolve_threshold: env_f64("AUTO_RESOLVE_THRESHOLD", d.auto_resolve_threshold),
            fuzzy_threshold: env_f64("FUZZY_MATCH_THRESHOLD", d.fuzzy_threshold),
            auto_reject_threshold: env_f64("AUTO_REJECT_THRESHOLD", d.auto_reject_threshold),
            high_confidence_floor: env_f64("HIGH_CONFIDENCE_THRESHOLD", d.high_confidence_floor),
            retrieval_limit: env_usize("RETRIEVAL_LIMIT", d.retrieval_limit),
            alternatives_limit: env_usize("ALTERNATIVES_LIMIT", d.alternatives_limit),
            batch_size: env_usize("BATCH_SIZE", d.batch_size),
            penalties: PenaltyWeights::from_env(),
        }
    }

    pub fn log_config(&self) {
        info!(
            "🎯 Matching thresholds: auto-resolve={}, suggest-floor={}, auto-reject={}",
            self.auto_resolve_threshold, self.fuzzy_threshold, self.auto_reject_threshold
        );
        info!(
            "   High-confidence batch band: [{}, {})",
            self.high_confidence_floor, self.auto_resolve_threshold
        );
        info!(
            "   Retrieval limit: {}, alternatives: {}, flush batch: {}",
            self.retrieval_limit, self.alternatives_limit, self.batch_size
        );
    }
}

/// Connection settings for the external graph store collaborator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub url: Option<String>,
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            url: env::var("DGRAPH_URL").ok().filter(|v| !v.is_empty()),
            api_token: env::var("DGRAPH_API_TOKEN").ok().filter(|v| !v.is_empty()),
            timeout: Duration::from_secs(env_usize("DGRAPH_TIMEOUT", 30) as u64),
            max_retries: env_usize("DGRAPH_MAX_RETRIES", 3) as u32,
            base_delay: Duration::from_secs(env_usize("DGRAPH_RETRY_DELAY", 1) as u64),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_token.is_some()
    }

    pub fn log_config(&self) {
        if self.is_configured() {
            info!(
                "🔗 Graph store configured (timeout: {:?}, retries: {})",
                self.timeout, self.max_retries
            );
        } else {
            warn!("🔗 Graph store NOT configured - runs degrade to an empty catalog and push is skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_are_ordered() {
        let cfg = MatchingConfig::default();
        assert!(cfg.auto_reject_threshold < cfg.fuzzy_threshold);
        assert!(cfg.fuzzy_threshold < cfg.auto_resolve_threshold);
        assert!(cfg.high_confidence_floor < cfg.auto_resolve_threshold);
    }
}
