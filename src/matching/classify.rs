// src/matching/classify.rs
// Maps penalized scores onto the three decision bands and assembles the
// review payload (suggestion + ranked alternatives) for one query.

use crate::config::MatchingConfig;
use crate::matching::penalties::apply_penalties;
use crate::matching::retrieve::{aux_scores, retrieve, CatalogIndex};
use crate::models::review::Alternative;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AutoResolved,
    SuggestedForReview,
    AutoRejected,
}

/// First match wins: resolve ceiling, then the needs-judgment band, then
/// the reject floor.
pub fn classify(penalized_score: f64, config: &MatchingConfig) -> Decision {
    if penalized_score >= config.auto_resolve_threshold {
        Decision::AutoResolved
    } else if penalized_score >= config.auto_reject_threshold {
        Decision::SuggestedForReview
    } else {
        Decision::AutoRejected
    }
}

/// Outcome of resolving one normalized item name against one kind's pool.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Case-insensitive exact hit; retrieval and scoring were bypassed.
    ExactMatch { canonical_id: String },
    /// Penalized score cleared the auto-resolve ceiling.
    AutoResolved { canonical_id: String, score: f64 },
    /// Needs human judgment. `prelink` is set when the score also cleared
    /// the fuzzy threshold, pre-linking the suggestion on the item.
    SuggestedForReview {
        suggested_name: String,
        suggested_id: Option<String>,
        score: f64,
        alternatives: Vec<Alternative>,
        prelink: bool,
    },
    /// Below the reject floor. A review record is still written, pre-set
    /// to rejected, for audit and override.
    AutoRejected {
        suggested_name: String,
        suggested_id: Option<String>,
        score: f64,
    },
    /// Degraded mode: the pool for this kind is empty, so everything needs
    /// review. The item's own name becomes the suggestion at score zero.
    NoCatalog,
}

/// Runs the full retrieval + penalty + classification pipeline for one
/// normalized query. The best candidate is chosen by penalized score, not
/// raw score; alternatives keep penalized descending order.
pub fn resolve(query: &str, index: &CatalogIndex, config: &MatchingConfig) -> MatchOutcome {
    if let Some(id) = index.exact(query) {
        return MatchOutcome::ExactMatch {
            canonical_id: id.to_string(),
        };
    }
    if index.is_empty() {
        return MatchOutcome::NoCatalog;
    }

    let raw_candidates = retrieve(query, index.titles(), config.retrieval_limit);
    let raw_top_name = raw_candidates
        .first()
        .map(|c| c.name.clone())
        .unwrap_or_default();

    let mut penalized: Vec<(String, f64)> = raw_candidates
        .into_iter()
        .map(|c| {
            let aux = if c.name == raw_top_name {
                Some(aux_scores(query, &c.name))
            } else {
                None
            };
            let score = apply_penalties(query, &c.name, c.raw_score, aux.as_ref(), &config.penalties);
            (c.name, score)
        })
        .collect();
    penalized.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (best_name, best_score) = match penalized.first() {
        Some((name, score)) => (name.clone(), *score),
        None => return MatchOutcome::NoCatalog,
    };
    let best_id = index.id_for(&best_name).map(str::to_string);

    match classify(best_score, config) {
        Decision::AutoResolved => match best_id {
            Some(canonical_id) => MatchOutcome::AutoResolved {
                canonical_id,
                score: best_score,
            },
            // A pool title without an id cannot be linked; fall through to review.
            None => MatchOutcome::SuggestedForReview {
                suggested_name: best_name.clone(),
                suggested_id: None,
                score: best_score,
                alternatives: build_alternatives(&penalized, &best_name, index, config),
                prelink: false,
            },
        },
        Decision::SuggestedForReview => MatchOutcome::SuggestedForReview {
            alternatives: build_alternatives(&penalized, &best_name, index, config),
            prelink: best_score >= config.fuzzy_threshold && best_id.is_some(),
            suggested_name: best_name,
            suggested_id: best_id,
            score: best_score,
        },
        Decision::AutoRejected => MatchOutcome::AutoRejected {
            suggested_name: best_name,
            suggested_id: best_id,
            score: best_score,
        },
    }
}

/// Up to `alternatives_limit` ranked entries, each distinct from the
/// suggestion, preserving descending penalized order.
fn build_alternatives(
    penalized: &[(String, f64)],
    suggestion: &str,
    index: &CatalogIndex,
    config: &MatchingConfig,
) -> Vec<Alternative> {
    let mut alternatives = Vec::new();
    for (name, score) in penalized {
        if name == suggestion {
            continue;
        }
        alternatives.push(Alternative::ranked(
            name.clone(),
            *score,
            index.id_for(name).map(str::to_string),
        ));
        if alternatives.len() >= config.alternatives_limit {
            break;
        }
    }
    alternatives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::{CanonicalEntry, ItemKind};

    fn index(titles: &[(&str, &str)]) -> CatalogIndex {
        let entries: Vec<CanonicalEntry> = titles
            .iter()
            .map(|(id, title)| CanonicalEntry {
                id: id.to_string(),
                title: title.to_string(),
                kind: ItemKind::Product,
            })
            .collect();
        CatalogIndex::from_entries(&entries)
    }

    fn config() -> MatchingConfig {
        MatchingConfig::default()
    }

    #[test]
    fn exact_match_short_circuits() {
        let idx = index(&[("P1", "Omega-3")]);
        assert_eq!(
            resolve("omega-3", &idx, &config()),
            MatchOutcome::ExactMatch {
                canonical_id: "P1".to_string()
            }
        );
    }

    #[test]
    fn empty_pool_degrades_to_review() {
        let idx = index(&[]);
        assert_eq!(resolve("Anything", &idx, &config()), MatchOutcome::NoCatalog);
    }

    #[test]
    fn near_identical_name_auto_resolves() {
        // Not an exact string match, but identical after token processing;
        // only the trailing period's length penalty applies.
        let idx = index(&[("P1", "Sunflower Oil"), ("P2", "Stevia")]);
        match resolve("Sunflower Oil.", &idx, &config()) {
            MatchOutcome::AutoResolved { canonical_id, score } => {
                assert_eq!(canonical_id, "P1");
                assert!(score >= 97.0);
            }
            other => panic!("expected auto-resolve, got {:?}", other),
        }
    }

    #[test]
    fn mid_band_suggests_for_review() {
        // Token-set hits 100 but length/word penalties pull the pair into
        // the needs-judgment band.
        let idx = index(&[("P1", "Stevia"), ("P2", "Sunflower Oil")]);
        match resolve("Stevia Extract", &idx, &config()) {
            MatchOutcome::SuggestedForReview {
                suggested_name,
                suggested_id,
                score,
                alternatives,
                ..
            } => {
                assert_eq!(suggested_name, "Stevia");
                assert_eq!(suggested_id.as_deref(), Some("P1"));
                assert!((50.0..97.0).contains(&score), "score was {}", score);
                assert!(alternatives.iter().all(|a| a.name.as_deref() != Some("Stevia")));
            }
            other => panic!("expected review, got {:?}", other),
        }
    }

    #[test]
    fn hopeless_query_auto_rejects() {
        let idx = index(&[("P1", "Organic Raw Cacao Powder 500g")]);
        match resolve("Zinc", &idx, &config()) {
            MatchOutcome::AutoRejected { score, .. } => {
                assert!(score < 50.0, "score was {}", score);
            }
            other => panic!("expected auto-reject, got {:?}", other),
        }
    }

    #[test]
    fn alternatives_exclude_suggestion_and_cap_at_limit() {
        let idx = index(&[
            ("P1", "Stevia"),
            ("P2", "Stevia Leaf"),
            ("P3", "Stevia Powder"),
            ("P4", "Stevia Drops"),
            ("P5", "Stevia Syrup"),
        ]);
        match resolve("Stevia Extract", &idx, &config()) {
            MatchOutcome::SuggestedForReview {
                suggested_name,
                alternatives,
                ..
            } => {
                assert!(alternatives.len() <= 3);
                assert!(alternatives
                    .iter()
                    .all(|a| a.name.as_deref() != Some(suggested_name.as_str())));
                let scores: Vec<f64> = alternatives.iter().filter_map(|a| a.score).collect();
                assert!(scores.windows(2).all(|w| w[0] >= w[1]));
            }
            other => panic!("expected review, got {:?}", other),
        }
    }

    #[test]
    fn classify_bands_are_ordered() {
        let cfg = config();
        assert_eq!(classify(97.0, &cfg), Decision::AutoResolved);
        assert_eq!(classify(96.9, &cfg), Decision::SuggestedForReview);
        assert_eq!(classify(50.0, &cfg), Decision::SuggestedForReview);
        assert_eq!(classify(49.9, &cfg), Decision::AutoRejected);
    }

    #[test]
    fn threshold_monotonicity() {
        let idx = index(&[("P1", "Sunflower Oil")]);
        let mut strict = config();
        strict.auto_resolve_threshold = 99.9;
        // Raising the ceiling can only demote auto-resolves to review,
        // never promote anything.
        for query in ["Sunflower Oil Co", "Sunflower Oils"] {
            let relaxed_outcome = resolve(query, &idx, &config());
            let strict_outcome = resolve(query, &idx, &strict);
            if matches!(strict_outcome, MatchOutcome::AutoResolved { .. }) {
                assert!(matches!(relaxed_outcome, MatchOutcome::AutoResolved { .. }));
            }
        }
        let mut lenient_reject = config();
        lenient_reject.auto_reject_threshold = 10.0;
        let rejecting = resolve("Zinc", &index(&[("P1", "Organic Raw Cacao Powder 500g")]), &config());
        assert!(matches!(rejecting, MatchOutcome::AutoRejected { .. }));
        let kept = resolve(
            "Zinc",
            &index(&[("P1", "Organic Raw Cacao Powder 500g")]),
            &lenient_reject,
        );
        // Lowering the floor converts rejects into reviews, never the reverse.
        assert!(matches!(
            kept,
            MatchOutcome::SuggestedForReview { .. } | MatchOutcome::AutoRejected { .. }
        ));
    }
}
