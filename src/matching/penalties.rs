// src/matching/penalties.rs
// Domain-aware penalty adjustment of raw similarity scores. Penalties are
// independent and additive; the result is clamped to [0, 100].

use crate::config::PenaltyWeights;
use crate::matching::retrieve::AuxScores;

/// Dietary/quality descriptors. A mismatch in their presence signals that
/// two lexically close names describe different products.
const CATEGORY_TERMS: [&str; 6] = [
    "gluten-free",
    "organic",
    "natural",
    "raw",
    "extra virgin",
    "whole grain",
];

const SPECIAL_CHARS: [char; 10] = ['!', '@', '#', '$', '%', '^', '&', '*', '(', ')'];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

fn has_category_term(s: &str) -> bool {
    let lower = s.to_lowercase();
    CATEGORY_TERMS.iter().any(|t| lower.contains(t))
}

fn special_char_count(s: &str) -> usize {
    s.chars().filter(|c| SPECIAL_CHARS.contains(c)).count()
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

/// Adjusts `raw_score` for a query/candidate pair. `aux` is present only
/// for the raw-top candidate; its disagreement penalty fires when the three
/// algorithms diverge by more than the configured threshold.
pub fn apply_penalties(
    query: &str,
    candidate: &str,
    raw_score: f64,
    aux: Option<&AuxScores>,
    weights: &PenaltyWeights,
) -> f64 {
    let mut score = raw_score;

    let (qlen, clen) = (char_len(query), char_len(candidate));
    let max_len = qlen.max(clen);
    if max_len > 0 {
        let length_diff = qlen.abs_diff(clen) as f64;
        score -= (length_diff / max_len as f64) * weights.length_multiplier;
    }

    let word_diff = word_count(query).abs_diff(word_count(candidate)) as f64;
    score -= (word_diff * weights.word_count_multiplier).min(weights.word_count_cap);

    if has_category_term(query) != has_category_term(candidate) {
        score -= weights.category_term_penalty;
    }

    if special_char_count(query) != special_char_count(candidate) {
        score -= weights.special_chars_penalty;
    }

    if has_digit(query) != has_digit(candidate) {
        score -= weights.numbers_penalty;
    }

    if let Some(aux) = aux {
        let variance = (raw_score - aux.ratio)
            .abs()
            .max((raw_score - aux.partial).abs());
        if variance > weights.disagreement_threshold {
            score -= weights.disagreement_penalty;
        }
    }

    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> PenaltyWeights {
        PenaltyWeights::default()
    }

    #[test]
    fn identical_names_are_unpenalized() {
        assert_eq!(
            apply_penalties("Stevia", "Stevia", 100.0, None, &weights()),
            100.0
        );
    }

    #[test]
    fn length_penalty_scales_with_difference() {
        // |14 - 6| / 14 * 30 ≈ 17.1, plus one word of difference (10).
        let score = apply_penalties("Stevia Extract", "Stevia", 100.0, None, &weights());
        assert!((score - 72.86).abs() < 0.1, "score was {}", score);
    }

    #[test]
    fn word_count_penalty_is_capped() {
        let query = "one two three four five six seven";
        let base = apply_penalties(query, "one", 100.0, None, &weights());
        // Six extra words would be 60 uncapped; the cap holds it at 25.
        let uncapped_floor = 100.0 - 25.0 - 30.0; // cap + max length penalty
        assert!(base >= uncapped_floor, "score was {}", base);
    }

    #[test]
    fn category_term_mismatch_penalized() {
        // Equal lengths and word counts; only the category term differs.
        let with = apply_penalties("Organic Stevia", "Stevia Leaf", 90.0, None, &weights());
        let without = apply_penalties("Crunchy Stevia", "Stevia Leaf", 90.0, None, &weights());
        assert_eq!(without - with, 20.0);
    }

    #[test]
    fn numeric_mismatch_penalized() {
        let a = apply_penalties("Vitamin B12", "Vitamin B", 95.0, None, &weights());
        let b = apply_penalties("Vitamin B", "Vitamin B", 95.0, None, &weights());
        assert!(b - a >= 15.0);
    }

    #[test]
    fn disagreement_penalty_fires_above_threshold() {
        let aux_close = AuxScores { ratio: 90.0, partial: 95.0 };
        let aux_far = AuxScores { ratio: 60.0, partial: 95.0 };
        let close = apply_penalties("Stevia", "Stevia", 95.0, Some(&aux_close), &weights());
        let far = apply_penalties("Stevia", "Stevia", 95.0, Some(&aux_far), &weights());
        assert_eq!(close - far, 15.0);
    }

    #[test]
    fn penalized_score_stays_bounded() {
        let extreme = apply_penalties(
            "a",
            "an extremely long candidate name with many many words 123 !!!",
            10.0,
            Some(&AuxScores { ratio: 0.0, partial: 0.0 }),
            &weights(),
        );
        assert_eq!(extreme, 0.0);
        let high = apply_penalties("same", "same", 150.0, None, &weights());
        assert_eq!(high, 100.0);
    }
}
