// src/matching/fuzzy.rs
// Fuzzywuzzy-style similarity ratios on a 0-100 scale, built on strsim.
// token_set_ratio drives retrieval; ratio and partial_ratio cross-validate
// the top candidate only.

use std::collections::BTreeSet;
use strsim::normalized_levenshtein;

/// Lowercases, maps non-alphanumeric characters to spaces, and collapses
/// runs; the shared pre-processing step for every ratio.
pub fn default_process(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b) * 100.0
}

/// Whole-string similarity in [0, 100].
pub fn ratio(a: &str, b: &str) -> f64 {
    levenshtein_ratio(&default_process(a), &default_process(b))
}

/// Substring-tolerant similarity: the shorter string against its best
/// aligned window of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a = default_process(a);
    let b = default_process(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (&a, &b)
    } else {
        (&b, &a)
    };
    let short_len = short.chars().count();
    let long_chars: Vec<char> = long.chars().collect();
    if short_len == long_chars.len() {
        return levenshtein_ratio(short, long);
    }
    let mut best = 0.0f64;
    for window in long_chars.windows(short_len) {
        let candidate: String = window.iter().collect();
        let score = levenshtein_ratio(short, &candidate);
        if score > best {
            best = score;
        }
        if best >= 100.0 {
            break;
        }
    }
    best
}

/// Order- and duplicate-insensitive token overlap similarity: compares the
/// sorted token intersection against each side's full sorted token set and
/// takes the best pairwise ratio.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let a = default_process(a);
    let b = default_process(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let tokens_a: BTreeSet<&str> = a.split(' ').collect();
    let tokens_b: BTreeSet<&str> = b.split(' ').collect();

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let sect = intersection.join(" ");
    let combined_a = join_nonempty(&sect, &only_a.join(" "));
    let combined_b = join_nonempty(&sect, &only_b.join(" "));

    let mut best = levenshtein_ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best
            .max(levenshtein_ratio(&sect, &combined_a))
            .max(levenshtein_ratio(&sect, &combined_b));
    }
    best
}

fn join_nonempty(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{} {}", left, right),
    }
}
