// src/review/mod.rs
// Review state machine: single-item decisions and the three batch
// operations. Every transition writes the review and its item together,
// and a terminal review is never reopened.

use anyhow::Result;
use log::{debug, info};

use crate::config::MatchingConfig;
use crate::errors::{InvalidReviewChoice, StateConflict};
use crate::matching::SemanticGuard;
use crate::models::review::{Alternative, ReviewDecision};
use crate::store::{PendingReview, Store};

/// A reviewer's verdict on one pending review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewChoice {
    /// The submitted name is genuinely new; resolve with no canonical link.
    ApproveAsNew,
    /// Link the item to one canonical entry.
    ApproveMatch(String),
    /// Link the item to several canonical entries. The first id becomes the
    /// item's primary link; the whole selection is recorded as selected
    /// alternatives on the review. Must be non-empty.
    ApproveMulti(Vec<String>),
    /// Drop the item from further consideration.
    Ignore,
}

/// Whether a transition was applied or lost the race to an earlier decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Applied,
    NotFoundOrHandled,
}

/// Applies one decision to the pending review of `item_id`. Idempotent:
/// a missing review or one already past `Pending` reports
/// `NotFoundOrHandled` instead of overwriting the earlier outcome.
pub fn handle_review(store: &dyn Store, item_id: i64, choice: ReviewChoice) -> Result<ReviewAction> {
    let Some(mut review) = store.review_for_item(item_id)? else {
        return Ok(ReviewAction::NotFoundOrHandled);
    };
    if review.decision.is_terminal() {
        return Ok(ReviewAction::NotFoundOrHandled);
    }
    let Some(mut item) = store.item(item_id)? else {
        return Ok(ReviewAction::NotFoundOrHandled);
    };
    if item.ignored {
        return Ok(ReviewAction::NotFoundOrHandled);
    }

    match choice {
        ReviewChoice::ApproveAsNew => {
            review.decision = ReviewDecision::Approved;
            item.resolved = true;
            item.matched_canonical_id = None;
        }
        ReviewChoice::ApproveMatch(canonical_id) => {
            review.decision = ReviewDecision::Approved;
            item.resolved = true;
            item.matched_canonical_id = Some(canonical_id);
        }
        ReviewChoice::ApproveMulti(ids) => {
            if ids.is_empty() {
                return Err(InvalidReviewChoice {
                    reason: "multi-select approval requires at least one canonical id",
                }
                .into());
            }
            review.decision = ReviewDecision::Approved;
            item.resolved = true;
            item.matched_canonical_id = Some(ids[0].clone());
            // The ranked alternatives are replaced by the full selection,
            // primary included; the first id doubles as the item's link.
            review.alternatives = ids
                .iter()
                .map(|id| Alternative::selected(id.clone()))
                .collect();
        }
        ReviewChoice::Ignore => {
            review.decision = ReviewDecision::Rejected;
            item.ignored = true;
            item.resolved = false;
            item.matched_canonical_id = None;
        }
    }

    debug!(
        "Review for item {} -> {:?} (score {:.1})",
        item_id, review.decision, review.score
    );
    store.save_review_and_item(review, item)?;
    Ok(ReviewAction::Applied)
}

/// Like [`handle_review`], but turns the lost-race outcome into a hard
/// `StateConflict` error for callers that must not silently no-op.
pub fn handle_review_strict(
    store: &dyn Store,
    item_id: i64,
    choice: ReviewChoice,
) -> Result<()> {
    match handle_review(store, item_id, choice)? {
        ReviewAction::Applied => Ok(()),
        ReviewAction::NotFoundOrHandled => Err(StateConflict { item_id }.into()),
    }
}

/// Counts returned by the batch operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    /// Item ids the semantic guard kept pending (high-confidence batch only).
    pub semantic_rejections: Vec<i64>,
}

/// Approves every pending review as a brand-new entry.
pub fn approve_all_as_new(store: &dyn Store) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for pending in store.pending_reviews()? {
        if handle_review(store, pending.item.id, ReviewChoice::ApproveAsNew)? == ReviewAction::Applied
        {
            outcome.applied += 1;
        }
    }
    info!("✅ Approved {} pending reviews as new entries", outcome.applied);
    Ok(outcome)
}

/// Approves pending reviews whose score sits in the high-confidence band
/// `[high_confidence_floor, auto_resolve_threshold)` with a linked
/// suggestion, subject to the semantic guard. Vetoed reviews stay pending
/// and are reported for the caller to surface.
pub fn approve_high_confidence(
    store: &dyn Store,
    config: &MatchingConfig,
    guard: &SemanticGuard,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for pending in store.pending_reviews()? {
        if !in_high_confidence_band(&pending, config) {
            continue;
        }
        let Some(canonical_id) = pending.review.suggested_canonical_id.clone() else {
            continue;
        };
        if !guard.is_plausible(&pending.item.normalized_text, &pending.review.suggested_name) {
            debug!(
                "Semantic guard kept item {} pending: '{}' vs '{}'",
                pending.item.id, pending.item.normalized_text, pending.review.suggested_name
            );
            outcome.semantic_rejections.push(pending.item.id);
            continue;
        }
        if handle_review(store, pending.item.id, ReviewChoice::ApproveMatch(canonical_id))?
            == ReviewAction::Applied
        {
            outcome.applied += 1;
        }
    }
    info!(
        "✅ High-confidence batch: {} approved, {} held by semantic guard",
        outcome.applied,
        outcome.semantic_rejections.len()
    );
    Ok(outcome)
}

fn in_high_confidence_band(pending: &PendingReview, config: &MatchingConfig) -> bool {
    pending.review.score >= config.high_confidence_floor
        && pending.review.score < config.auto_resolve_threshold
}

/// Rejects every pending review and flags the items ignored.
pub fn ignore_all(store: &dyn Store) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for pending in store.pending_reviews()? {
        if handle_review(store, pending.item.id, ReviewChoice::Ignore)? == ReviewAction::Applied {
            outcome.applied += 1;
        }
    }
    info!("🚫 Ignored {} pending reviews", outcome.applied);
    Ok(outcome)
}

/// Post-review categorization of the item population.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    pub pending: usize,
    pub approved_new: usize,
    pub approved_matched: usize,
    pub unresolved: usize,
}

pub fn review_summary(store: &dyn Store) -> Result<ReviewSummary> {
    Ok(ReviewSummary {
        pending: store.pending_reviews()?.len(),
        approved_new: store.approved_new_items()?.len(),
        approved_matched: store.approved_matched_items()?.len(),
        unresolved: store.unresolved_items()?.len(),
    })
}
