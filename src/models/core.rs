// src/models/core.rs
// Submission, member, and candidate-item records plus the canonical
// vocabulary entry fetched from the external graph store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Product,
    Ingredient,
    Certification,
    Allergen,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Product => "product",
            ItemKind::Ingredient => "ingredient",
            ItemKind::Certification => "certification",
            ItemKind::Allergen => "allergen",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One approved vocabulary item from the external reference store.
/// Immutable once fetched; the pool lives only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
}

/// One uploaded file. The name is unique: re-processing the same filename
/// is detected by the idempotency check and treated as a no-op.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One business row from a submission.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: i64,
    pub submission_id: i64,
    pub name: String,
    pub contact_email: Option<String>,
    pub street_address1: Option<String>,
    pub city1: Option<String>,
    pub country1: String,
    pub company_bio: Option<String>,
}

/// One free-text name split out of a submission row cell.
///
/// Resolution invariants:
/// - `resolved` with `matched_canonical_id` set: linked to an existing entry.
/// - `resolved` with no id: approved to create as a brand-new canonical entry.
/// - neither `resolved` nor `ignored`: awaiting or pending a decision.
#[derive(Debug, Clone)]
pub struct CandidateItem {
    pub id: i64,
    pub member_id: i64,
    pub raw_text: String,
    pub normalized_text: String,
    pub kind: ItemKind,
    pub matched_canonical_id: Option<String>,
    pub score: Option<f64>,
    pub resolved: bool,
    pub ignored: bool,
}

impl CandidateItem {
    pub fn is_pending(&self) -> bool {
        !self.resolved && !self.ignored
    }
}
