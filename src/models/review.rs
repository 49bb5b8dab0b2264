// src/models/review.rs
// The persisted audit/decision artifact for one candidate item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Pending,
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewDecision::Pending)
    }
}

/// A ranked alternative to the suggested match, or, after a multi-select
/// approval, one of the reviewer's chosen canonical links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub canonical_id: Option<String>,
    /// Set only by a multi-select approval.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl Alternative {
    pub fn ranked(name: impl Into<String>, score: f64, canonical_id: Option<String>) -> Self {
        Self {
            name: Some(name.into()),
            score: Some(score),
            canonical_id,
            selected: false,
        }
    }

    pub fn selected(canonical_id: impl Into<String>) -> Self {
        Self {
            name: None,
            score: None,
            canonical_id: Some(canonical_id.into()),
            selected: true,
        }
    }
}

/// One-to-one with its owning `CandidateItem`. Once the decision leaves
/// `Pending` the record is terminal and drops out of pending-review queries.
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub id: i64,
    pub item_id: i64,
    pub suggested_name: String,
    pub suggested_canonical_id: Option<String>,
    pub score: f64,
    pub alternatives: Vec<Alternative>,
    pub decision: ReviewDecision,
    pub created_at: DateTime<Utc>,
}
