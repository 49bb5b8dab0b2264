// src/store/mod.rs
// Persistence collaborator boundary. The core talks to this trait only;
// MemoryStore is the single-process implementation. The check-and-create
// used for submission idempotency must be atomic, which MemoryStore gets
// from its interior lock (the row-level-lock analogue).

use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::models::core::{CandidateItem, ItemKind, Member, Submission};
use crate::models::review::{Alternative, ReviewDecision, ReviewRecord};

/// Insert payload for one member row.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub contact_email: Option<String>,
    pub street_address1: Option<String>,
    pub city1: Option<String>,
    pub country1: String,
    pub company_bio: Option<String>,
}

/// Insert payload for one candidate item, with its review record when the
/// classifier produced one. Buffered by the processor and flushed in batches.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub member_id: i64,
    pub raw_text: String,
    pub normalized_text: String,
    pub kind: ItemKind,
    pub matched_canonical_id: Option<String>,
    pub score: Option<f64>,
    pub resolved: bool,
    pub ignored: bool,
    pub review: Option<NewReview>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub suggested_name: String,
    pub suggested_canonical_id: Option<String>,
    pub score: f64,
    pub alternatives: Vec<Alternative>,
    pub decision: ReviewDecision,
}

/// A pending review joined with its owning item.
#[derive(Debug, Clone)]
pub struct PendingReview {
    pub review: ReviewRecord,
    pub item: CandidateItem,
}

pub trait Store: Send + Sync {
    /// Atomic check-and-create for the idempotency guard. Returns `None`
    /// when a submission of this name already exists (duplicate: no-op).
    fn try_create_submission(&self, name: &str) -> Result<Option<i64>>;

    /// All-or-nothing rollback of one submission and its descendants, used
    /// when row processing aborts partway through.
    fn rollback_submission(&self, submission_id: i64) -> Result<()>;

    fn latest_submission(&self) -> Result<Option<Submission>>;

    /// Cascade-deletes every submission, member, item, and review
    /// (clear-previous / cancel-review).
    fn clear_all(&self) -> Result<()>;

    fn insert_member(&self, submission_id: i64, member: NewMember) -> Result<i64>;

    /// Batch flush of buffered items and their reviews.
    fn insert_items(&self, items: Vec<NewItem>) -> Result<()>;

    fn members_of(&self, submission_id: i64) -> Result<Vec<Member>>;
    fn items_of_member(&self, member_id: i64) -> Result<Vec<CandidateItem>>;
    fn item(&self, item_id: i64) -> Result<Option<CandidateItem>>;
    fn review_for_item(&self, item_id: i64) -> Result<Option<ReviewRecord>>;

    /// Pending reviews double-filtered on decision and owner state: a
    /// record whose item is already ignored never surfaces.
    fn pending_reviews(&self) -> Result<Vec<PendingReview>>;

    /// Writes a review/item pair back, the unit of one state transition.
    fn save_review_and_item(&self, review: ReviewRecord, item: CandidateItem) -> Result<()>;

    /// Resolved items with no canonical link: approved to create as new.
    fn approved_new_items(&self) -> Result<Vec<CandidateItem>>;
    /// Resolved items carrying a canonical link.
    fn approved_matched_items(&self) -> Result<Vec<CandidateItem>>;
    /// Items still awaiting a decision.
    fn unresolved_items(&self) -> Result<Vec<CandidateItem>>;
}

#[derive(Default)]
struct StoreInner {
    submissions: Vec<Submission>,
    members: BTreeMap<i64, Member>,
    items: BTreeMap<i64, CandidateItem>,
    reviews: BTreeMap<i64, ReviewRecord>,
    next_id: i64,
}

impl StoreInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store backing the single-process, single-database system.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn try_create_submission(&self, name: &str) -> Result<Option<i64>> {
        let mut inner = self.lock();
        if inner.submissions.iter().any(|s| s.name == name) {
            return Ok(None);
        }
        let id = inner.next_id();
        inner.submissions.push(Submission {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    fn rollback_submission(&self, submission_id: i64) -> Result<()> {
        let mut inner = self.lock();
        let member_ids: Vec<i64> = inner
            .members
            .values()
            .filter(|m| m.submission_id == submission_id)
            .map(|m| m.id)
            .collect();
        let item_ids: Vec<i64> = inner
            .items
            .values()
            .filter(|i| member_ids.contains(&i.member_id))
            .map(|i| i.id)
            .collect();
        inner.reviews.retain(|_, r| !item_ids.contains(&r.item_id));
        inner.items.retain(|id, _| !item_ids.contains(id));
        inner.members.retain(|id, _| !member_ids.contains(id));
        inner.submissions.retain(|s| s.id != submission_id);
        Ok(())
    }

    fn latest_submission(&self) -> Result<Option<Submission>> {
        Ok(self.lock().submissions.last().cloned())
    }

    fn clear_all(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.submissions.clear();
        inner.members.clear();
        inner.items.clear();
        inner.reviews.clear();
        Ok(())
    }

    fn insert_member(&self, submission_id: i64, member: NewMember) -> Result<i64> {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.members.insert(
            id,
            Member {
                id,
                submission_id,
                name: member.name,
                contact_email: member.contact_email,
                street_address1: member.street_address1,
                city1: member.city1,
                country1: member.country1,
                company_bio: member.company_bio,
            },
        );
        Ok(id)
    }

    fn insert_items(&self, items: Vec<NewItem>) -> Result<()> {
        let mut inner = self.lock();
        for new_item in items {
            let item_id = inner.next_id();
            inner.items.insert(
                item_id,
                CandidateItem {
                    id: item_id,
                    member_id: new_item.member_id,
                    raw_text: new_item.raw_text,
                    normalized_text: new_item.normalized_text,
                    kind: new_item.kind,
                    matched_canonical_id: new_item.matched_canonical_id,
                    score: new_item.score,
                    resolved: new_item.resolved,
                    ignored: new_item.ignored,
                },
            );
            if let Some(review) = new_item.review {
                let review_id = inner.next_id();
                inner.reviews.insert(
                    review_id,
                    ReviewRecord {
                        id: review_id,
                        item_id,
                        suggested_name: review.suggested_name,
                        suggested_canonical_id: review.suggested_canonical_id,
                        score: review.score,
                        alternatives: review.alternatives,
                        decision: review.decision,
                        created_at: Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }

    fn members_of(&self, submission_id: i64) -> Result<Vec<Member>> {
        Ok(self
            .lock()
            .members
            .values()
            .filter(|m| m.submission_id == submission_id)
            .cloned()
            .collect())
    }

    fn items_of_member(&self, member_id: i64) -> Result<Vec<CandidateItem>> {
        Ok(self
            .lock()
            .items
            .values()
            .filter(|i| i.member_id == member_id)
            .cloned()
            .collect())
    }

    fn item(&self, item_id: i64) -> Result<Option<CandidateItem>> {
        Ok(self.lock().items.get(&item_id).cloned())
    }

    fn review_for_item(&self, item_id: i64) -> Result<Option<ReviewRecord>> {
        Ok(self
            .lock()
            .reviews
            .values()
            .find(|r| r.item_id == item_id)
            .cloned())
    }

    fn pending_reviews(&self) -> Result<Vec<PendingReview>> {
        let inner = self.lock();
        let mut pending = Vec::new();
        for review in inner.reviews.values() {
            if review.decision != ReviewDecision::Pending {
                continue;
            }
            if let Some(item) = inner.items.get(&review.item_id) {
                if item.ignored {
                    continue;
                }
                pending.push(PendingReview {
                    review: review.clone(),
                    item: item.clone(),
                });
            }
        }
        Ok(pending)
    }

    fn save_review_and_item(&self, review: ReviewRecord, item: CandidateItem) -> Result<()> {
        let mut inner = self.lock();
        inner.reviews.insert(review.id, review);
        inner.items.insert(item.id, item);
        Ok(())
    }

    fn approved_new_items(&self) -> Result<Vec<CandidateItem>> {
        Ok(self
            .lock()
            .items
            .values()
            .filter(|i| i.resolved && i.matched_canonical_id.is_none() && !i.ignored)
            .cloned()
            .collect())
    }

    fn approved_matched_items(&self) -> Result<Vec<CandidateItem>> {
        Ok(self
            .lock()
            .items
            .values()
            .filter(|i| i.resolved && i.matched_canonical_id.is_some() && !i.ignored)
            .cloned()
            .collect())
    }

    fn unresolved_items(&self) -> Result<Vec<CandidateItem>> {
        Ok(self
            .lock()
            .items
            .values()
            .filter(|i| i.is_pending())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(member_id: i64, name: &str, review: Option<NewReview>) -> NewItem {
        NewItem {
            member_id,
            raw_text: name.to_string(),
            normalized_text: name.to_string(),
            kind: ItemKind::Product,
            matched_canonical_id: None,
            score: None,
            resolved: false,
            ignored: false,
            review,
        }
    }

    fn pending_review(name: &str, score: f64) -> NewReview {
        NewReview {
            suggested_name: name.to_string(),
            suggested_canonical_id: Some("P1".to_string()),
            score,
            alternatives: vec![],
            decision: ReviewDecision::Pending,
        }
    }

    #[test]
    fn duplicate_submission_is_detected() {
        let store = MemoryStore::new();
        assert!(store.try_create_submission("file.csv").unwrap().is_some());
        assert!(store.try_create_submission("file.csv").unwrap().is_none());
        assert!(store.try_create_submission("other.csv").unwrap().is_some());
    }

    #[test]
    fn rollback_cascades() {
        let store = MemoryStore::new();
        let sub = store.try_create_submission("file.csv").unwrap().unwrap();
        let member = store
            .insert_member(
                sub,
                NewMember {
                    name: "Acme".into(),
                    contact_email: None,
                    street_address1: None,
                    city1: None,
                    country1: "Canada".into(),
                    company_bio: None,
                },
            )
            .unwrap();
        store
            .insert_items(vec![new_item(member, "Stevia", Some(pending_review("Stevia", 80.0)))])
            .unwrap();
        assert_eq!(store.pending_reviews().unwrap().len(), 1);

        store.rollback_submission(sub).unwrap();
        assert!(store.latest_submission().unwrap().is_none());
        assert!(store.pending_reviews().unwrap().is_empty());
        assert!(store.members_of(sub).unwrap().is_empty());
    }

    #[test]
    fn pending_query_excludes_ignored_items() {
        let store = MemoryStore::new();
        let sub = store.try_create_submission("file.csv").unwrap().unwrap();
        let member = store
            .insert_member(
                sub,
                NewMember {
                    name: "Acme".into(),
                    contact_email: None,
                    street_address1: None,
                    city1: None,
                    country1: "Canada".into(),
                    company_bio: None,
                },
            )
            .unwrap();
        store
            .insert_items(vec![new_item(member, "Stevia", Some(pending_review("Stevia", 80.0)))])
            .unwrap();

        let pending = store.pending_reviews().unwrap();
        assert_eq!(pending.len(), 1);

        // Flip the item to ignored without touching the review decision;
        // the double filter must still hide it.
        let mut item = pending[0].item.clone();
        item.ignored = true;
        store
            .save_review_and_item(pending[0].review.clone(), item)
            .unwrap();
        assert!(store.pending_reviews().unwrap().is_empty());
    }
}
