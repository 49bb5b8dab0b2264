// src/matching/retrieve.rs
// Per-run canonical pool snapshot and fuzzy candidate retrieval.

use std::collections::HashMap;

use crate::matching::fuzzy::{partial_ratio, ratio, token_set_ratio};
use crate::models::core::{CanonicalEntry, ItemKind};

/// One kind's slice of the canonical pool: ordered titles for stable
/// retrieval plus id lookups, including a case-insensitive one for the
/// exact-match short circuit.
#[derive(Debug, Default, Clone)]
pub struct CatalogIndex {
    titles: Vec<String>,
    id_by_title: HashMap<String, String>,
    id_by_lower: HashMap<String, String>,
}

impl CatalogIndex {
    pub fn from_entries(entries: &[CanonicalEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            if index.id_by_title.contains_key(&entry.title) {
                continue;
            }
            index.titles.push(entry.title.clone());
            index
                .id_by_title
                .insert(entry.title.clone(), entry.id.clone());
            index
                .id_by_lower
                .insert(entry.title.to_lowercase(), entry.id.clone());
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn id_for(&self, title: &str) -> Option<&str> {
        self.id_by_title.get(title).map(String::as_str)
    }

    /// Case-insensitive exact lookup; a hit bypasses retrieval and scoring.
    pub fn exact(&self, query: &str) -> Option<&str> {
        self.id_by_lower.get(&query.to_lowercase()).map(String::as_str)
    }
}

/// The in-memory canonical pool for one processing run, refreshed from the
/// external store at run start and read-only thereafter.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    products: CatalogIndex,
    ingredients: CatalogIndex,
    certifications: CatalogIndex,
    allergens: CatalogIndex,
}

impl Catalog {
    pub fn from_entries(entries: Vec<CanonicalEntry>) -> Self {
        let mut by_kind: HashMap<ItemKind, Vec<CanonicalEntry>> = HashMap::new();
        for entry in entries {
            by_kind.entry(entry.kind).or_default().push(entry);
        }
        let index = |kind: ItemKind, by_kind: &HashMap<ItemKind, Vec<CanonicalEntry>>| {
            by_kind
                .get(&kind)
                .map(|e| CatalogIndex::from_entries(e))
                .unwrap_or_default()
        };
        Self {
            products: index(ItemKind::Product, &by_kind),
            ingredients: index(ItemKind::Ingredient, &by_kind),
            certifications: index(ItemKind::Certification, &by_kind),
            allergens: index(ItemKind::Allergen, &by_kind),
        }
    }

    pub fn index(&self, kind: ItemKind) -> &CatalogIndex {
        match kind {
            ItemKind::Product => &self.products,
            ItemKind::Ingredient => &self.ingredients,
            ItemKind::Certification => &self.certifications,
            ItemKind::Allergen => &self.allergens,
        }
    }

    pub fn total_entries(&self) -> usize {
        self.products.len() + self.ingredients.len() + self.certifications.len()
            + self.allergens.len()
    }
}

/// One raw retrieval hit, before penalties.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub name: String,
    pub raw_score: f64,
}

/// Auxiliary cross-validation scores, computed for the raw-top candidate
/// only. They never re-rank; they feed the disagreement penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxScores {
    pub ratio: f64,
    pub partial: f64,
}

/// Token-set retrieval over the pool: top `limit` by raw score descending,
/// ties broken by pool order (stable sort).
pub fn retrieve(query: &str, pool: &[String], limit: usize) -> Vec<RawCandidate> {
    let mut candidates: Vec<RawCandidate> = pool
        .iter()
        .map(|name| RawCandidate {
            name: name.clone(),
            raw_score: token_set_ratio(query, name),
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(limit);
    candidates
}

pub fn aux_scores(query: &str, candidate: &str) -> AuxScores {
    AuxScores {
        ratio: ratio(query, candidate),
        partial: partial_ratio(query, candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, kind: ItemKind) -> CanonicalEntry {
        CanonicalEntry {
            id: id.to_string(),
            title: title.to_string(),
            kind,
        }
    }

    #[test]
    fn exact_lookup_is_case_insensitive() {
        let index = CatalogIndex::from_entries(&[entry("P1", "Omega-3", ItemKind::Product)]);
        assert_eq!(index.exact("omega-3"), Some("P1"));
        assert_eq!(index.exact("OMEGA-3"), Some("P1"));
        assert_eq!(index.exact("omega 3"), None);
    }

    #[test]
    fn retrieval_ranks_descending_with_stable_ties() {
        let pool = vec![
            "Stevia".to_string(),
            "Sunflower Oil".to_string(),
            "Stevia Extract".to_string(),
        ];
        let hits = retrieve("stevia", &pool, 10);
        assert_eq!(hits[0].name, "Stevia");
        assert_eq!(hits[0].raw_score, 100.0);
        // Both remaining entries keep pool order among equal scores.
        assert!(hits[1].raw_score >= hits[2].raw_score);
    }

    #[test]
    fn retrieval_respects_limit() {
        let pool: Vec<String> = (0..20).map(|i| format!("item {}", i)).collect();
        assert_eq!(retrieve("item", &pool, 10).len(), 10);
    }

    #[test]
    fn catalog_routes_by_kind() {
        let catalog = Catalog::from_entries(vec![
            entry("P1", "Stevia", ItemKind::Product),
            entry("I1", "Stevia", ItemKind::Ingredient),
        ]);
        assert_eq!(catalog.index(ItemKind::Product).exact("stevia"), Some("P1"));
        assert_eq!(catalog.index(ItemKind::Ingredient).exact("stevia"), Some("I1"));
        assert!(catalog.index(ItemKind::Allergen).is_empty());
        assert_eq!(catalog.total_entries(), 2);
    }
}
