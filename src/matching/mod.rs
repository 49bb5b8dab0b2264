// src/matching/mod.rs

pub mod classify;
pub mod fuzzy;
pub mod normalize;
pub mod penalties;
pub mod retrieve;
pub mod semantic;

pub use classify::{classify, resolve, Decision, MatchOutcome};
pub use normalize::{normalize, sanitize_free_text};
pub use retrieve::{Catalog, CatalogIndex};
pub use semantic::SemanticGuard;
