// src/lib.rs

pub mod config;
pub mod errors;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod review;
pub mod store;
pub mod sync;
pub mod utils;

pub use config::{MatchingConfig, PenaltyWeights, SyncConfig};
pub use errors::{
    InvalidReviewChoice, ProcessingError, RowValidationError, StateConflict, SyncFailure,
};
pub use models::core::{CandidateItem, CanonicalEntry, ItemKind, Member, Submission};
pub use models::review::{Alternative, ReviewDecision, ReviewRecord};
