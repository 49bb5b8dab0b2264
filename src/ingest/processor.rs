// src/ingest/processor.rs
// One submission processing run: stream rows, validate, normalize, match
// each listed item against the run's catalog snapshot, and buffer writes.
// Single-threaded and row-at-a-time; the catalog is read-only after run
// start. An unhandled error rolls the whole submission back.

use std::collections::HashSet;

use anyhow::Result;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::config::MatchingConfig;
use crate::errors::{ProcessingError, RowValidationError};
use crate::ingest::rows::{validate_headers, HeaderMapping, Row, RowSource};
use crate::matching::retrieve::Catalog;
use crate::matching::{normalize, resolve, sanitize_free_text, MatchOutcome};
use crate::models::core::ItemKind;
use crate::models::review::{Alternative, ReviewDecision};
use crate::store::{NewItem, NewMember, NewReview, Store};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .unwrap_or_else(|e| panic!("invalid email regex: {e}"))
});

/// Placeholder cell values treated as empty.
const EMPTY_MARKERS: [&str; 5] = ["null", "none", "n/a", "na", "nan"];

/// Item columns and the kind each feeds. The first two are required
/// headers; the rest are picked up when present.
const ITEM_COLUMNS: [(&str, ItemKind); 4] = [
    ("products", ItemKind::Product),
    ("ingredients", ItemKind::Ingredient),
    ("certifications", ItemKind::Certification),
    ("allergens", ItemKind::Allergen),
];

/// Per-run state: the catalog snapshot and config, owned explicitly so
/// nothing reaches for globals mid-run.
pub struct RunContext {
    pub run_id: Uuid,
    pub catalog: Catalog,
    pub config: MatchingConfig,
}

impl RunContext {
    pub fn new(catalog: Catalog, config: MatchingConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            catalog,
            config,
        }
    }
}

/// Result of one processing run.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    pub submission_id: Option<i64>,
    /// A submission of this name was already processed; nothing was done.
    pub duplicate: bool,
    pub accepted_count: usize,
    pub validation_errors: Vec<RowValidationError>,
    pub valid_row_indices: Vec<usize>,
}

pub fn is_valid_cell(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) => {
            let trimmed = v.trim();
            !trimmed.is_empty() && !EMPTY_MARKERS.contains(&trimmed.to_lowercase().as_str())
        }
    }
}

pub fn validate_business_name(name: &str) -> std::result::Result<(), String> {
    let trimmed = name.trim();
    if trimmed.chars().count() < 2 {
        return Err("Business name must be at least 2 characters long".to_string());
    }
    if trimmed.chars().count() > 200 {
        return Err("Business name must be less than 200 characters".to_string());
    }
    if name.chars().any(|c| matches!(c, '<' | '>' | '"' | '\'')) {
        return Err("Business name contains invalid characters".to_string());
    }
    Ok(())
}

/// Email is optional; only a present, malformed value fails.
pub fn validate_email(email: Option<&str>) -> std::result::Result<(), String> {
    match email {
        None => Ok(()),
        Some(e) if e.is_empty() => Ok(()),
        Some(e) if EMAIL_RE.is_match(e) => Ok(()),
        Some(_) => Err("Invalid email format".to_string()),
    }
}

fn sanitized_cell(mapping: &HeaderMapping, row: &Row, field: &str) -> Option<String> {
    mapping
        .cell(row, field)
        .map(sanitize_free_text)
        .filter(|v| !v.is_empty())
}

/// Processes one submission file end to end. Row validation failures are
/// recorded and skipped; a store failure mid-run rolls the submission back
/// and aborts.
pub fn process_submission(
    store: &dyn Store,
    source: &mut dyn RowSource,
    mapping: &HeaderMapping,
    submission_name: &str,
    ctx: &RunContext,
) -> std::result::Result<ProcessOutcome, ProcessingError> {
    validate_headers(source.headers(), mapping)?;

    let submission_id = match store.try_create_submission(submission_name)? {
        Some(id) => id,
        None => {
            info!("⏭️  Skipping '{submission_name}': already processed");
            return Ok(ProcessOutcome {
                duplicate: true,
                ..ProcessOutcome::default()
            });
        }
    };
    info!(
        "📄 Run {}: processing '{}' against {} catalog entries",
        ctx.run_id,
        submission_name,
        ctx.catalog.total_entries()
    );

    match process_rows(store, source, mapping, submission_id, ctx) {
        Ok(mut outcome) => {
            outcome.submission_id = Some(submission_id);
            info!(
                "📄 Finished '{}': {} items, {} rows skipped",
                submission_name,
                outcome.accepted_count,
                outcome.validation_errors.len()
            );
            Ok(outcome)
        }
        Err(e) => {
            warn!("📄 Aborting '{submission_name}', rolling back: {e}");
            store.rollback_submission(submission_id)?;
            Err(ProcessingError::Aborted(e))
        }
    }
}

fn process_rows(
    store: &dyn Store,
    source: &mut dyn RowSource,
    mapping: &HeaderMapping,
    submission_id: i64,
    ctx: &RunContext,
) -> Result<ProcessOutcome> {
    let mut outcome = ProcessOutcome::default();
    let mut buffer: Vec<NewItem> = Vec::new();

    // Row 1 is the header; data rows are numbered from 2.
    let mut row_number = 1usize;
    while let Some(row) = source.next_row() {
        row_number += 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                outcome.validation_errors.push(RowValidationError {
                    row: row_number,
                    error: format!("Unreadable row: {e}"),
                });
                continue;
            }
        };

        let business = mapping.cell(&row, "businessName");
        let country = mapping.cell(&row, "country1");
        let mut row_errors = Vec::new();
        if !is_valid_cell(business) {
            row_errors.push("Missing or empty businessName");
        }
        if !is_valid_cell(country) {
            row_errors.push("Missing or empty country1");
        }
        if !row_errors.is_empty() {
            outcome.validation_errors.push(RowValidationError {
                row: row_number,
                error: row_errors.join("; "),
            });
            continue;
        }

        let business = sanitize_free_text(business.unwrap_or_default());
        let email = sanitized_cell(mapping, &row, "contactEmail");
        if let Err(error) = validate_business_name(&business) {
            outcome.validation_errors.push(RowValidationError {
                row: row_number,
                error: format!("Business name validation failed: {error}"),
            });
            continue;
        }
        if let Err(error) = validate_email(email.as_deref()) {
            outcome.validation_errors.push(RowValidationError {
                row: row_number,
                error: format!("Email validation failed: {error}"),
            });
            continue;
        }

        outcome.valid_row_indices.push(row_number);
        let member_id = store.insert_member(
            submission_id,
            NewMember {
                name: business.clone(),
                contact_email: email,
                street_address1: sanitized_cell(mapping, &row, "streetAddress1"),
                city1: sanitized_cell(mapping, &row, "city1"),
                country1: sanitize_free_text(country.unwrap_or_default()),
                company_bio: sanitized_cell(mapping, &row, "companyBio"),
            },
        )?;
        debug!("Row {row_number}: member '{business}' -> {member_id}");

        for (field, kind) in ITEM_COLUMNS {
            let cell = mapping.cell(&row, field);
            if !is_valid_cell(cell) {
                continue;
            }
            // Case-insensitive dedup of normalized names, per row and kind.
            let mut seen: HashSet<String> = HashSet::new();
            for fragment in cell.unwrap_or_default().split([';', ',']) {
                if !is_valid_cell(Some(fragment)) {
                    continue;
                }
                let normalized = normalize(&sanitize_free_text(fragment));
                if normalized.is_empty() || !seen.insert(normalized.to_lowercase()) {
                    continue;
                }
                buffer.push(match_item(member_id, fragment.trim(), &normalized, kind, ctx));
                outcome.accepted_count += 1;
                if buffer.len() >= ctx.config.batch_size {
                    store.insert_items(std::mem::take(&mut buffer))?;
                    debug!("Flushed at {} items", outcome.accepted_count);
                }
            }
        }
    }

    if !buffer.is_empty() {
        store.insert_items(buffer)?;
    }
    Ok(outcome)
}

/// Resolves one normalized item name and maps the outcome onto the item
/// and (when needed) its review record.
fn match_item(
    member_id: i64,
    raw_text: &str,
    normalized: &str,
    kind: ItemKind,
    ctx: &RunContext,
) -> NewItem {
    let mut item = NewItem {
        member_id,
        raw_text: raw_text.to_string(),
        normalized_text: normalized.to_string(),
        kind,
        matched_canonical_id: None,
        score: None,
        resolved: false,
        ignored: false,
        review: None,
    };

    match resolve(normalized, ctx.catalog.index(kind), &ctx.config) {
        MatchOutcome::ExactMatch { canonical_id } => {
            debug!("'{normalized}' ({kind}) exact match [{canonical_id}]");
            item.matched_canonical_id = Some(canonical_id);
            item.score = Some(100.0);
            item.resolved = true;
        }
        MatchOutcome::AutoResolved { canonical_id, score } => {
            debug!("'{normalized}' ({kind}) auto-resolved [{canonical_id}] at {score:.1}");
            item.matched_canonical_id = Some(canonical_id);
            item.score = Some(score);
            item.resolved = true;
        }
        MatchOutcome::SuggestedForReview {
            suggested_name,
            suggested_id,
            score,
            alternatives,
            prelink,
        } => {
            debug!("'{normalized}' ({kind}) suggests '{suggested_name}' at {score:.1}, needs review");
            if prelink {
                item.matched_canonical_id = suggested_id.clone();
            }
            item.score = Some(score);
            item.review = Some(NewReview {
                suggested_name,
                suggested_canonical_id: suggested_id,
                score,
                alternatives,
                decision: ReviewDecision::Pending,
            });
        }
        MatchOutcome::AutoRejected {
            suggested_name,
            suggested_id,
            score,
        } => {
            debug!("'{normalized}' ({kind}) no good match ({score:.1}), auto-rejected");
            item.score = Some(score);
            item.ignored = true;
            item.review = Some(NewReview {
                suggested_name,
                suggested_canonical_id: suggested_id,
                score,
                alternatives: Vec::<Alternative>::new(),
                decision: ReviewDecision::Rejected,
            });
        }
        MatchOutcome::NoCatalog => {
            debug!("'{normalized}' ({kind}) no catalog for kind, pending review");
            item.score = Some(0.0);
            item.review = Some(NewReview {
                suggested_name: normalized.to_string(),
                suggested_canonical_id: None,
                score: 0.0,
                alternatives: Vec::new(),
                decision: ReviewDecision::Pending,
            });
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::rows::PreparsedRows;
    use crate::models::core::CanonicalEntry;
    use crate::store::MemoryStore;

    fn headers() -> Vec<String> {
        ["businessName", "country1", "contactEmail", "products", "ingredients"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn catalog() -> Catalog {
        Catalog::from_entries(vec![
            CanonicalEntry {
                id: "P1".into(),
                title: "Omega-3".into(),
                kind: ItemKind::Product,
            },
            CanonicalEntry {
                id: "I1".into(),
                title: "Vitamin C".into(),
                kind: ItemKind::Ingredient,
            },
        ])
    }

    fn ctx() -> RunContext {
        RunContext::new(catalog(), MatchingConfig::default())
    }

    fn run(store: &MemoryStore, rows: Vec<Row>, name: &str) -> ProcessOutcome {
        let mut source = PreparsedRows::new(headers(), rows);
        process_submission(store, &mut source, &HeaderMapping::identity(), name, &ctx()).unwrap()
    }

    #[test]
    fn cell_validity_filters_placeholders() {
        assert!(is_valid_cell(Some("Stevia")));
        assert!(!is_valid_cell(None));
        assert!(!is_valid_cell(Some("  ")));
        for marker in ["null", "NULL", "None", "n/a", "NA", "NaN"] {
            assert!(!is_valid_cell(Some(marker)), "{marker} should be empty");
        }
    }

    #[test]
    fn business_name_rules() {
        assert!(validate_business_name("Acme Foods").is_ok());
        assert!(validate_business_name("A").is_err());
        assert!(validate_business_name(&"x".repeat(201)).is_err());
        assert!(validate_business_name("Acme <script>").is_err());
    }

    #[test]
    fn email_is_optional_but_checked_when_present() {
        assert!(validate_email(None).is_ok());
        assert!(validate_email(Some("buyer@example.com")).is_ok());
        assert!(validate_email(Some("not-an-email")).is_err());
    }

    #[test]
    fn exact_match_resolves_without_review() {
        let store = MemoryStore::new();
        let outcome = run(
            &store,
            vec![row(&[
                ("businessName", "Acme"),
                ("country1", "Canada"),
                ("products", "Omega-3"),
            ])],
            "file.csv",
        );
        assert_eq!(outcome.accepted_count, 1);
        assert!(outcome.validation_errors.is_empty());
        assert_eq!(outcome.valid_row_indices, vec![2]);

        let members = store.members_of(outcome.submission_id.unwrap()).unwrap();
        let items = store.items_of_member(members[0].id).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].resolved);
        assert_eq!(items[0].matched_canonical_id.as_deref(), Some("P1"));
        assert_eq!(items[0].score, Some(100.0));
        assert!(store.pending_reviews().unwrap().is_empty());
    }

    #[test]
    fn duplicate_names_within_a_cell_collapse() {
        let store = MemoryStore::new();
        let outcome = run(
            &store,
            vec![row(&[
                ("businessName", "Acme"),
                ("country1", "Canada"),
                ("ingredients", "Vitamin C, vitamin c; VITAMIN C"),
            ])],
            "file.csv",
        );
        assert_eq!(outcome.accepted_count, 1);
    }

    #[test]
    fn invalid_rows_are_skipped_and_recorded() {
        let store = MemoryStore::new();
        let outcome = run(
            &store,
            vec![
                row(&[("businessName", ""), ("country1", "Canada")]),
                row(&[("businessName", "Acme"), ("country1", "null")]),
                row(&[
                    ("businessName", "Acme"),
                    ("country1", "Canada"),
                    ("contactEmail", "not-an-email"),
                ]),
                row(&[("businessName", "Good Co"), ("country1", "Canada")]),
            ],
            "file.csv",
        );
        assert_eq!(outcome.validation_errors.len(), 3);
        assert_eq!(outcome.validation_errors[0].row, 2);
        assert!(outcome.validation_errors[1].error.contains("country1"));
        assert!(outcome.validation_errors[2].error.contains("Email"));
        assert_eq!(outcome.valid_row_indices, vec![5]);
    }

    #[test]
    fn duplicate_submission_is_a_no_op() {
        let store = MemoryStore::new();
        let rows = || {
            vec![row(&[
                ("businessName", "Acme"),
                ("country1", "Canada"),
                ("products", "Omega-3"),
            ])]
        };
        let first = run(&store, rows(), "file.csv");
        assert!(!first.duplicate);
        let second = run(&store, rows(), "file.csv");
        assert!(second.duplicate);
        assert_eq!(second.accepted_count, 0);
    }

    #[test]
    fn empty_catalog_kind_degrades_to_pending_review() {
        let store = MemoryStore::new();
        let mut source = PreparsedRows::new(
            headers(),
            vec![row(&[
                ("businessName", "Acme"),
                ("country1", "Canada"),
                ("products", "Mystery Product"),
            ])],
        );
        let empty_ctx = RunContext::new(Catalog::default(), MatchingConfig::default());
        let outcome = process_submission(
            &store,
            &mut source,
            &HeaderMapping::identity(),
            "file.csv",
            &empty_ctx,
        )
        .unwrap();
        assert_eq!(outcome.accepted_count, 1);

        let pending = store.pending_reviews().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].review.score, 0.0);
        assert_eq!(pending[0].review.suggested_name, "Mystery Product");
        assert!(pending[0].review.suggested_canonical_id.is_none());
    }

    #[test]
    fn missing_required_column_rejects_the_file() {
        let store = MemoryStore::new();
        let mut source = PreparsedRows::new(
            vec!["businessName".to_string(), "country1".to_string()],
            vec![],
        );
        let result = process_submission(
            &store,
            &mut source,
            &HeaderMapping::identity(),
            "file.csv",
            &ctx(),
        );
        assert!(matches!(result, Err(ProcessingError::MissingColumn(_))));
        assert!(store.latest_submission().unwrap().is_none());
    }
}
