// src/main.rs
// Phased pipeline driver: ingest + match, optional batch review
// operations, then push to the graph store.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use reconcile_lib::config::{MatchingConfig, SyncConfig};
use reconcile_lib::ingest::{open_row_source, process_submission, HeaderMapping, RunContext};
use reconcile_lib::matching::retrieve::Catalog;
use reconcile_lib::matching::SemanticGuard;
use reconcile_lib::review::{
    approve_all_as_new, approve_high_confidence, ignore_all, review_summary,
};
use reconcile_lib::store::{MemoryStore, Store};
use reconcile_lib::sync::{sync_submission, CatalogSource, GraphStoreClient};
use reconcile_lib::utils::load_env;

#[derive(Parser, Debug)]
#[command(name = "reconcile", about = "Match submission spreadsheets against the canonical catalog")]
struct Args {
    /// Submission file to process (.csv)
    file: PathBuf,

    /// Delete all previously processed submissions first
    #[arg(long)]
    clear_previous: bool,

    /// Batch-approve pending reviews in the high-confidence band
    #[arg(long)]
    approve_high_confidence: bool,

    /// Batch-approve every remaining pending review as a new entry
    #[arg(long)]
    approve_all_new: bool,

    /// Batch-ignore every remaining pending review
    #[arg(long)]
    ignore_pending: bool,

    /// Push reviewed results to the graph store
    #[arg(long)]
    push: bool,
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = Args::parse();
    info!("Starting submission matching pipeline");

    let matching_config = MatchingConfig::from_env();
    matching_config.log_config();
    let sync_config = SyncConfig::from_env();
    sync_config.log_config();

    let store = MemoryStore::new();
    if args.clear_previous {
        store.clear_all()?;
        info!("🧹 Cleared previously processed submissions");
    }

    let client = GraphStoreClient::from_config(&sync_config)?;

    // Catalog snapshot for the whole run. Fetch failures degrade to an
    // empty catalog so every item lands in review instead of aborting.
    let catalog = match &client {
        Some(client) => {
            let pb = spinner("Fetching canonical catalog...");
            let entries = match client.fetch_catalog().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Could not fetch canonical catalog, degrading to empty: {e}");
                    Vec::new()
                }
            };
            pb.finish_and_clear();
            Catalog::from_entries(entries)
        }
        None => Catalog::default(),
    };

    // Phase 1: ingest and match.
    let phase1_start = Instant::now();
    let submission_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .context("submission file has no usable name")?
        .to_string();
    let mut source = open_row_source(&args.file)?;
    let ctx = RunContext::new(catalog, matching_config.clone());
    let pb = spinner("Phase 1: processing submission rows...");
    let outcome = process_submission(
        &store,
        source.as_mut(),
        &HeaderMapping::identity(),
        &submission_name,
        &ctx,
    )?;
    pb.finish_and_clear();
    info!("Phase 1 complete in {:.2?}", phase1_start.elapsed());
    if outcome.duplicate {
        info!("Nothing to do: '{submission_name}' was already processed");
        return Ok(());
    }
    for error in &outcome.validation_errors {
        warn!("Row {}: {}", error.row, error.error);
    }
    info!(
        "Accepted {} items from {} valid rows ({} skipped)",
        outcome.accepted_count,
        outcome.valid_row_indices.len(),
        outcome.validation_errors.len()
    );

    // Phase 2: batch review operations.
    let phase2_start = Instant::now();
    if args.approve_high_confidence {
        let result = approve_high_confidence(&store, &matching_config, &SemanticGuard::default())?;
        for item_id in &result.semantic_rejections {
            warn!("Item {item_id} held for manual review by the semantic guard");
        }
    }
    if args.approve_all_new {
        approve_all_as_new(&store)?;
    }
    if args.ignore_pending {
        ignore_all(&store)?;
    }
    let summary = review_summary(&store)?;
    info!(
        "Phase 2 complete in {:.2?}: {} pending, {} new, {} matched, {} unresolved",
        phase2_start.elapsed(),
        summary.pending,
        summary.approved_new,
        summary.approved_matched,
        summary.unresolved
    );

    // Phase 3: push.
    if args.push {
        let phase3_start = Instant::now();
        match (&client, outcome.submission_id) {
            (Some(client), Some(submission_id)) => {
                if summary.pending > 0 {
                    warn!(
                        "{} reviews still pending; their items will not be pushed",
                        summary.pending
                    );
                }
                let pb = spinner("Phase 3: pushing to graph store...");
                let report = sync_submission(&store, submission_id, client, &sync_config).await?;
                pb.finish_and_clear();
                for failure in &report.errors {
                    warn!("{}: {}", failure.business, failure.cause);
                }
                info!(
                    "Phase 3 complete in {:.2?}: {} businesses pushed ({} linked, {} created), {} failed",
                    phase3_start.elapsed(),
                    report.pushed_members,
                    report.linked_items,
                    report.created_items,
                    report.errors.len()
                );
            }
            (None, _) => warn!("Push requested but the graph store is not configured"),
            (_, None) => warn!("Push requested but no submission was created"),
        }
    }

    info!("Pipeline finished");
    Ok(())
}
