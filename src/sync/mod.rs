// src/sync/mod.rs
// Push of reviewed submissions to the external graph store, plus the
// per-run canonical catalog fetch. Each business is its own error
// boundary: a failed push is recorded and the run moves on, so partial
// completion across businesses is the expected outcome shape.

use async_trait::async_trait;
use log::{info, warn};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::SyncConfig;
use crate::errors::SyncFailure;
use crate::models::core::{CanonicalEntry, ItemKind, Member};
use crate::store::Store;

/// Failure talking to the external target. `transient` gates retry:
/// timeouts and 5xx responses are worth another attempt, 4xx and
/// malformed payloads are not.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TargetError {
    pub message: String,
    pub transient: bool,
}

impl TargetError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

impl From<reqwest::Error> for TargetError {
    fn from(e: reqwest::Error) -> Self {
        let transient = e.is_timeout()
            || e.is_connect()
            || e.status().map(|s| s.is_server_error()).unwrap_or(false);
        Self {
            message: e.to_string(),
            transient,
        }
    }
}

/// Per-run supplier of the canonical catalog. Unavailability degrades the
/// run to an empty catalog; it never aborts processing.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<CanonicalEntry>, TargetError>;
}

/// One business's resolved entity graph, ready to push: attributes,
/// canonical ids to link, and brand-new names to create.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberGraph {
    pub business_name: String,
    pub contact_email: Option<String>,
    pub street_address1: Option<String>,
    pub city1: Option<String>,
    pub country: String,
    pub company_bio: Option<String>,
    pub link_ids: Vec<String>,
    pub create_names: Vec<(ItemKind, String)>,
}

#[async_trait]
pub trait SyncTarget: Send + Sync {
    async fn push_member(&self, graph: &MemberGraph) -> Result<(), TargetError>;
}

/// Runs an operation with bounded exponential backoff. Only transient
/// failures are retried; the delay starts at `base_delay` and doubles.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &SyncConfig,
    mut operation: F,
) -> Result<T, TargetError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, TargetError>>,
{
    let mut delay = config.base_delay;
    let mut last_error = TargetError::permanent("no attempts made");
    for attempt in 1..=config.max_retries.max(1) {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.transient && attempt < config.max_retries.max(1) => {
                warn!(
                    "🔗 Attempt {}/{} failed, retrying in {:?}: {}",
                    attempt, config.max_retries, delay, e
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                last_error = e;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_error)
}

/// Summary of one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub pushed_members: usize,
    pub created_items: usize,
    pub linked_items: usize,
    pub errors: Vec<SyncFailure>,
}

/// Assembles the push payload for one member from its resolved items.
/// Primary links come off the items; auxiliary links come from selected
/// alternatives recorded by multi-select approvals. Ignored and still
/// pending items never leave the system.
pub fn member_graph(store: &dyn Store, member: &Member) -> anyhow::Result<MemberGraph> {
    let mut link_ids = Vec::new();
    let mut create_names = Vec::new();
    for item in store.items_of_member(member.id)? {
        if !item.resolved || item.ignored {
            continue;
        }
        match &item.matched_canonical_id {
            Some(id) => {
                if !link_ids.contains(id) {
                    link_ids.push(id.clone());
                }
                if let Some(review) = store.review_for_item(item.id)? {
                    for alt in review.alternatives.iter().filter(|a| a.selected) {
                        if let Some(alt_id) = &alt.canonical_id {
                            if !link_ids.contains(alt_id) {
                                link_ids.push(alt_id.clone());
                            }
                        }
                    }
                }
            }
            None => create_names.push((item.kind, item.normalized_text.clone())),
        }
    }
    Ok(MemberGraph {
        business_name: member.name.clone(),
        contact_email: member.contact_email.clone(),
        street_address1: member.street_address1.clone(),
        city1: member.city1.clone(),
        country: member.country1.clone(),
        company_bio: member.company_bio.clone(),
        link_ids,
        create_names,
    })
}

/// Pushes every member of a submission to the target. Members missing a
/// country are skipped with a recorded failure; each push gets the retry
/// policy and its own error boundary.
pub async fn sync_submission(
    store: &dyn Store,
    submission_id: i64,
    target: &dyn SyncTarget,
    config: &SyncConfig,
) -> anyhow::Result<SyncReport> {
    let mut report = SyncReport::default();
    for member in store.members_of(submission_id)? {
        if member.country1.trim().is_empty() {
            warn!("🔗 Skipping '{}': missing country", member.name);
            report.errors.push(SyncFailure {
                business: member.name.clone(),
                cause: "Missing country - skipped".to_string(),
            });
            continue;
        }
        let graph = member_graph(store, &member)?;
        match retry_with_backoff(config, || target.push_member(&graph)).await {
            Ok(()) => {
                info!(
                    "🔗 Pushed '{}' ({} links, {} new)",
                    graph.business_name,
                    graph.link_ids.len(),
                    graph.create_names.len()
                );
                report.pushed_members += 1;
                report.linked_items += graph.link_ids.len();
                report.created_items += graph.create_names.len();
            }
            Err(e) => {
                warn!(
                    "🔗 Failed to push '{}', no partial writes for this business: {}",
                    graph.business_name, e
                );
                report.errors.push(SyncFailure {
                    business: graph.business_name.clone(),
                    cause: e.to_string(),
                });
            }
        }
    }
    info!(
        "🔗 Sync finished: {} pushed, {} failed",
        report.pushed_members,
        report.errors.len()
    );
    Ok(report)
}

/// HTTP client for the graph store: GraphQL over POST with a `Dg-Auth`
/// token header and the configured timeout.
pub struct GraphStoreClient {
    http: reqwest::Client,
    url: String,
    api_token: String,
}

impl GraphStoreClient {
    /// `None` when the target is not configured; callers degrade.
    pub fn from_config(config: &SyncConfig) -> anyhow::Result<Option<Self>> {
        let (Some(url), Some(api_token)) = (config.url.clone(), config.api_token.clone()) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Some(Self {
            http,
            url,
            api_token,
        }))
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, TargetError> {
        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Dg-Auth", &self.api_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(TargetError::transient(format!("graph store returned {status}")));
        }
        if !status.is_success() {
            return Err(TargetError::permanent(format!("graph store returned {status}")));
        }
        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(TargetError::permanent(format!("graph store errors: {errors:?}")));
            }
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

const CATALOG_QUERY: &str = r#"
query {
  products: queryProduct { title productID }
  ingredients: queryIngredients { title ingredientID }
  certifications: queryCertification { title certificationID }
  allergens: queryAllergen { title allergenID }
}
"#;

const PUSH_MEMBER_MUTATION: &str = r#"
mutation ($in: [AddMemberInput!]!) {
  addMember(input: $in) {
    member { memberID businessName }
  }
}
"#;

fn entries_from(data: &Value, field: &str, id_field: &str, kind: ItemKind) -> Vec<CanonicalEntry> {
    data.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let title = item.get("title")?.as_str()?;
                    let id = item.get(id_field)?.as_str()?;
                    Some(CanonicalEntry {
                        id: id.to_string(),
                        title: title.to_string(),
                        kind,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl CatalogSource for GraphStoreClient {
    async fn fetch_catalog(&self) -> Result<Vec<CanonicalEntry>, TargetError> {
        let data = self.graphql(CATALOG_QUERY, Value::Null).await?;
        let mut entries = entries_from(&data, "products", "productID", ItemKind::Product);
        entries.extend(entries_from(&data, "ingredients", "ingredientID", ItemKind::Ingredient));
        entries.extend(entries_from(
            &data,
            "certifications",
            "certificationID",
            ItemKind::Certification,
        ));
        entries.extend(entries_from(&data, "allergens", "allergenID", ItemKind::Allergen));
        info!("🔗 Fetched {} canonical entries", entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl SyncTarget for GraphStoreClient {
    async fn push_member(&self, graph: &MemberGraph) -> Result<(), TargetError> {
        let mut member = json!({
            "businessName": graph.business_name,
            "country1": { "title": graph.country },
            "streetAddress1": graph
                .street_address1
                .clone()
                .unwrap_or_else(|| "Not provided".to_string()),
        });
        if let Some(email) = &graph.contact_email {
            member["contactEmail"] = json!(email);
        }
        if let Some(city) = &graph.city1 {
            member["city1"] = json!(city);
        }
        if let Some(bio) = &graph.company_bio {
            member["companyBio"] = json!(bio);
        }
        if !graph.link_ids.is_empty() {
            member["links"] = json!(graph.link_ids);
        }
        if !graph.create_names.is_empty() {
            member["create"] = json!(graph
                .create_names
                .iter()
                .map(|(kind, name)| json!({ "kind": kind.as_str(), "title": name }))
                .collect::<Vec<_>>());
        }
        self.graphql(PUSH_MEMBER_MUTATION, json!({ "in": [member] }))
            .await?;
        Ok(())
    }
}
