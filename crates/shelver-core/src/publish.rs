//! Publishing a grouping plan to the entity store.
//!
//! Children first, parent last: each group becomes a child entity carrying
//! its subset of the parent's components, then one version is appended to the
//! parent removing the grouped components and adding the reorganization
//! description. The parent append is the commit point -- children created by
//! an interrupted earlier attempt are deduplicated by the store's content
//! addressing or left orphaned.

use std::collections::BTreeMap;
use std::sync::Arc;

use shelver_types::batch::CreatedGroup;
use shelver_types::entity::{
    AppendVersionRequest, CreateEntityRequest, GROUP_ENTITY_TYPE, REORG_DESCRIPTION_COMPONENT,
};
use shelver_types::error::StoreError;
use shelver_types::organize::OrganizePlan;
use tracing::{info, warn};

use crate::llm::retry::backoff_delay;
use crate::store::EntityStore;

/// Attempts per store write before giving up on CAS conflicts and flakes.
const STORE_RETRY_ATTEMPTS: u32 = 3;

/// What the publisher needs to know about one item.
#[derive(Debug, Clone)]
pub struct PublishItem {
    /// Parent entity id.
    pub id: String,
    pub directory_path: String,
    /// Parent component manifest as fetched.
    pub components: BTreeMap<String, String>,
    pub plan: OrganizePlan,
}

/// The result of a successful publication.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub new_tip: String,
    pub new_version: u64,
    pub groups_created: Vec<CreatedGroup>,
    pub warnings: Vec<String>,
}

/// Publishes grouping plans as child entities plus one parent version.
pub struct Publisher<S> {
    store: Arc<S>,
}

impl<S> Clone for Publisher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EntityStore> Publisher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Publish one item's plan. A plan with no groups publishes nothing and
    /// leaves the parent untouched.
    pub async fn publish(&self, item: &PublishItem) -> Result<Option<PublishOutcome>, StoreError> {
        let mut warnings = Vec::new();
        let mut groups_created = Vec::new();
        let mut components_to_remove: Vec<String> = Vec::new();

        for group in &item.plan.groups {
            // Only components the parent actually has can move into a child.
            let subset: BTreeMap<String, String> = group
                .files
                .iter()
                .filter_map(|name| {
                    item.components
                        .get(name)
                        .map(|cid| (name.clone(), cid.clone()))
                })
                .collect();

            if subset.is_empty() {
                warn!(
                    id = %item.id,
                    group = %group.group_name,
                    "group has no matching components, skipping"
                );
                warnings.push(format!(
                    "skipped group '{}': none of its files are components of {}",
                    group.group_name, item.id
                ));
                continue;
            }

            let request = CreateEntityRequest {
                components: subset.clone(),
                parent: Some(item.id.clone()),
                entity_type: GROUP_ENTITY_TYPE.to_string(),
                note: Some(format!("group '{}' split out of {}", group.group_name, item.id)),
            };
            let child = self
                .with_store_retry(|| self.store.create_entity(&request))
                .await?;

            components_to_remove.extend(subset.keys().cloned());
            groups_created.push(CreatedGroup {
                group_name: group.group_name.clone(),
                id: child.id,
                files: subset.keys().cloned().collect(),
                description: group.description.clone(),
            });
        }

        if groups_created.is_empty() {
            // Nothing to commit: either the plan had no groups or every group
            // was skipped. The parent stays as it is.
            return Ok(None);
        }

        components_to_remove.sort();
        components_to_remove.dedup();

        let description_cid = self
            .with_store_retry(|| {
                self.store.upload(
                    REORG_DESCRIPTION_COMPONENT,
                    render_description(item, &groups_created).into_bytes(),
                )
            })
            .await?;

        // The commit point. The tip is refetched inside every attempt: a tip
        // captured before the loop goes stale the moment anyone else writes.
        let mut attempt = 0u32;
        let parent = loop {
            attempt += 1;
            let current = self.store.get_entity(&item.id).await?;
            let request = AppendVersionRequest {
                expect_tip: current.tip,
                components: BTreeMap::from([(
                    REORG_DESCRIPTION_COMPONENT.to_string(),
                    description_cid.clone(),
                )]),
                components_remove: components_to_remove.clone(),
                note: Some(format!(
                    "reorganized into {} group(s)",
                    groups_created.len()
                )),
            };
            match self.store.append_version(&item.id, &request).await {
                Ok(entity) => break entity,
                Err(err) if err.is_retryable() && attempt < STORE_RETRY_ATTEMPTS => {
                    warn!(
                        id = %item.id,
                        attempt,
                        error = %err,
                        "parent append failed, refetching tip and retrying"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        };

        info!(
            id = %item.id,
            new_tip = %parent.tip,
            groups = groups_created.len(),
            "published grouping plan"
        );

        Ok(Some(PublishOutcome {
            new_tip: parent.tip,
            new_version: parent.version,
            groups_created,
            warnings,
        }))
    }

    /// Retry a store write on transient failures and CAS conflicts.
    async fn with_store_retry<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < STORE_RETRY_ATTEMPTS => {
                    warn!(attempt, error = %err, "store write failed, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn render_description(item: &PublishItem, groups: &[CreatedGroup]) -> String {
    let mut text = format!(
        "Reorganization of {}\n\n{}\n\nGroups:\n",
        item.directory_path, item.plan.description
    );
    for group in groups {
        text.push_str(&format!(
            "- {} ({} files): {}\n",
            group.group_name,
            group.files.len(),
            group.description
        ));
    }
    if !item.plan.ungrouped.is_empty() {
        text.push_str(&format!(
            "\nLeft in place: {}\n",
            item.plan.ungrouped.join(", ")
        ));
    }
    text
}
