//! Context fetching: turn an entity id into organize-ready file inputs.
//!
//! Reads the entity manifest, then pulls component content in parallel.
//! Text components become `text` inputs; `.ref.json` sidecars are parsed for
//! OCR text and descriptive metadata and become `ref` inputs. A failed
//! sub-fetch costs one file and one warning, never the whole item.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use shelver_types::entity::REORG_DESCRIPTION_COMPONENT;
use shelver_types::error::StoreError;
use shelver_types::organize::FileInput;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::store::EntityStore;

/// Extensions treated as fetchable text.
const TEXT_EXTENSIONS: [&str; 12] = [
    "txt", "md", "markdown", "csv", "json", "html", "htm", "xml", "yaml", "yml", "log", "rst",
];

/// Sidecar suffix marking a non-text artifact descriptor.
const REF_SUFFIX: &str = ".ref.json";

/// Everything the organize and publish steps need for one directory.
#[derive(Debug, Clone)]
pub struct ItemContext {
    pub tip: String,
    pub directory_path: String,
    pub files: Vec<FileInput>,
    pub components: BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

/// A `.ref.json` sidecar as stored: OCR text plus descriptive metadata.
#[derive(Debug, Deserialize)]
struct RefSidecar {
    #[serde(default)]
    ocr: Option<String>,
    #[serde(default, rename = "type")]
    mime: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Whether a component name should be fetched as text.
///
/// Skips hidden files and the reorganization description a previous run may
/// have left behind -- feeding that back into the model would bias it toward
/// repeating the old grouping.
fn is_text_component(name: &str) -> bool {
    if name == REORG_DESCRIPTION_COMPONENT || name.starts_with('.') {
        return false;
    }
    name.rsplit_once('.')
        .map(|(_, ext)| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_ref_component(name: &str) -> bool {
    name.ends_with(REF_SUFFIX)
}

/// Fetches a directory entity's components into [`FileInput`]s.
pub struct ContextFetcher<S> {
    store: Arc<S>,
}

impl<S> Clone for ContextFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EntityStore + 'static> ContextFetcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch the entity and all organizable component content.
    pub async fn fetch_context(&self, id: &str) -> Result<ItemContext, StoreError> {
        let entity = self.store.get_entity(id).await?;
        let directory_path = entity.name.clone().unwrap_or_else(|| entity.id.clone());

        let mut join_set: JoinSet<(String, Result<FileInput, StoreError>)> = JoinSet::new();
        for (name, cid) in &entity.components {
            let fetch_as_text = is_text_component(name);
            let fetch_as_ref = is_ref_component(name);
            if !fetch_as_text && !fetch_as_ref {
                debug!(component = %name, "skipping non-organizable component");
                continue;
            }

            let store = Arc::clone(&self.store);
            let name = name.clone();
            let cid = cid.clone();
            join_set.spawn(async move {
                let result = if fetch_as_ref {
                    fetch_ref(store.as_ref(), &name, &cid).await
                } else {
                    fetch_text(store.as_ref(), &name, &cid).await
                };
                (name, result)
            });
        }

        let mut files = Vec::new();
        let mut warnings = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(file))) => files.push(file),
                Ok((name, Err(err))) => {
                    warn!(id, component = %name, error = %err, "component fetch failed, omitting");
                    warnings.push(format!("could not fetch component '{name}': {err}"));
                }
                Err(join_err) => {
                    warnings.push(format!("component fetch task failed: {join_err}"));
                }
            }
        }

        // Join order is completion order; keep the prompt deterministic.
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ItemContext {
            tip: entity.tip,
            directory_path,
            files,
            components: entity.components,
            warnings,
        })
    }
}

async fn fetch_text<S: EntityStore>(
    store: &S,
    name: &str,
    cid: &str,
) -> Result<FileInput, StoreError> {
    let bytes = store.cat(cid).await?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    let mut file = FileInput::text(name, content);
    file.size = Some(bytes.len() as u64);
    Ok(file)
}

async fn fetch_ref<S: EntityStore>(
    store: &S,
    name: &str,
    cid: &str,
) -> Result<FileInput, StoreError> {
    let bytes = store.cat(cid).await?;
    let sidecar: RefSidecar = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Permanent(format!("invalid ref sidecar '{name}': {e}")))?;

    let display_name = sidecar
        .filename
        .clone()
        .unwrap_or_else(|| name.trim_end_matches(REF_SUFFIX).to_string());

    let content = match sidecar.ocr.as_deref() {
        Some(ocr) if !ocr.trim().is_empty() => {
            format!("[Image/Document: {display_name}]\n{ocr}")
        }
        _ => format!("[Binary file: {display_name}]"),
    };

    let mut file = FileInput::reference(name, content);
    file.original_name = sidecar.filename;
    file.mime = sidecar.mime;
    file.size = sidecar.size;
    Ok(file)
}
