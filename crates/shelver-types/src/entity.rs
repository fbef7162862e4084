//! Entity-store wire shapes.
//!
//! The entity store is an external content-addressed service. An entity is a
//! manifest mapping component names to content addresses, versioned along a
//! linear chain whose head (`tip`) doubles as the compare-and-swap token.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity type assigned to published group children.
pub const GROUP_ENTITY_TYPE: &str = "PI";

/// Component name under which the reorganization description is stored.
pub const REORG_DESCRIPTION_COMPONENT: &str = "reorganization-description.txt";

/// An entity as returned by `GET /entities/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    /// Head of the linear version chain; CAS token for updates.
    pub tip: String,
    #[serde(default)]
    pub version: u64,
    /// Component name -> content address.
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    /// Human label the store keeps for the entity (the directory path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body for `POST /entities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntityRequest {
    pub components: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Body for `POST /entities/{id}/versions`.
///
/// Fails with a CAS mismatch when `expect_tip` is no longer the current tip;
/// callers must refetch the tip before retrying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendVersionRequest {
    pub expect_tip: String,
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    #[serde(default)]
    pub components_remove: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
