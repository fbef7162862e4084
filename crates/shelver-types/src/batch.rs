//! Batch lifecycle types.
//!
//! A batch is one (batch_id, chunk_id) worth of directory ids moving through
//! the phase machine: PENDING -> PROCESSING -> PUBLISHING -> CALLBACK ->
//! DONE | ERROR. `BatchState` is the persisted record; it is mutated only by
//! the single owning runner task and deleted after the terminal callback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::organize::{FileInput, OrganizePlan};

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Body of `POST /process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub batch_id: String,
    pub chunk_id: String,
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

/// Outcome of submitting a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Accepted,
    AlreadyProcessing,
}

/// Response body of `POST /process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub status: SubmitStatus,
    pub chunk_id: String,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<BatchPhase>,
}

// ---------------------------------------------------------------------------
// Phases and item status
// ---------------------------------------------------------------------------

/// Batch-level phase. Transitions are driven solely by the owning runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchPhase {
    Pending,
    Processing,
    Publishing,
    Callback,
    Done,
    Error,
}

impl BatchPhase {
    /// Terminal phases are eligible for state deletion.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchPhase::Done | BatchPhase::Error)
    }
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchPhase::Pending => "PENDING",
            BatchPhase::Processing => "PROCESSING",
            BatchPhase::Publishing => "PUBLISHING",
            BatchPhase::Callback => "CALLBACK",
            BatchPhase::Done => "DONE",
            BatchPhase::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// Per-item status within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Fetching,
    Processing,
    Publishing,
    Done,
    Error,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Fetching => "fetching",
            ItemStatus::Processing => "processing",
            ItemStatus::Publishing => "publishing",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// A group entity created during publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedGroup {
    pub group_name: String,
    pub id: String,
    pub files: Vec<String>,
    pub description: String,
}

/// Per-item progress and accumulated results.
///
/// Heavy fields (`files`) are dropped as soon as the phase that needs them
/// completes, to bound what gets persisted on every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemState {
    pub id: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<OrganizePlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_created: Option<Vec<CreatedGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_parent_tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_parent_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ungrouped: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemState {
    /// A fresh item waiting for its first processing pass.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Pending,
            retry_count: 0,
            tip: None,
            directory_path: None,
            files: None,
            components: None,
            plan: None,
            groups_created: None,
            new_parent_tip: None,
            new_parent_version: None,
            ungrouped: None,
            error: None,
        }
    }
}

/// The persisted record for one (batch_id, chunk_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    pub batch_id: String,
    pub chunk_id: String,
    pub phase: BatchPhase,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub callback_retry_count: u32,
    pub items: Vec<ItemState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl BatchState {
    /// Create a fresh PENDING batch with one pending item per id.
    pub fn new(
        batch_id: impl Into<String>,
        chunk_id: impl Into<String>,
        ids: &[String],
        custom_prompt: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            chunk_id: chunk_id.into(),
            phase: BatchPhase::Pending,
            started_at: now,
            completed_at: None,
            callback_retry_count: 0,
            items: ids.iter().map(ItemState::pending).collect(),
            global_error: None,
            custom_prompt,
        }
    }

    /// Count items per status for the status endpoint.
    pub fn progress(&self) -> BatchProgress {
        let mut progress = BatchProgress {
            total: self.items.len(),
            ..BatchProgress::default()
        };
        for item in &self.items {
            match item.status {
                ItemStatus::Pending => progress.pending += 1,
                ItemStatus::Fetching => progress.fetching += 1,
                ItemStatus::Processing => progress.processing += 1,
                ItemStatus::Publishing => progress.publishing += 1,
                ItemStatus::Done => progress.done += 1,
                ItemStatus::Error => progress.failed += 1,
            }
        }
        progress
    }
}

/// Item-status counts reported by `GET /status/{batch_id}/{chunk_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: usize,
    pub pending: usize,
    pub fetching: usize,
    pub processing: usize,
    pub publishing: usize,
    pub done: usize,
    pub failed: usize,
}

/// Response body of `GET /status/{batch_id}/{chunk_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub phase: BatchPhase,
    pub progress: BatchProgress,
}

impl StatusReport {
    /// Derive the coarse status string from the phase.
    pub fn from_state(state: &BatchState) -> Self {
        let status = match state.phase {
            BatchPhase::Done => "done",
            BatchPhase::Error => "error",
            _ => "processing",
        };
        Self {
            status: status.to_string(),
            phase: state.phase,
            progress: state.progress(),
        }
    }
}

// ---------------------------------------------------------------------------
// Callback payload
// ---------------------------------------------------------------------------

/// Overall batch outcome reported to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Success,
    Partial,
    Error,
}

/// Per-item outcome inside the callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Success,
    Error,
}

/// One item's result in the aggregated callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResult {
    pub id: String,
    pub status: ItemOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_created: Option<Vec<CreatedGroup>>,
}

/// Downstream processing switches for a newly created group entity.
///
/// Group children are already organized, so reorganization and OCR are off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub ocr: bool,
    pub reorganize: bool,
    pub pinax: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            ocr: false,
            reorganize: false,
            pinax: true,
        }
    }
}

/// A newly created group entity announced to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPi {
    pub id: String,
    pub parent_id: String,
    #[serde(default)]
    pub children: Vec<String>,
    pub processing_config: ProcessingConfig,
}

/// Aggregate counts for the callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub processing_time_ms: u64,
}

/// The single aggregated callback sent once per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub batch_id: String,
    pub chunk_id: String,
    pub status: BatchOutcome,
    pub results: Vec<CallbackResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_pis: Vec<NewPi>,
    pub summary: CallbackSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
