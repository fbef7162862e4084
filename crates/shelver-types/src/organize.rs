//! Organization request/plan types.
//!
//! These types model the synchronous organize path: the caller hands over a
//! directory's files, the service returns a grouping plan. The same shapes are
//! reused by the batch processor for each item.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard cap on the serialized size of an [`OrganizeRequest`] (10 MiB).
pub const MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;

/// Characters that must not appear in a group name.
pub const UNSAFE_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// What kind of input a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// A textual document whose content is sent verbatim (subject to budget).
    Text,
    /// A sidecar descriptor for a non-text artifact; content may carry OCR text.
    Ref,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Text => write!(f, "text"),
            FileKind::Ref => write!(f, "ref"),
        }
    }
}

/// A single input file within an organize request.
///
/// `name` is the authoritative key: every name the model returns is resolved
/// back against the set of input names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInput {
    pub name: String,
    pub kind: FileKind,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileInput {
    /// Construct a text file input with just a name and content.
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Text,
            content: content.into(),
            original_name: None,
            mime: None,
            size: None,
        }
    }

    /// Construct a ref file input with just a name and content.
    pub fn reference(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Ref,
            content: content.into(),
            original_name: None,
            mime: None,
            size: None,
        }
    }
}

/// A request to organize one directory's files into named groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeRequest {
    pub directory_path: String,
    pub files: Vec<FileInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_guidance: Option<String>,
}

/// A named subset of the input files, as decided by the model.
///
/// Overlap across groups is permitted and meaningful: a file may belong to
/// more than one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub group_name: String,
    pub description: String,
    pub files: Vec<String>,
}

/// Whether a group name is safe to use as a directory name.
pub fn is_filesystem_safe(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| UNSAFE_NAME_CHARS.contains(&c))
}

/// The sanitized grouping plan returned to the caller.
///
/// Invariant after sanitization: every input name appears in at least one
/// group or in `ungrouped`, and no name appears that was not in the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizePlan {
    pub groups: Vec<Group>,
    pub ungrouped: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// How the prompt builder squeezed the input files into the token budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TruncationStats {
    /// Whether any content was cut at all.
    pub applied: bool,
    pub total_original_tokens: u64,
    pub target_tokens: u64,
    /// How many tokens over budget the original content was (0 when it fit).
    pub deficit: u64,
    pub protection_mode_used: bool,
    /// Items spared entirely because they were below the average deficit share.
    pub protected_count: usize,
    /// Items that lost tokens.
    pub truncated_count: usize,
}

/// The shape the model is instructed (via JSON schema) to return.
///
/// Structure is trusted at the transport level; content is not. Every string
/// in here is revalidated against the input set before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGrouping {
    pub groups: Vec<Group>,
    pub ungrouped_files: Vec<String>,
    pub reorganization_description: String,
}

/// Token usage for one completed organize call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A finished organize call: the sanitized plan plus what it cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeOutcome {
    #[serde(flatten)]
    pub plan: OrganizePlan,
    pub tokens: PlanUsage,
    pub cost: f64,
    pub model: String,
}
