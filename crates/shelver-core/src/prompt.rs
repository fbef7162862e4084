//! Prompt construction under a token budget.
//!
//! The user prompt lists every file with a metadata block and as much content
//! as the budget allows. Metadata, separators, and the fixed instruction text
//! are never truncated; whatever remains of `max_tokens * budget_percentage`
//! is split across file contents by the progressive-tax allocator.

use shelver_types::config::ShelverConfig;
use shelver_types::organize::{FileInput, FileKind, OrganizeRequest, TruncationStats};

use crate::budget::{allocate, estimate_tokens, truncate_to_budget, TokenWeight};

/// Inserted in place of content for ref files without extracted text.
pub const NO_OCR_PLACEHOLDER: &str =
    "(No OCR text available — use filename/metadata for grouping)";

/// Separator between file sections in the user prompt.
pub const FILE_DIVIDER: &str = "\n=====\n";

/// System and user prompts plus the truncation bookkeeping for this request.
///
/// Truncation stats are per-request state returned from here, never stored in
/// a process-wide slot: concurrent requests each carry their own.
#[derive(Debug, Clone)]
pub struct PromptBundle {
    pub system: String,
    pub user: String,
    pub truncation: TruncationStats,
}

/// The system prompt is fixed; all per-request material goes in the user prompt.
fn system_prompt() -> String {
    "You are an expert archivist. You organize directories of heterogeneous files \
     into coherent, clearly named groups. You always answer with a single JSON \
     object conforming to the schema you are given, and you never invent file \
     names that were not in the input."
        .to_string()
}

/// Fixed closing instructions for the user prompt.
fn instruction_block(custom_prompt: Option<&str>, strategy_guidance: Option<&str>) -> String {
    let mut block = String::from(
        "\nOrganize the files above into named groups.\n\
         Rules:\n\
         1. Every input file name must appear in your output, either in a group or in ungrouped_files.\n\
         2. Only file names from the input list may appear. Do not invent names.\n\
         3. Directory paths (strings ending in '/') are forbidden.\n\
         4. A file may appear in more than one group when it genuinely belongs to both.\n\
         5. Group names must be filesystem-safe: none of / \\ : * ? \" < > |\n\
         Give each group a short description and summarize the reorganization overall.\n",
    );
    if let Some(custom) = custom_prompt {
        block.push_str("\nAdditional instructions from the requester:\n");
        block.push_str(custom);
        block.push('\n');
    }
    if let Some(strategy) = strategy_guidance {
        block.push_str("\nGrouping strategy guidance:\n");
        block.push_str(strategy);
        block.push('\n');
    }
    block
}

fn header_block(request: &OrganizeRequest) -> String {
    format!(
        "You are given {} files from the directory \"{}\".\n",
        request.files.len(),
        request.directory_path
    )
}

/// Render one file's metadata lines (never truncated). For a ref file with no
/// extracted text this includes the placeholder, since that is all the model
/// will ever see of it.
fn metadata_block(file: &FileInput) -> String {
    let mut block = format!("File: {}\nKind: {}\n", file.name, kind_label(file.kind));
    if let Some(ref original) = file.original_name {
        block.push_str(&format!("Original: {original}\n"));
    }
    if let Some(ref mime) = file.mime {
        block.push_str(&format!("Type: {mime}\n"));
    }
    if let Some(size) = file.size {
        block.push_str(&format!("Size: {}\n", format_size(size)));
    }
    if file.kind == FileKind::Ref && file.content.is_empty() {
        block.push('\n');
        block.push_str(NO_OCR_PLACEHOLDER);
        block.push('\n');
    }
    block
}

fn kind_label(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Text => "text",
        FileKind::Ref => "reference",
    }
}

/// Human-readable byte size: `812 B`, `1.2 KB`, `3.4 MB`.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Build the (system, user) prompt pair for a request.
pub fn build_prompts(request: &OrganizeRequest, config: &ShelverConfig) -> PromptBundle {
    let system = system_prompt();
    let header = header_block(request);
    let instructions = instruction_block(
        request.custom_prompt.as_deref(),
        request.strategy_guidance.as_deref(),
    );

    let metadata: Vec<String> = request.files.iter().map(metadata_block).collect();

    // Budget arithmetic: everything that is never truncated comes off the top.
    let prompt_budget = (config.max_tokens as f64 * config.token_budget_percentage) as u64;
    let static_tokens =
        estimate_tokens(&system) + estimate_tokens(&header) + estimate_tokens(&instructions);
    let metadata_tokens: u64 = metadata.iter().map(|m| estimate_tokens(m)).sum();
    let separator_tokens =
        estimate_tokens(FILE_DIVIDER) * (request.files.len().saturating_sub(1) as u64);
    let content_budget = prompt_budget
        .saturating_sub(static_tokens)
        .saturating_sub(metadata_tokens)
        .saturating_sub(separator_tokens);

    // Only files that actually carry content compete for the budget.
    let weights: Vec<TokenWeight> = request
        .files
        .iter()
        .filter(|f| !f.content.is_empty())
        .map(|f| TokenWeight::new(f.name.clone(), estimate_tokens(&f.content)))
        .collect();
    let allocation = allocate(&weights, content_budget);

    let mut user = header;
    for (idx, file) in request.files.iter().enumerate() {
        if idx > 0 {
            user.push_str(FILE_DIVIDER);
        }
        user.push_str(&metadata[idx]);

        if file.content.is_empty() {
            // Empty ref files already carry the placeholder in their metadata
            // block; empty text files contribute nothing.
            continue;
        }

        let budget = allocation
            .items
            .iter()
            .find(|a| a.name == file.name)
            .map(|a| a.allocated as u64)
            .unwrap_or(0);
        user.push('\n');
        user.push_str(&truncate_to_budget(&file.content, budget));
        user.push('\n');
    }
    user.push_str(&instructions);

    PromptBundle {
        system,
        user,
        truncation: allocation.stats,
    }
}

/// JSON schema the provider enforces on the response.
///
/// Additional properties are forbidden everywhere: the transport guarantees
/// structure so the sanitizer only has to fight over content.
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["groups", "ungrouped_files", "reorganization_description"],
        "properties": {
            "groups": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["group_name", "description", "files"],
                    "properties": {
                        "group_name": { "type": "string" },
                        "description": { "type": "string" },
                        "files": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    }
                }
            },
            "ungrouped_files": {
                "type": "array",
                "items": { "type": "string" }
            },
            "reorganization_description": { "type": "string" }
        }
    })
}

/// Name reported alongside the schema in the response_format block.
pub const RESPONSE_SCHEMA_NAME: &str = "file_grouping";

#[cfg(test)]
mod tests {
    use super::*;
    use shelver_types::organize::FileInput;

    fn request(files: Vec<FileInput>) -> OrganizeRequest {
        OrganizeRequest {
            directory_path: "/archive/1895".to_string(),
            files,
            custom_prompt: None,
            strategy_guidance: None,
        }
    }

    fn small_config() -> ShelverConfig {
        ShelverConfig {
            max_tokens: 128_000,
            token_budget_percentage: 0.7,
            ..ShelverConfig::default()
        }
    }

    #[test]
    fn user_prompt_lists_every_file() {
        let req = request(vec![
            FileInput::text("a.txt", "alpha content"),
            FileInput::reference("b.jpg.ref.json", "[Image/Document: b.jpg]\nocr text"),
        ]);
        let bundle = build_prompts(&req, &small_config());

        assert!(bundle.user.contains("File: a.txt"));
        assert!(bundle.user.contains("File: b.jpg.ref.json"));
        assert!(bundle.user.contains("alpha content"));
        assert!(bundle.user.contains("ocr text"));
        assert!(bundle.user.contains(FILE_DIVIDER));
        assert!(!bundle.truncation.applied);
    }

    #[test]
    fn empty_ref_gets_placeholder_and_empty_text_gets_nothing() {
        let req = request(vec![
            FileInput::reference("scan.jpg.ref.json", ""),
            FileInput::text("empty.txt", ""),
        ]);
        let bundle = build_prompts(&req, &small_config());

        assert!(bundle.user.contains(NO_OCR_PLACEHOLDER));
        // The empty text file appears in the listing but adds no content.
        assert!(bundle.user.contains("File: empty.txt"));
    }

    #[test]
    fn metadata_includes_optional_fields() {
        let mut file = FileInput::reference("scan.jpg.ref.json", "ocr");
        file.original_name = Some("scan.jpg".to_string());
        file.mime = Some("image/jpeg".to_string());
        file.size = Some(2_621_440);

        let req = request(vec![file]);
        let bundle = build_prompts(&req, &small_config());
        assert!(bundle.user.contains("Original: scan.jpg"));
        assert!(bundle.user.contains("Type: image/jpeg"));
        assert!(bundle.user.contains("Size: 2.5 MB"));
    }

    #[test]
    fn instructions_state_the_output_rules() {
        let req = request(vec![FileInput::text("a.txt", "x")]);
        let bundle = build_prompts(&req, &small_config());
        assert!(bundle.user.contains("must appear in your output"));
        assert!(bundle.user.contains("Do not invent names"));
        assert!(bundle.user.contains("ending in '/'"));
        assert!(bundle.user.contains("more than one group"));
        assert!(bundle.user.contains("filesystem-safe"));
    }

    #[test]
    fn custom_prompt_and_strategy_are_appended() {
        let mut req = request(vec![FileInput::text("a.txt", "x")]);
        req.custom_prompt = Some("Prefer chronological grouping.".to_string());
        req.strategy_guidance = Some("Group by correspondent.".to_string());

        let bundle = build_prompts(&req, &small_config());
        assert!(bundle.user.contains("Prefer chronological grouping."));
        assert!(bundle.user.contains("Group by correspondent."));
    }

    #[test]
    fn oversized_content_is_truncated_with_stats() {
        let big = "lorem ipsum dolor sit amet ".repeat(40_000); // ~270k tokens
        let req = request(vec![
            FileInput::text("big.txt", big),
            FileInput::text("small.txt", "tiny"),
        ]);
        let mut config = small_config();
        config.max_tokens = 10_000;

        let bundle = build_prompts(&req, &config);
        assert!(bundle.truncation.applied);
        assert!(bundle.truncation.protection_mode_used);
        assert_eq!(bundle.truncation.protected_count, 1);
        assert_eq!(bundle.truncation.truncated_count, 1);
        assert!(bundle.user.contains("tiny"));
        assert!(bundle.user.contains("... [truncated]"));

        // The whole prompt respects the overall budget, with a little slack
        // for the estimator's rounding.
        let total = estimate_tokens(&bundle.system) + estimate_tokens(&bundle.user);
        assert!(total <= (config.max_tokens as f64 * config.token_budget_percentage) as u64 + 16);
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(812), "812 B");
        assert_eq!(format_size(1_228), "1.2 KB");
        assert_eq!(format_size(3_565_158), "3.4 MB");
    }

    #[test]
    fn response_schema_forbids_additional_properties() {
        let schema = response_schema();
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
        assert_eq!(
            schema["properties"]["groups"]["items"]["additionalProperties"],
            serde_json::json!(false)
        );
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }
}
