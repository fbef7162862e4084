//! End-to-end single-request orchestration: prompts -> LLM -> sanitized plan.

use std::sync::Arc;

use shelver_types::config::ShelverConfig;
use shelver_types::error::OrganizeError;
use shelver_types::llm::CompletionRequest;
use shelver_types::organize::{
    LlmGrouping, OrganizeOutcome, OrganizeRequest, PlanUsage, MAX_REQUEST_BYTES,
};
use tracing::{debug, info};

use crate::llm::{complete_with_retry, CompletionClient};
use crate::prompt::{build_prompts, response_schema, RESPONSE_SCHEMA_NAME};
use crate::reconcile::sanitize;

/// Validate the request invariants: non-empty files, unique names, size cap.
pub fn validate_request(request: &OrganizeRequest) -> Result<(), OrganizeError> {
    if request.files.is_empty() {
        return Err(OrganizeError::Validation(
            "request contains no files".to_string(),
        ));
    }
    for (idx, file) in request.files.iter().enumerate() {
        if file.name.is_empty() {
            return Err(OrganizeError::Validation(format!(
                "file at index {idx} has an empty name"
            )));
        }
    }
    let mut names: Vec<&str> = request.files.iter().map(|f| f.name.as_str()).collect();
    names.sort_unstable();
    if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
        return Err(OrganizeError::Validation(format!(
            "duplicate file name '{}'",
            dup[0]
        )));
    }

    let serialized = serde_json::to_vec(request)
        .map_err(|e| OrganizeError::Validation(format!("unserializable request: {e}")))?;
    if serialized.len() > MAX_REQUEST_BYTES {
        return Err(OrganizeError::TooLarge {
            actual: serialized.len(),
            limit: MAX_REQUEST_BYTES,
        });
    }
    Ok(())
}

/// Orchestrates one organize call: validate, prompt, complete, sanitize.
pub struct OrganizeService<C> {
    client: Arc<C>,
    config: ShelverConfig,
}

impl<C> Clone for OrganizeService<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

impl<C: CompletionClient> OrganizeService<C> {
    pub fn new(client: Arc<C>, config: ShelverConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ShelverConfig {
        &self.config
    }

    /// Produce a sanitized grouping plan for one directory's files.
    pub async fn organize(
        &self,
        request: &OrganizeRequest,
    ) -> Result<OrganizeOutcome, OrganizeError> {
        validate_request(request)?;

        let bundle = build_prompts(request, &self.config);
        if bundle.truncation.applied {
            debug!(
                deficit = bundle.truncation.deficit,
                protection = bundle.truncation.protection_mode_used,
                truncated = bundle.truncation.truncated_count,
                "prompt content truncated to fit budget"
            );
        }

        let completion_request = CompletionRequest {
            system: bundle.system,
            user: bundle.user,
            schema: response_schema(),
            schema_name: RESPONSE_SCHEMA_NAME.to_string(),
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_output_tokens,
        };
        let completion = complete_with_retry(
            self.client.as_ref(),
            &completion_request,
            self.config.llm_retry_attempts,
        )
        .await?;

        let grouping: LlmGrouping = serde_json::from_str(&completion.content)
            .map_err(|e| OrganizeError::BadResponse(format!("unparseable model output: {e}")))?;

        let input_names: Vec<String> = request.files.iter().map(|f| f.name.clone()).collect();
        let outcome = sanitize(&input_names, grouping)?;

        info!(
            directory = %request.directory_path,
            groups = outcome.plan.groups.len(),
            ungrouped = outcome.plan.ungrouped.len(),
            warnings = outcome.warnings.len(),
            tokens = completion.total_tokens,
            "organize plan ready"
        );

        let mut plan = outcome.plan;
        plan.warnings = outcome.warnings;
        plan.truncation = bundle.truncation.applied.then_some(bundle.truncation);

        Ok(OrganizeOutcome {
            plan,
            tokens: PlanUsage {
                prompt_tokens: completion.prompt_tokens,
                completion_tokens: completion.completion_tokens,
                total_tokens: completion.total_tokens,
            },
            cost: completion.cost,
            model: completion.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelver_types::llm::{Completion, LlmError};
    use shelver_types::organize::FileInput;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted client: returns canned content, optionally failing first.
    struct ScriptedClient {
        content: String,
        transient_failures: AtomicU32,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn returning(content: &str) -> Self {
            Self {
                content: content.to_string(),
                transient_failures: AtomicU32::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn failing_first(content: &str, failures: u32) -> Self {
            let client = Self::returning(content);
            client.transient_failures.store(failures, Ordering::SeqCst);
            client
        }
    }

    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            let remaining = self.transient_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.transient_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(LlmError::Transient("overloaded".to_string()));
            }
            Ok(Completion {
                content: self.content.clone(),
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
                cost: 0.0123,
                model: "test-model".to_string(),
            })
        }
    }

    fn request() -> OrganizeRequest {
        OrganizeRequest {
            directory_path: "/box".to_string(),
            files: vec![
                FileInput::text("a.txt", "alpha"),
                FileInput::text("b.txt", "beta"),
                FileInput::text("c.txt", "gamma"),
            ],
            custom_prompt: None,
            strategy_guidance: None,
        }
    }

    const GOOD_RESPONSE: &str = r#"{
        "groups": [
            {"group_name": "Greek", "description": "letters", "files": ["a.txt", "b.txt"]}
        ],
        "ungrouped_files": ["c.txt"],
        "reorganization_description": "grouped the greek letters"
    }"#;

    #[tokio::test]
    async fn happy_path_produces_plan_with_usage() {
        let client = Arc::new(ScriptedClient::returning(GOOD_RESPONSE));
        let service = OrganizeService::new(Arc::clone(&client), ShelverConfig::default());

        let outcome = service.organize(&request()).await.unwrap();
        assert_eq!(outcome.plan.groups.len(), 1);
        assert_eq!(outcome.plan.ungrouped, vec!["c.txt"]);
        assert_eq!(outcome.tokens.total_tokens, 150);
        assert!((outcome.cost - 0.0123).abs() < 1e-9);
        assert_eq!(outcome.model, "test-model");

        // The request carried the schema and temperature through.
        let sent = client.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.schema_name, "file_grouping");
        assert_eq!(sent.temperature, Some(0.3));
        assert!(sent.user.contains("File: a.txt"));
    }

    #[tokio::test]
    async fn transient_llm_failures_are_retried() {
        let client = Arc::new(ScriptedClient::failing_first(GOOD_RESPONSE, 2));
        let service = OrganizeService::new(client, ShelverConfig::default());

        let outcome = service.organize(&request()).await.unwrap();
        assert_eq!(outcome.plan.groups.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_content_is_bad_response() {
        let client = Arc::new(ScriptedClient::returning("not json at all"));
        let service = OrganizeService::new(client, ShelverConfig::default());

        let result = service.organize(&request()).await;
        assert!(matches!(result, Err(OrganizeError::BadResponse(_))));
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let client = Arc::new(ScriptedClient::returning(GOOD_RESPONSE));
        let service = OrganizeService::new(client, ShelverConfig::default());

        let mut req = request();
        req.files.clear();
        let result = service.organize(&req).await;
        assert!(matches!(result, Err(OrganizeError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let client = Arc::new(ScriptedClient::returning(GOOD_RESPONSE));
        let service = OrganizeService::new(client, ShelverConfig::default());

        let mut req = request();
        req.files.push(FileInput::text("a.txt", "again"));
        let result = service.organize(&req).await;
        assert!(matches!(result, Err(OrganizeError::Validation(_))));
    }

    #[test]
    fn oversized_request_is_rejected() {
        let mut req = request();
        req.files[0].content = "x".repeat(MAX_REQUEST_BYTES + 1);
        let result = validate_request(&req);
        assert!(matches!(result, Err(OrganizeError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn warnings_and_truncation_land_on_the_plan() {
        // Model returns a near-miss name; sanitizer warning must surface.
        let response = r#"{
            "groups": [
                {"group_name": "Greek", "description": "letters", "files": ["A.TXT", "b.txt", "c.txt"]}
            ],
            "ungrouped_files": [],
            "reorganization_description": "ok"
        }"#;
        let client = Arc::new(ScriptedClient::returning(response));
        let service = OrganizeService::new(client, ShelverConfig::default());

        let outcome = service.organize(&request()).await.unwrap();
        assert!(!outcome.plan.warnings.is_empty());
        assert!(outcome.plan.warnings.iter().any(|w| w.contains("A.TXT")));
        // Nothing was truncated for this tiny request.
        assert!(outcome.plan.truncation.is_none());
    }
}
