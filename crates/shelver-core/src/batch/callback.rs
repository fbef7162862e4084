//! Callback payload construction and delivery trait.
//!
//! One aggregated callback per batch. Delivery is at-least-once under
//! transient failure; the orchestrator dedupes by (batch_id, chunk_id).

use chrono::{DateTime, Utc};
use shelver_types::batch::{
    BatchOutcome, BatchState, CallbackPayload, CallbackResult, CallbackSummary, ItemOutcome,
    ItemStatus, NewPi, ProcessingConfig,
};
use shelver_types::error::CallbackError;

/// Delivers the aggregated callback to the upstream orchestrator.
pub trait CallbackSender: Send + Sync {
    fn send(
        &self,
        payload: &CallbackPayload,
    ) -> impl std::future::Future<Output = Result<(), CallbackError>> + Send;
}

/// Summarize a finished batch into the single callback payload.
///
/// Every item appears exactly once in `results`. Each created group entity is
/// announced in `new_pis` with reorganization and OCR switched off -- the
/// children are already organized.
pub fn build_callback_payload(state: &BatchState, now: DateTime<Utc>) -> CallbackPayload {
    let mut results = Vec::with_capacity(state.items.len());
    let mut new_pis = Vec::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for item in &state.items {
        let ok = item.status == ItemStatus::Done;
        if ok {
            succeeded += 1;
        } else {
            failed += 1;
        }

        results.push(CallbackResult {
            id: item.id.clone(),
            status: if ok {
                ItemOutcome::Success
            } else {
                ItemOutcome::Error
            },
            new_tip: item.new_parent_tip.clone(),
            new_version: item.new_parent_version,
            error: item.error.clone(),
            groups_created: item.groups_created.clone(),
        });

        if let Some(groups) = &item.groups_created {
            for group in groups {
                new_pis.push(NewPi {
                    id: group.id.clone(),
                    parent_id: item.id.clone(),
                    children: Vec::new(),
                    processing_config: ProcessingConfig::default(),
                });
            }
        }
    }

    let status = if failed == 0 {
        BatchOutcome::Success
    } else if succeeded == 0 {
        BatchOutcome::Error
    } else {
        BatchOutcome::Partial
    };

    let processing_time_ms = now
        .signed_duration_since(state.started_at)
        .num_milliseconds()
        .max(0) as u64;

    CallbackPayload {
        batch_id: state.batch_id.clone(),
        chunk_id: state.chunk_id.clone(),
        status,
        results,
        new_pis,
        summary: CallbackSummary {
            total: state.items.len(),
            succeeded,
            failed,
            processing_time_ms,
        },
        error: state.global_error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shelver_types::batch::CreatedGroup;

    fn base_state() -> BatchState {
        BatchState::new(
            "b1",
            "c1",
            &["ent_1".to_string(), "ent_2".to_string()],
            None,
            Utc::now() - Duration::seconds(5),
        )
    }

    #[test]
    fn all_done_is_success() {
        let mut state = base_state();
        for item in &mut state.items {
            item.status = ItemStatus::Done;
        }
        let payload = build_callback_payload(&state, Utc::now());
        assert_eq!(payload.status, BatchOutcome::Success);
        assert_eq!(payload.results.len(), 2);
        assert_eq!(payload.summary.succeeded, 2);
        assert_eq!(payload.summary.failed, 0);
        assert!(payload.summary.processing_time_ms >= 5_000);
    }

    #[test]
    fn mixed_results_are_partial() {
        let mut state = base_state();
        state.items[0].status = ItemStatus::Done;
        state.items[1].status = ItemStatus::Error;
        state.items[1].error = Some("llm gave up".to_string());

        let payload = build_callback_payload(&state, Utc::now());
        assert_eq!(payload.status, BatchOutcome::Partial);
        assert_eq!(payload.results[1].status, ItemOutcome::Error);
        assert_eq!(payload.results[1].error.as_deref(), Some("llm gave up"));
    }

    #[test]
    fn all_failed_is_error() {
        let mut state = base_state();
        for item in &mut state.items {
            item.status = ItemStatus::Error;
        }
        let payload = build_callback_payload(&state, Utc::now());
        assert_eq!(payload.status, BatchOutcome::Error);
    }

    #[test]
    fn new_pis_announce_every_created_group() {
        let mut state = base_state();
        state.items[0].status = ItemStatus::Done;
        state.items[0].new_parent_tip = Some("v2".to_string());
        state.items[0].new_parent_version = Some(2);
        state.items[0].groups_created = Some(vec![
            CreatedGroup {
                group_name: "Letters".to_string(),
                id: "ent_g1".to_string(),
                files: vec!["a.txt".to_string()],
                description: "letters".to_string(),
            },
            CreatedGroup {
                group_name: "Photos".to_string(),
                id: "ent_g2".to_string(),
                files: vec!["b.jpg.ref.json".to_string()],
                description: "photos".to_string(),
            },
        ]);
        state.items[1].status = ItemStatus::Done;

        let payload = build_callback_payload(&state, Utc::now());
        assert_eq!(payload.new_pis.len(), 2);
        for pi in &payload.new_pis {
            assert_eq!(pi.parent_id, "ent_1");
            assert!(!pi.processing_config.reorganize);
            assert!(!pi.processing_config.ocr);
            assert!(pi.processing_config.pinax);
        }
        assert_eq!(payload.results[0].new_tip.as_deref(), Some("v2"));
        assert_eq!(payload.results[0].new_version, Some(2));
    }
}
