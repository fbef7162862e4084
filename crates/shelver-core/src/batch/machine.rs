//! The per-batch state machine.
//!
//! `submit` persists a fresh `BatchState` and spawns a runner task; the
//! runner re-enters on a timer (the "alarm") and drives the batch through
//! PROCESSING (items fan out in parallel), PUBLISHING (strictly sequential,
//! the entity store contends on CAS), CALLBACK (one aggregated delivery,
//! retried then abandoned), and finally deletes its own state. Each runner is
//! the single writer for its batch; the submit path and status endpoint only
//! read.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use shelver_types::batch::{
    BatchPhase, BatchState, ItemState, ItemStatus, ProcessRequest, StatusReport, SubmitReceipt,
    SubmitStatus,
};
use shelver_types::config::ShelverConfig;
use shelver_types::error::BatchError;
use shelver_types::organize::{OrganizeOutcome, OrganizeRequest};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::batch::callback::{build_callback_payload, CallbackSender};
use crate::batch::store::BatchStore;
use crate::context::{ContextFetcher, ItemContext};
use crate::llm::retry::backoff_delay;
use crate::llm::CompletionClient;
use crate::organize::OrganizeService;
use crate::publish::{PublishItem, Publisher};
use crate::store::EntityStore;

/// Upper bound on concurrently processed items within one batch.
const MAX_PARALLEL_ITEMS: usize = 8;

/// Outcome of one item's fetch stage.
enum FetchOutcome {
    /// Too few files; nothing worth organizing.
    NothingToOrganize(ItemContext),
    Fetched(ItemContext),
    Failed(String),
}

/// Outcome of one item's organize stage.
enum PlanOutcome {
    Planned(Box<OrganizeOutcome>),
    Failed(String),
}

/// Drives batches through their lifecycle.
///
/// Generic over the four seams; `AppState` pins them to the reqwest/SQLite
/// implementations, tests pin them to in-memory fakes.
pub struct BatchProcessor<C, S, B, K> {
    organize: OrganizeService<C>,
    fetcher: ContextFetcher<S>,
    publisher: Publisher<S>,
    batch_store: Arc<B>,
    callback: Arc<K>,
    config: ShelverConfig,
    /// In-process guard against two runners for the same key.
    running: Arc<DashMap<(String, String), ()>>,
}

impl<C, S, B, K> Clone for BatchProcessor<C, S, B, K> {
    fn clone(&self) -> Self {
        Self {
            organize: self.organize.clone(),
            fetcher: self.fetcher.clone(),
            publisher: self.publisher.clone(),
            batch_store: Arc::clone(&self.batch_store),
            callback: Arc::clone(&self.callback),
            config: self.config.clone(),
            running: Arc::clone(&self.running),
        }
    }
}

impl<C, S, B, K> BatchProcessor<C, S, B, K>
where
    C: CompletionClient + 'static,
    S: EntityStore + 'static,
    B: BatchStore + 'static,
    K: CallbackSender + 'static,
{
    pub fn new(
        organize: OrganizeService<C>,
        fetcher: ContextFetcher<S>,
        publisher: Publisher<S>,
        batch_store: Arc<B>,
        callback: Arc<K>,
        config: ShelverConfig,
    ) -> Self {
        Self {
            organize,
            fetcher,
            publisher,
            batch_store,
            callback,
            config,
            running: Arc::new(DashMap::new()),
        }
    }

    /// Accept a batch. Duplicate live submissions are rejected without
    /// restarting any work.
    pub async fn submit(&self, request: ProcessRequest) -> Result<SubmitReceipt, BatchError> {
        let key = (request.batch_id.clone(), request.chunk_id.clone());

        if let Some(existing) = self
            .batch_store
            .get(&request.batch_id, &request.chunk_id)
            .await?
        {
            if !existing.phase.is_terminal() {
                return Ok(SubmitReceipt {
                    status: SubmitStatus::AlreadyProcessing,
                    chunk_id: request.chunk_id,
                    total: existing.items.len(),
                    phase: Some(existing.phase),
                });
            }
        }
        if self.running.insert(key.clone(), ()).is_some() {
            // A runner is live but has not persisted yet (or is tearing down).
            return Ok(SubmitReceipt {
                status: SubmitStatus::AlreadyProcessing,
                chunk_id: request.chunk_id,
                total: request.ids.len(),
                phase: None,
            });
        }

        let state = BatchState::new(
            &request.batch_id,
            &request.chunk_id,
            &request.ids,
            request.custom_prompt,
            Utc::now(),
        );
        if let Err(err) = self.batch_store.put(&state).await {
            self.running.remove(&key);
            return Err(err);
        }

        info!(
            batch_id = %request.batch_id,
            chunk_id = %request.chunk_id,
            items = request.ids.len(),
            "batch accepted"
        );
        self.spawn_runner(request.batch_id, request.chunk_id.clone());

        Ok(SubmitReceipt {
            status: SubmitStatus::Accepted,
            chunk_id: request.chunk_id,
            total: request.ids.len(),
            phase: Some(BatchPhase::Pending),
        })
    }

    /// Read-only status lookup; never mutates state.
    pub async fn status(
        &self,
        batch_id: &str,
        chunk_id: &str,
    ) -> Result<Option<StatusReport>, BatchError> {
        Ok(self
            .batch_store
            .get(batch_id, chunk_id)
            .await?
            .as_ref()
            .map(StatusReport::from_state))
    }

    /// Re-spawn runners for every non-terminal batch left in the store.
    /// Called once at startup for crash recovery.
    pub async fn resume_all(&self) -> Result<usize, BatchError> {
        let active = self.batch_store.list_active().await?;
        let count = active.len();
        for state in active {
            let key = (state.batch_id.clone(), state.chunk_id.clone());
            if self.running.insert(key, ()).is_none() {
                warn!(
                    batch_id = %state.batch_id,
                    chunk_id = %state.chunk_id,
                    phase = %state.phase,
                    "resuming interrupted batch"
                );
                self.spawn_runner(state.batch_id, state.chunk_id);
            }
        }
        Ok(count)
    }

    fn spawn_runner(&self, batch_id: String, chunk_id: String) {
        let processor = self.clone();
        tokio::spawn(async move {
            processor.run(batch_id, chunk_id).await;
        });
    }

    /// The single-writer alarm loop for one batch.
    async fn run(self, batch_id: String, chunk_id: String) {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.alarm_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let mut state = match self.batch_store.get(&batch_id, &chunk_id).await {
                Ok(Some(state)) => state,
                Ok(None) => {
                    warn!(%batch_id, %chunk_id, "batch state vanished, stopping runner");
                    break;
                }
                Err(err) => {
                    error!(%batch_id, %chunk_id, error = %err, "failed to load batch state");
                    continue;
                }
            };

            match state.phase {
                BatchPhase::Pending => {
                    state.phase = BatchPhase::Processing;
                }
                BatchPhase::Processing => {
                    self.drive_processing(&mut state).await;
                    let busy = state.items.iter().any(|i| {
                        matches!(
                            i.status,
                            ItemStatus::Pending | ItemStatus::Fetching | ItemStatus::Processing
                        )
                    });
                    if !busy {
                        state.phase = BatchPhase::Publishing;
                    }
                }
                BatchPhase::Publishing => {
                    self.drive_publishing(&mut state).await;
                    if !state.items.iter().any(|i| i.status == ItemStatus::Publishing) {
                        state.phase = BatchPhase::Callback;
                    }
                }
                BatchPhase::Callback => {
                    self.drive_callback(&mut state).await;
                }
                BatchPhase::Done | BatchPhase::Error => {
                    if let Err(err) = self.batch_store.delete(&batch_id, &chunk_id).await {
                        error!(%batch_id, %chunk_id, error = %err, "failed to delete batch state");
                        continue;
                    }
                    info!(%batch_id, %chunk_id, "batch state deleted");
                    break;
                }
            }

            if let Err(err) = self.batch_store.put(&state).await {
                error!(%batch_id, %chunk_id, error = %err, "failed to persist batch state");
            }
        }

        self.running.remove(&(batch_id, chunk_id));
    }

    /// One PROCESSING pass. Stage one fetches pending items in parallel;
    /// stage two organizes fetched items in parallel. Failed items revert to
    /// pending and re-enter on a later tick until their retry budget runs out.
    async fn drive_processing(&self, state: &mut BatchState) {
        self.fetch_stage(state).await;
        self.organize_stage(state).await;
    }

    async fn fetch_stage(&self, state: &mut BatchState) {
        let targets: Vec<usize> = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| matches!(i.status, ItemStatus::Pending | ItemStatus::Fetching))
            .map(|(idx, _)| idx)
            .collect();
        if targets.is_empty() {
            return;
        }

        for &idx in &targets {
            state.items[idx].status = ItemStatus::Fetching;
        }

        let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_ITEMS));
        let mut join_set: JoinSet<(usize, FetchOutcome)> = JoinSet::new();
        for &idx in &targets {
            let fetcher = self.fetcher.clone();
            let id = state.items[idx].id.clone();
            let min_files = self.config.min_files_to_organize;
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = match fetcher.fetch_context(&id).await {
                    Ok(ctx) if ctx.files.len() < min_files => {
                        FetchOutcome::NothingToOrganize(ctx)
                    }
                    Ok(ctx) => FetchOutcome::Fetched(ctx),
                    Err(err) => FetchOutcome::Failed(err.to_string()),
                };
                (idx, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let Ok((idx, outcome)) = joined else {
                continue;
            };
            let item = &mut state.items[idx];
            match outcome {
                FetchOutcome::NothingToOrganize(ctx) => {
                    info!(id = %item.id, files = ctx.files.len(), "too few files, skipping");
                    item.tip = Some(ctx.tip);
                    item.directory_path = Some(ctx.directory_path);
                    item.files = None;
                    item.status = ItemStatus::Done;
                }
                FetchOutcome::Fetched(ctx) => {
                    item.tip = Some(ctx.tip);
                    item.directory_path = Some(ctx.directory_path);
                    item.components = Some(ctx.components);
                    item.files = Some(ctx.files);
                    item.status = ItemStatus::Processing;
                }
                FetchOutcome::Failed(message) => {
                    self.fail_or_retry(item, message);
                }
            }
        }
    }

    async fn organize_stage(&self, state: &mut BatchState) {
        let targets: Vec<usize> = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.status == ItemStatus::Processing && i.files.is_some())
            .map(|(idx, _)| idx)
            .collect();
        if targets.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_ITEMS));
        let mut join_set: JoinSet<(usize, PlanOutcome)> = JoinSet::new();
        for &idx in &targets {
            let organize = self.organize.clone();
            let item = &state.items[idx];
            let request = OrganizeRequest {
                directory_path: item
                    .directory_path
                    .clone()
                    .unwrap_or_else(|| item.id.clone()),
                files: item.files.clone().unwrap_or_default(),
                custom_prompt: state.custom_prompt.clone(),
                strategy_guidance: None,
            };
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = match organize.organize(&request).await {
                    Ok(outcome) => PlanOutcome::Planned(Box::new(outcome)),
                    Err(err) => PlanOutcome::Failed(err.to_string()),
                };
                (idx, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let Ok((idx, outcome)) = joined else {
                continue;
            };
            let item = &mut state.items[idx];
            match outcome {
                PlanOutcome::Planned(outcome) => {
                    item.ungrouped = Some(outcome.plan.ungrouped.clone());
                    item.plan = Some(outcome.plan);
                    // Content served its purpose; keep the persisted row small.
                    item.files = None;
                    item.status = ItemStatus::Publishing;
                }
                PlanOutcome::Failed(message) => {
                    item.files = None;
                    self.fail_or_retry(item, message);
                }
            }
        }
    }

    /// One PUBLISHING pass: strictly one item at a time.
    async fn drive_publishing(&self, state: &mut BatchState) {
        let targets: Vec<usize> = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.status == ItemStatus::Publishing && i.new_parent_tip.is_none())
            .map(|(idx, _)| idx)
            .collect();

        for idx in targets {
            let item = &state.items[idx];
            let Some(plan) = item.plan.clone() else {
                state.items[idx].status = ItemStatus::Error;
                state.items[idx].error = Some("no plan recorded before publishing".to_string());
                continue;
            };
            let publish_item = PublishItem {
                id: item.id.clone(),
                directory_path: item
                    .directory_path
                    .clone()
                    .unwrap_or_else(|| item.id.clone()),
                components: item.components.clone().unwrap_or_default(),
                plan,
            };

            match self.publisher.publish(&publish_item).await {
                Ok(Some(outcome)) => {
                    let item = &mut state.items[idx];
                    item.new_parent_tip = Some(outcome.new_tip);
                    item.new_parent_version = Some(outcome.new_version);
                    item.groups_created = Some(outcome.groups_created);
                    item.status = ItemStatus::Done;
                }
                Ok(None) => {
                    // A plan with nothing to publish still completes the item.
                    let item = &mut state.items[idx];
                    item.groups_created = None;
                    item.status = ItemStatus::Done;
                }
                Err(err) => {
                    let item = &mut state.items[idx];
                    warn!(id = %item.id, error = %err, "publication failed");
                    item.status = ItemStatus::Error;
                    item.error = Some(err.to_string());
                }
            }
        }
    }

    /// One CALLBACK pass: deliver the aggregated payload, retrying with
    /// backoff; after the retry budget the payload is considered lost and the
    /// batch completes anyway to avoid unbounded retention.
    async fn drive_callback(&self, state: &mut BatchState) {
        let payload = build_callback_payload(state, Utc::now());

        match self.callback.send(&payload).await {
            Ok(()) => {
                info!(
                    batch_id = %state.batch_id,
                    chunk_id = %state.chunk_id,
                    status = ?payload.status,
                    "callback delivered"
                );
                state.completed_at = Some(Utc::now());
                state.phase = BatchPhase::Done;
            }
            Err(err) => {
                state.callback_retry_count += 1;
                if state.callback_retry_count > self.config.max_callback_retries {
                    error!(
                        batch_id = %state.batch_id,
                        chunk_id = %state.chunk_id,
                        retries = state.callback_retry_count,
                        error = %err,
                        "callback abandoned after retry budget; payload lost"
                    );
                    state.completed_at = Some(Utc::now());
                    state.phase = BatchPhase::Done;
                } else {
                    warn!(
                        batch_id = %state.batch_id,
                        chunk_id = %state.chunk_id,
                        attempt = state.callback_retry_count,
                        error = %err,
                        "callback delivery failed, backing off"
                    );
                    tokio::time::sleep(backoff_delay(state.callback_retry_count)).await;
                }
            }
        }
    }

    fn fail_or_retry(&self, item: &mut ItemState, message: String) {
        item.retry_count += 1;
        if item.retry_count >= self.config.max_retries_per_item {
            warn!(id = %item.id, retries = item.retry_count, error = %message, "item failed");
            item.status = ItemStatus::Error;
            item.error = Some(message);
        } else {
            info!(id = %item.id, retries = item.retry_count, error = %message, "item will retry");
            item.status = ItemStatus::Pending;
        }
    }
}
