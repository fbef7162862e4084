//! Application state wiring all services together.
//!
//! Services are generic over the seam traits; AppState pins them to the
//! concrete infra implementations.

use std::sync::Arc;

use shelver_core::batch::BatchProcessor;
use shelver_core::context::ContextFetcher;
use shelver_core::organize::OrganizeService;
use shelver_core::publish::Publisher;
use shelver_infra::callback::HttpCallbackSender;
use shelver_infra::llm::OpenAiCompatClient;
use shelver_infra::sqlite::{DatabasePool, SqliteBatchStore};
use shelver_infra::store::HttpEntityStore;
use shelver_types::config::ShelverConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteOrganizeService = OrganizeService<OpenAiCompatClient>;

pub type ConcreteBatchProcessor =
    BatchProcessor<OpenAiCompatClient, HttpEntityStore, SqliteBatchStore, HttpCallbackSender>;

/// Shared application state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub organize_service: ConcreteOrganizeService,
    pub batch_processor: Arc<ConcreteBatchProcessor>,
    pub config: ShelverConfig,
}

impl AppState {
    /// Wire clients, database, and services from configuration.
    ///
    /// Also re-spawns runners for batches interrupted by a restart.
    pub async fn init(config: ShelverConfig) -> anyhow::Result<Self> {
        let llm_client = Arc::new(OpenAiCompatClient::from_config(&config));
        let entity_store = Arc::new(HttpEntityStore::from_config(&config));
        let callback = Arc::new(HttpCallbackSender::from_config(&config));

        let pool = DatabasePool::open(&config.database_path).await?;
        let batch_store = Arc::new(SqliteBatchStore::new(pool));

        let organize_service = OrganizeService::new(Arc::clone(&llm_client), config.clone());
        let batch_processor = Arc::new(BatchProcessor::new(
            organize_service.clone(),
            ContextFetcher::new(Arc::clone(&entity_store)),
            Publisher::new(entity_store),
            batch_store,
            callback,
            config.clone(),
        ));

        let resumed = batch_processor.resume_all().await?;
        if resumed > 0 {
            tracing::info!(count = resumed, "resumed interrupted batches");
        }

        Ok(Self {
            organize_service,
            batch_processor,
            config,
        })
    }
}
