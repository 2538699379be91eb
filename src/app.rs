use crate::ai::AiGateway;
use crate::fetcher::Fetcher;
use crate::gate::RefreshGate;
use crate::orchestrator::{FilterOrchestrator, ViewQuery, ViewResult};
use crate::registry::SourceRegistry;
use crate::store::ItemStore;
use crate::types::{AiConfig, FetchConfig, Result};
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Summary of one refresh cycle. A partially failed cycle still merges
/// everything that succeeded; `failed_sources` lets the caller surface a
/// partial-failure notice without discarding the rest.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub fetched: usize,
    pub failed_sources: Vec<String>,
}

/// Facade tying the registry, item store, fetcher, refresh gate, and filter
/// pipeline together.
pub struct FeedSift {
    registry: Arc<RwLock<SourceRegistry>>,
    store: Arc<dyn ItemStore>,
    fetcher: Fetcher,
    orchestrator: FilterOrchestrator,
    gate: RefreshGate,
}

impl FeedSift {
    pub fn new(store: Arc<dyn ItemStore>, fetch_config: FetchConfig, ai_config: AiConfig) -> Self {
        let registry = Arc::new(RwLock::new(SourceRegistry::new()));
        let fetcher = Fetcher::new(fetch_config);
        let ai = AiGateway::new(store.clone(), ai_config);
        let orchestrator = FilterOrchestrator::new(registry.clone(), store.clone(), ai);

        Self {
            registry,
            store,
            fetcher,
            orchestrator,
            gate: RefreshGate::new(),
        }
    }

    pub fn registry(&self) -> Arc<RwLock<SourceRegistry>> {
        self.registry.clone()
    }

    pub async fn import_sources(&self, text: &str) -> Vec<i64> {
        self.registry.write().await.import_source_list(text)
    }

    /// Fetch every registered source and merge the results into the store as
    /// one logical unit.
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let endpoints = self.registry.read().await.endpoints(None);
        self.refresh_endpoints(endpoints).await
    }

    /// Fetch one view's sources, refusing when the view was refreshed less
    /// than `min_interval` ago. Returns `None` when the gate refuses.
    pub async fn refresh_view(
        &self,
        view_id: i64,
        min_interval: Duration,
    ) -> Result<Option<RefreshReport>> {
        if !self
            .gate
            .should_refresh(&format!("view:{}", view_id), min_interval)
        {
            info!("view {} refreshed too recently; skipping", view_id);
            return Ok(None);
        }
        let endpoints = self.registry.read().await.endpoints(Some(view_id));
        Ok(Some(self.refresh_endpoints(endpoints).await?))
    }

    async fn refresh_endpoints(
        &self,
        endpoints: std::collections::HashMap<String, i64>,
    ) -> Result<RefreshReport> {
        let outcome = self.fetcher.fetch_all(&endpoints).await;
        let fetched = outcome.items.len();
        self.store.merge_upsert(&outcome.items).await?;
        Ok(RefreshReport {
            fetched,
            failed_sources: outcome.failed,
        })
    }

    pub async fn items_for_view(&self, query: &ViewQuery) -> Result<ViewResult> {
        self.orchestrator.items_for_view(query).await
    }

    pub async fn mark_read(&self, item_id: &str, read: bool) -> Result<()> {
        self.store.set_read(item_id, read).await
    }

    pub async fn save_for_later(
        &self,
        item_id: &str,
        saved: bool,
        from_view: Option<i64>,
    ) -> Result<()> {
        self.store.set_saved(item_id, saved, from_view).await
    }
}
