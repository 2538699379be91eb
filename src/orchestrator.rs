use crate::age;
use crate::ai::AiGateway;
use crate::keyword;
use crate::registry::SourceRegistry;
use crate::store::ItemStore;
use crate::types::{Item, Result, SiftError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One request for a view's filtered result set.
#[derive(Debug, Clone)]
pub struct ViewQuery {
    pub view_id: i64,
    pub unread_only: bool,
    pub max_age_minutes: Option<i64>,
    pub ai_enabled: bool,
}

/// Surviving items plus, per item identity, the whitelist keyword terms that
/// matched during the keyword stage (for highlighting by the caller). The map
/// is rebuilt from scratch on every call and never merged across calls.
#[derive(Debug, Default)]
pub struct ViewResult {
    pub items: Vec<Item>,
    pub matched_keywords: HashMap<String, Vec<String>>,
}

/// Composes the keyword, age, and AI stages into one fixed-order pipeline per
/// view.
pub struct FilterOrchestrator {
    registry: Arc<RwLock<SourceRegistry>>,
    store: Arc<dyn ItemStore>,
    ai: AiGateway,
}

impl FilterOrchestrator {
    pub fn new(
        registry: Arc<RwLock<SourceRegistry>>,
        store: Arc<dyn ItemStore>,
        ai: AiGateway,
    ) -> Self {
        Self {
            registry,
            store,
            ai,
        }
    }

    pub async fn items_for_view(&self, query: &ViewQuery) -> Result<ViewResult> {
        let (source_ids, whitelist, blacklist, ai_whitelist, ai_blacklist) = {
            let registry = self.registry.read().await;
            let view = registry
                .view(query.view_id)
                .ok_or(SiftError::ViewNotFound { id: query.view_id })?;
            let (whitelist, blacklist) = registry.keyword_sets(view);
            let (ai_whitelist, ai_blacklist) = registry.ai_rule_texts(view);
            (
                view.source_ids.clone(),
                whitelist,
                blacklist,
                ai_whitelist,
                ai_blacklist,
            )
        };

        if source_ids.is_empty() {
            debug!("view {} has no sources", query.view_id);
            return Ok(ViewResult::default());
        }

        let candidates = self.store.query(&source_ids, query.unread_only).await?;
        let candidate_count = candidates.len();

        // Keyword stage. A view with no keyword items at all skips the stage
        // instead of treating the empty rule set as "pass nothing".
        let mut matched_keywords = HashMap::new();
        let survivors: Vec<Item> = if whitelist.is_empty() && blacklist.is_empty() {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|item| {
                    let verdict = keyword::evaluate(&item.search_text(), &whitelist, &blacklist);
                    if verdict.passes && !verdict.matched_whitelist.is_empty() {
                        matched_keywords.insert(item.id.clone(), verdict.matched_whitelist);
                    }
                    verdict.passes
                })
                .collect()
        };

        let survivors = age::filter_by_age(survivors, query.max_age_minutes, Utc::now());

        let items = if query.ai_enabled {
            self.ai
                .classify(survivors, ai_whitelist.as_deref(), ai_blacklist.as_deref())
                .await
        } else {
            survivors
        };

        info!(
            "view {}: {} of {} candidates survived filtering",
            query.view_id,
            items.len(),
            candidate_count
        );
        Ok(ViewResult {
            items,
            matched_keywords,
        })
    }
}
