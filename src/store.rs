use crate::types::{AiDecision, Item, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Keyed persistent collection of items plus the AI decision cache. The
/// pipeline consumes this interface only; engine internals stay behind it.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Item>>;

    async fn upsert(&self, item: &Item) -> Result<()>;

    /// Items belonging to any of `source_ids`, newest first, optionally
    /// restricted to unread ones.
    async fn query(&self, source_ids: &[i64], unread_only: bool) -> Result<Vec<Item>>;

    async fn set_read(&self, id: &str, read: bool) -> Result<()>;

    async fn set_saved(&self, id: &str, saved: bool, from_view: Option<i64>) -> Result<()>;

    async fn cached_decision(&self, id: &str) -> Result<Option<AiDecision>>;

    /// Record a classification decision for an item identity, replacing any
    /// earlier record. Concurrent writes for the same identity may race;
    /// last write wins.
    async fn put_cached_decision(
        &self,
        id: &str,
        passed: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Administrative pruning of stale decisions; never called on the
    /// real-time filtering path. Returns the number of records removed.
    async fn prune_decisions_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Merge one fetch cycle's items into the store. For an identity that
    /// already exists, the existing record's read and saved state survives
    /// while every other field takes the incoming value — a routine re-fetch
    /// must never revert a user's "read" or "saved" action. Unknown
    /// identities are inserted as-is.
    async fn merge_upsert(&self, items: &[Item]) -> Result<()> {
        for incoming in items {
            let merged = match self.get(&incoming.id).await? {
                Some(existing) => Item {
                    read: existing.read,
                    saved: existing.saved,
                    saved_from_view: existing.saved_from_view,
                    ..incoming.clone()
                },
                None => incoming.clone(),
            };
            self.upsert(&merged).await?;
        }
        debug!("merged {} items", items.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    items: HashMap<String, Item>,
    decisions: HashMap<String, AiDecision>,
}

/// Store backed by in-process maps. Used by tests and by embeddings that do
/// not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached AI decisions, exposed for cache-contract tests.
    pub async fn decision_count(&self) -> usize {
        self.state.read().await.decisions.len()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.state.read().await.items.get(id).cloned())
    }

    async fn upsert(&self, item: &Item) -> Result<()> {
        self.state
            .write()
            .await
            .items
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn query(&self, source_ids: &[i64], unread_only: bool) -> Result<Vec<Item>> {
        let state = self.state.read().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| source_ids.contains(&item.source_id))
            .filter(|item| !unread_only || !item.read)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(items)
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<()> {
        if let Some(item) = self.state.write().await.items.get_mut(id) {
            item.read = read;
        }
        Ok(())
    }

    async fn set_saved(&self, id: &str, saved: bool, from_view: Option<i64>) -> Result<()> {
        if let Some(item) = self.state.write().await.items.get_mut(id) {
            item.saved = saved;
            item.saved_from_view = if saved { from_view } else { None };
        }
        Ok(())
    }

    async fn cached_decision(&self, id: &str) -> Result<Option<AiDecision>> {
        Ok(self.state.read().await.decisions.get(id).copied())
    }

    async fn put_cached_decision(
        &self,
        id: &str,
        passed: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<()> {
        self.state
            .write()
            .await
            .decisions
            .insert(id.to_string(), AiDecision { passed, decided_at });
        Ok(())
    }

    async fn prune_decisions_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.decisions.len();
        state.decisions.retain(|_, d| d.decided_at >= cutoff);
        Ok((before - state.decisions.len()) as u64)
    }
}
