use crate::store::ItemStore;
use crate::types::{AiConfig, Item, Result, SiftError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote semantic classifier contract: item text plus up to two
/// natural-language rule strings in, pass/fail out.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        whitelist: Option<&str>,
        blacklist: Option<&str>,
    ) -> Result<bool>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Classifier over an OpenAI-style chat-completions endpoint. One call per
/// item; the request carries the rule texts and the item text and asks for a
/// bare PASS/FAIL verdict.
pub struct RemoteClassifier {
    client: Client,
    config: AiConfig,
}

impl RemoteClassifier {
    pub fn new(config: AiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("failed to build HTTP client");
        Self { client, config }
    }

    fn build_prompt(text: &str, whitelist: Option<&str>, blacklist: Option<&str>) -> String {
        let mut prompt = String::from(
            "You are filtering feed items for a reader. Decide whether the item below should be shown.\n",
        );
        if let Some(rule) = whitelist {
            prompt.push_str(&format!("Show the item only if it matches: {}\n", rule));
        }
        if let Some(rule) = blacklist {
            prompt.push_str(&format!("Hide the item if it matches: {}\n", rule));
        }
        prompt.push_str("Answer with exactly PASS (show) or FAIL (hide).\n\nItem:\n");
        prompt.push_str(text);
        prompt
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(
        &self,
        text: &str,
        whitelist: Option<&str>,
        blacklist: Option<&str>,
    ) -> Result<bool> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| SiftError::Classifier("no API key configured".to_string()))?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::build_prompt(text, whitelist, blacklist),
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SiftError::Classifier(format!(
                "classifier returned HTTP {}",
                status
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let verdict = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_uppercase())
            .ok_or_else(|| SiftError::Classifier("empty classifier response".to_string()))?;

        Ok(verdict.starts_with("PASS"))
    }
}

/// Wraps the remote classifier with a per-identity decision cache and
/// fail-open error handling. Unconfigured, it degrades to pass-through.
pub struct AiGateway {
    store: Arc<dyn ItemStore>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl AiGateway {
    pub fn new(store: Arc<dyn ItemStore>, config: AiConfig) -> Self {
        let classifier: Option<Arc<dyn Classifier>> = if config.is_configured() {
            Some(Arc::new(RemoteClassifier::new(config)))
        } else {
            None
        };
        Self { store, classifier }
    }

    /// Injection point for tests and alternative backends.
    pub fn with_classifier(store: Arc<dyn ItemStore>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            store,
            classifier: Some(classifier),
        }
    }

    /// Classify a batch of items against the view's rule texts, returning the
    /// ones that pass. Skipped entirely when no rule text is set; a missing
    /// backend returns the input unchanged without touching the cache.
    ///
    /// Cached decisions are reused as-is; they are keyed by item identity
    /// alone, so a changed rule text does not invalidate them. A failed
    /// classifier call keeps its item (fail open) and caches nothing.
    pub async fn classify(
        &self,
        items: Vec<Item>,
        whitelist: Option<&str>,
        blacklist: Option<&str>,
    ) -> Vec<Item> {
        if whitelist.is_none() && blacklist.is_none() {
            return items;
        }
        let classifier = match &self.classifier {
            Some(classifier) => classifier,
            None => {
                debug!("AI filtering requested but no backend configured; passing items through");
                return items;
            }
        };

        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let passed = match self.store.cached_decision(&item.id).await {
                Ok(Some(decision)) => decision.passed,
                Ok(None) => {
                    match classifier
                        .classify(&item.search_text(), whitelist, blacklist)
                        .await
                    {
                        Ok(passed) => {
                            if let Err(e) = self
                                .store
                                .put_cached_decision(&item.id, passed, Utc::now())
                                .await
                            {
                                warn!("failed to cache decision for {}: {}", item.id, e);
                            }
                            passed
                        }
                        Err(e) => {
                            warn!("classification failed for {}: {}; keeping item", item.id, e);
                            true
                        }
                    }
                }
                Err(e) => {
                    warn!("decision cache read failed for {}: {}; keeping item", item.id, e);
                    true
                }
            };
            if passed {
                kept.push(item);
            }
        }
        kept
    }
}
