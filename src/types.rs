use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ingested feed entry. The `id` is the canonical link of the entry and
/// serves as the merge key; it never changes once the item exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub source_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub read: bool,
    pub saved: bool,
    pub saved_from_view: Option<i64>,
}

impl Item {
    /// Combined title + description text that the keyword and AI stages
    /// evaluate against.
    pub fn search_text(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => format!("{} {}", self.title, desc),
            _ => self.title.clone(),
        }
    }
}

/// A configured feed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub tz_offset_minutes: Option<i32>,
}

/// Whether a rule admits items (whitelist) or rejects them (blacklist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleKind {
    Whitelist,
    Blacklist,
}

/// One keyword within a rule. Matching is case-insensitive unless
/// `case_sensitive` is set; `text` may contain at most one `*` wildcard
/// (only the first one is significant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordItem {
    pub text: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl KeywordItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            case_sensitive: false,
            whole_word: false,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn whole_word(mut self) -> Self {
        self.whole_word = true;
        self
    }
}

/// A named group of keywords, flagged whitelist or blacklist. A view may
/// attach several rules; each contributes its items into the view's combined
/// whitelist or blacklist keyword set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub id: i64,
    pub name: String,
    pub kind: RuleKind,
    pub items: Vec<KeywordItem>,
}

/// A natural-language classification instruction evaluated by the remote
/// model. A view carries at most one active whitelist and one active
/// blacklist AiRule; that limit lives in the association, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRule {
    pub id: i64,
    pub name: String,
    pub kind: RuleKind,
    pub instruction: String,
}

/// A named grouping of sources plus filter configuration ("reading feed").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: i64,
    pub name: String,
    pub source_ids: Vec<i64>,
    pub keyword_rule_ids: Vec<i64>,
    pub ai_whitelist_rule: Option<i64>,
    pub ai_blacklist_rule: Option<i64>,
}

/// Cached AI classification outcome for one item identity. At most one live
/// record per identity; later writes replace earlier ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AiDecision {
    pub passed: bool,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub max_redirects: usize,
    pub max_concurrent_fetches: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "feedsift/0.1".to_string(),
            timeout_seconds: 30,
            connect_timeout_seconds: 30,
            max_redirects: 5,
            max_concurrent_fetches: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
}

impl AiConfig {
    /// The classification stage only runs when a credential is present;
    /// an absent key degrades the stage to pass-through.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.is_empty())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Document did not begin with parseable feed markup. Distinct from
    /// transport failures, though both collapse into the same per-endpoint
    /// failure outcome at the fetch layer.
    #[error("not a syndication document: {0}")]
    BadContent(String),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("view not found: {id}")]
    ViewNotFound { id: i64 },

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, SiftError>;
