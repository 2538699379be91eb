use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use feedsift::ai::{AiGateway, Classifier};
use feedsift::gate::{Clock, RefreshGate};
use feedsift::orchestrator::{FilterOrchestrator, ViewQuery};
use feedsift::registry::SourceRegistry;
use feedsift::store::{ItemStore, MemoryStore};
use feedsift::types::{AiConfig, Item, KeywordItem, Result, RuleKind, SiftError};
use feedsift::age;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

fn item_at(id: &str, source_id: i64, title: &str, published_at: DateTime<Utc>) -> Item {
    Item {
        id: id.to_string(),
        source_id,
        title: title.to_string(),
        description: None,
        published_at,
        read: false,
        saved: false,
        saved_from_view: None,
    }
}

fn item(id: &str, source_id: i64, title: &str) -> Item {
    item_at(id, source_id, title, Utc::now())
}

// ---------------------------------------------------------------------------
// Age filter

#[test]
fn age_filter_drops_items_past_the_threshold() {
    let now = Utc::now();
    let items = vec![
        item_at("fresh", 1, "fresh", now - Duration::minutes(10)),
        item_at("stale", 1, "stale", now - Duration::minutes(120)),
    ];

    let kept = age::filter_by_age(items, Some(60), now);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "fresh");
}

#[test]
fn age_filter_is_a_noop_without_a_positive_threshold() {
    let now = Utc::now();
    let items = vec![item_at("old", 1, "old", now - Duration::days(365))];

    assert_eq!(age::filter_by_age(items.clone(), None, now).len(), 1);
    assert_eq!(age::filter_by_age(items.clone(), Some(0), now).len(), 1);
    assert_eq!(age::filter_by_age(items, Some(-5), now).len(), 1);
}

#[test]
fn age_filter_uses_evaluation_time_not_fetch_time() {
    // The same item set thins as the evaluation clock advances; callers must
    // not expect repeated calls to agree.
    let published = Utc::now();
    let items = vec![item_at("a", 1, "a", published)];

    let soon = published + Duration::minutes(30);
    let later = published + Duration::minutes(90);

    assert_eq!(age::filter_by_age(items.clone(), Some(60), soon).len(), 1);
    assert_eq!(age::filter_by_age(items, Some(60), later).len(), 0);
}

// ---------------------------------------------------------------------------
// AI gateway

struct ScriptedClassifier {
    // title fragments that should fail classification
    reject_containing: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn rejecting(fragments: &[&str]) -> Self {
        Self {
            reject_containing: fragments.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        text: &str,
        _whitelist: Option<&str>,
        _blacklist: Option<&str>,
    ) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.reject_containing.iter().any(|f| text.contains(f)))
    }
}

struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(
        &self,
        _text: &str,
        _whitelist: Option<&str>,
        _blacklist: Option<&str>,
    ) -> Result<bool> {
        Err(SiftError::Classifier("backend unavailable".to_string()))
    }
}

#[tokio::test]
async fn gateway_without_rule_text_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(ScriptedClassifier::rejecting(&["everything"]));
    let gateway = AiGateway::with_classifier(store.clone(), classifier.clone());

    let items = vec![item("a", 1, "everything rejected normally")];
    let kept = gateway.classify(items.clone(), None, None).await;

    assert_eq!(kept.len(), 1);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gateway_without_credential_passes_through_and_writes_no_cache() {
    let store = Arc::new(MemoryStore::new());
    // Default config carries no API key.
    let gateway = AiGateway::new(store.clone(), AiConfig::default());

    let items = vec![item("a", 1, "one"), item("b", 1, "two")];
    let kept = gateway.classify(items, Some("only sports"), None).await;

    assert_eq!(kept.len(), 2);
    assert_eq!(store.decision_count().await, 0);
}

#[tokio::test]
async fn gateway_caches_decisions_and_reuses_them() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(ScriptedClassifier::rejecting(&["politics"]));
    let gateway = AiGateway::with_classifier(store.clone(), classifier.clone());

    let items = vec![
        item("a", 1, "local sports roundup"),
        item("b", 1, "politics special"),
    ];

    let kept = gateway
        .classify(items.clone(), Some("sports only"), None)
        .await;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "a");
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.decision_count().await, 2);

    // Second pass over the same items: decisions come from the cache.
    let kept = gateway.classify(items, Some("sports only"), None).await;
    assert_eq!(kept.len(), 1);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn classifier_failure_fails_open_and_caches_nothing() {
    let store = Arc::new(MemoryStore::new());
    let gateway = AiGateway::with_classifier(store.clone(), Arc::new(FailingClassifier));

    let items = vec![item("a", 1, "one"), item("b", 1, "two")];
    let kept = gateway.classify(items, None, Some("spam")).await;

    assert_eq!(kept.len(), 2, "items survive when the backend errors");
    assert_eq!(store.decision_count().await, 0);
}

// ---------------------------------------------------------------------------
// Refresh gate

struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[test]
fn refresh_gate_refuses_within_interval() {
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let gate = RefreshGate::with_clock(clock.clone());
    let interval = Duration::minutes(5);

    assert!(gate.should_refresh("view:1", interval));
    assert!(!gate.should_refresh("view:1", interval));
    // Independent keys are gated independently.
    assert!(gate.should_refresh("view:2", interval));

    clock.advance(Duration::minutes(6));
    assert!(gate.should_refresh("view:1", interval));
}

// ---------------------------------------------------------------------------
// Orchestrator end to end

struct Fixture {
    registry: Arc<RwLock<SourceRegistry>>,
    store: Arc<MemoryStore>,
    orchestrator: FilterOrchestrator,
}

async fn fixture_with_classifier(classifier: Option<Arc<dyn Classifier>>) -> Fixture {
    let registry = Arc::new(RwLock::new(SourceRegistry::new()));
    let store = Arc::new(MemoryStore::new());
    let item_store: Arc<dyn ItemStore> = store.clone();
    let gateway = match classifier {
        Some(classifier) => AiGateway::with_classifier(item_store.clone(), classifier),
        None => AiGateway::new(item_store.clone(), AiConfig::default()),
    };
    let orchestrator = FilterOrchestrator::new(registry.clone(), item_store, gateway);
    Fixture {
        registry,
        store,
        orchestrator,
    }
}

async fn fixture() -> Fixture {
    fixture_with_classifier(None).await
}

#[tokio::test]
async fn view_with_no_sources_returns_empty_immediately() {
    let fx = fixture().await;
    let view_id = fx.registry.write().await.add_view("empty", Vec::new());

    let result = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: false,
            max_age_minutes: None,
            ai_enabled: true,
        })
        .await
        .unwrap();

    assert!(result.items.is_empty());
    assert!(result.matched_keywords.is_empty());
}

#[tokio::test]
async fn unknown_view_is_an_error() {
    let fx = fixture().await;
    let err = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id: 42,
            unread_only: false,
            max_age_minutes: None,
            ai_enabled: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SiftError::ViewNotFound { id: 42 }));
}

#[tokio::test]
async fn plain_view_returns_exactly_the_stored_items() {
    // One source, zero keyword rules, age threshold 0, AI disabled.
    let fx = fixture().await;
    let (view_id, source_id) = {
        let mut registry = fx.registry.write().await;
        let source_id = registry.add_source("news", "https://example.com/rss", None);
        (registry.add_view("all", vec![source_id]), source_id)
    };

    fx.store
        .merge_upsert(&[
            item("a", source_id, "one"),
            item("b", source_id, "two"),
            item("c", source_id + 1, "other source"),
        ])
        .await
        .unwrap();
    fx.store.set_read("a", true).await.unwrap();

    let all = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: false,
            max_age_minutes: Some(0),
            ai_enabled: false,
        })
        .await
        .unwrap();
    assert_eq!(all.items.len(), 2);
    assert!(all.matched_keywords.is_empty());

    let unread = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: true,
            max_age_minutes: Some(0),
            ai_enabled: false,
        })
        .await
        .unwrap();
    assert_eq!(unread.items.len(), 1);
    assert_eq!(unread.items[0].id, "b");
}

#[tokio::test]
async fn keyword_stage_filters_and_reports_matches() {
    let fx = fixture().await;
    let view_id = {
        let mut registry = fx.registry.write().await;
        let source_id = registry.add_source("news", "https://example.com/rss", None);
        let view_id = registry.add_view("tech", vec![source_id]);
        let whitelist = registry.add_keyword_rule(
            "tech terms",
            RuleKind::Whitelist,
            vec![KeywordItem::new("rust"), KeywordItem::new("linux")],
        );
        let blacklist = registry.add_keyword_rule(
            "noise",
            RuleKind::Blacklist,
            vec![KeywordItem::new("sponsored")],
        );
        registry.attach_keyword_rule(view_id, whitelist);
        registry.attach_keyword_rule(view_id, blacklist);

        fx.store
            .merge_upsert(&[
                item("match", 1, "Rust 2.0 released"),
                item("miss", 1, "cooking tips"),
                item("blocked", 1, "sponsored: rust tooling"),
            ])
            .await
            .unwrap();
        view_id
    };

    let result = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: false,
            max_age_minutes: None,
            ai_enabled: false,
        })
        .await
        .unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].id, "match");
    assert_eq!(result.matched_keywords.len(), 1);
    assert_eq!(result.matched_keywords["match"], vec!["rust"]);
}

#[tokio::test]
async fn stages_apply_in_order_keyword_then_age_then_ai() {
    let classifier = Arc::new(ScriptedClassifier::rejecting(&["opinion"]));
    let fx = fixture_with_classifier(Some(classifier.clone())).await;
    let now = Utc::now();

    let view_id = {
        let mut registry = fx.registry.write().await;
        let source_id = registry.add_source("news", "https://example.com/rss", None);
        let view_id = registry.add_view("filtered", vec![source_id]);
        let whitelist = registry.add_keyword_rule(
            "tech",
            RuleKind::Whitelist,
            vec![KeywordItem::new("rust")],
        );
        registry.attach_keyword_rule(view_id, whitelist);
        let ai_rule =
            registry.add_ai_rule("no opinions", RuleKind::Blacklist, "opinion pieces");
        registry.set_ai_rule(view_id, ai_rule);
        view_id
    };

    fx.store
        .merge_upsert(&[
            item_at("keep", 1, "rust release notes", now),
            item_at("keyword-miss", 1, "python news", now),
            item_at("too-old", 1, "rust archaeology", now - Duration::minutes(300)),
            item_at("ai-reject", 1, "rust opinion piece", now),
        ])
        .await
        .unwrap();

    let result = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: false,
            max_age_minutes: Some(60),
            ai_enabled: true,
        })
        .await
        .unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].id, "keep");
    // Items removed by the keyword or age stage never reach the classifier.
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    // The matched-keyword map reflects stage-3 survivors, including the one
    // the AI stage later removed.
    assert!(result.matched_keywords.contains_key("keep"));
    assert!(result.matched_keywords.contains_key("ai-reject"));
    assert!(!result.matched_keywords.contains_key("keyword-miss"));
}

#[tokio::test]
async fn ai_stage_is_skipped_when_disabled() {
    let classifier = Arc::new(ScriptedClassifier::rejecting(&["everything"]));
    let fx = fixture_with_classifier(Some(classifier.clone())).await;

    let view_id = {
        let mut registry = fx.registry.write().await;
        let source_id = registry.add_source("news", "https://example.com/rss", None);
        let view_id = registry.add_view("v", vec![source_id]);
        let rule = registry.add_ai_rule("drop all", RuleKind::Blacklist, "everything");
        registry.set_ai_rule(view_id, rule);
        view_id
    };

    fx.store
        .merge_upsert(&[item("a", 1, "everything is fine")])
        .await
        .unwrap();

    let result = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: false,
            max_age_minutes: None,
            ai_enabled: false,
        })
        .await
        .unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn matched_keyword_map_is_rebuilt_per_call() {
    let fx = fixture().await;
    let (view_id, plain_view) = {
        let mut registry = fx.registry.write().await;
        let source_id = registry.add_source("news", "https://example.com/rss", None);
        let view_id = registry.add_view("kw", vec![source_id]);
        let plain_view = registry.add_view("plain", vec![source_id]);
        let rule = registry.add_keyword_rule(
            "r",
            RuleKind::Whitelist,
            vec![KeywordItem::new("rust")],
        );
        registry.attach_keyword_rule(view_id, rule);
        (view_id, plain_view)
    };

    fx.store
        .merge_upsert(&[item("a", 1, "rust news")])
        .await
        .unwrap();

    let with_rules = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: false,
            max_age_minutes: None,
            ai_enabled: false,
        })
        .await
        .unwrap();
    assert_eq!(with_rules.matched_keywords.len(), 1);

    // A later call for a rule-less view starts from an empty map; nothing
    // carries over from the previous call.
    let without_rules = fx
        .orchestrator
        .items_for_view(&ViewQuery {
            view_id: plain_view,
            unread_only: false,
            max_age_minutes: None,
            ai_enabled: false,
        })
        .await
        .unwrap();
    assert!(without_rules.matched_keywords.is_empty());
    assert_eq!(without_rules.items.len(), 1);
}

// ---------------------------------------------------------------------------
// Registry import surface

#[test]
fn import_skips_only_blanks_and_duplicates() {
    let mut registry = SourceRegistry::new();
    registry.add_source("existing", "https://example.com/rss", None);

    let created = registry.import_source_list(
        "https://example.com/new\n\
         \n\
         HTTPS://EXAMPLE.COM/RSS\n\
         https://example.com/new2\n",
    );

    assert_eq!(created.len(), 2);
    for id in &created {
        let source = registry.source(*id).unwrap();
        assert!(source.name.is_empty(), "imported sources have no display name");
    }
}

#[test]
fn import_keeps_lines_that_are_not_http_urls() {
    // Unfetchable endpoints are the fetcher's problem (they show up in the
    // failed-endpoint list); the import surface never drops input.
    let mut registry = SourceRegistry::new();

    let created = registry.import_source_list("www.example.com/rss\nfeed://example.com/a\n");

    assert_eq!(created.len(), 2);
    let urls: Vec<&str> = created
        .iter()
        .map(|id| registry.source(*id).unwrap().url.as_str())
        .collect();
    assert!(urls.contains(&"www.example.com/rss"));
    assert!(urls.contains(&"feed://example.com/a"));
}
