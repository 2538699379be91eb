use chrono::{Duration, Utc};
use feedsift::db::SqliteStore;
use feedsift::store::ItemStore;
use feedsift::types::Item;
use uuid::Uuid;

/// Fresh database file per test; removed when the test ends.
struct TempDb {
    path: std::path::PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("feedsift-test-{}.db", Uuid::new_v4()));
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn item(id: &str, source_id: i64, title: &str) -> Item {
    Item {
        id: id.to_string(),
        source_id,
        title: title.to_string(),
        description: None,
        published_at: Utc::now(),
        read: false,
        saved: false,
        saved_from_view: None,
    }
}

#[tokio::test]
async fn merge_preserves_flags_across_refetch() {
    let db = TempDb::new();
    let store = SqliteStore::connect(&db.url()).await.unwrap();

    store
        .merge_upsert(&[item("https://example.com/a", 1, "original title")])
        .await
        .unwrap();
    store.set_read("https://example.com/a", true).await.unwrap();
    store
        .set_saved("https://example.com/a", true, Some(7))
        .await
        .unwrap();

    // The same entry comes back from the wire with an updated title.
    store
        .merge_upsert(&[item("https://example.com/a", 1, "updated title")])
        .await
        .unwrap();

    let stored = store.get("https://example.com/a").await.unwrap().unwrap();
    assert!(stored.read, "re-fetch must not revert the read flag");
    assert!(stored.saved);
    assert_eq!(stored.saved_from_view, Some(7));
    assert_eq!(stored.title, "updated title");
}

#[tokio::test]
async fn query_filters_by_source_and_read_state() {
    let db = TempDb::new();
    let store = SqliteStore::connect(&db.url()).await.unwrap();

    store
        .merge_upsert(&[
            item("a", 1, "one"),
            item("b", 1, "two"),
            item("c", 2, "three"),
        ])
        .await
        .unwrap();
    store.set_read("a", true).await.unwrap();

    let unread_source_1 = store.query(&[1], true).await.unwrap();
    assert_eq!(unread_source_1.len(), 1);
    assert_eq!(unread_source_1[0].id, "b");

    let both_sources = store.query(&[1, 2], false).await.unwrap();
    assert_eq!(both_sources.len(), 3);

    let none = store.query(&[99], false).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn query_orders_newest_first() {
    let db = TempDb::new();
    let store = SqliteStore::connect(&db.url()).await.unwrap();
    let now = Utc::now();

    let mut older = item("old", 1, "old");
    older.published_at = now - Duration::hours(2);
    let mut newer = item("new", 1, "new");
    newer.published_at = now;

    store.merge_upsert(&[older, newer]).await.unwrap();

    let items = store.query(&[1], false).await.unwrap();
    assert_eq!(items[0].id, "new");
    assert_eq!(items[1].id, "old");
}

#[tokio::test]
async fn decision_cache_overwrites_by_key_and_prunes_by_age() {
    let db = TempDb::new();
    let store = SqliteStore::connect(&db.url()).await.unwrap();
    let now = Utc::now();

    store
        .put_cached_decision("item-1", true, now - Duration::days(30))
        .await
        .unwrap();
    store
        .put_cached_decision("item-1", false, now)
        .await
        .unwrap();
    store
        .put_cached_decision("item-2", true, now - Duration::days(30))
        .await
        .unwrap();

    let decision = store.cached_decision("item-1").await.unwrap().unwrap();
    assert!(!decision.passed, "later write replaces the earlier one");

    let pruned = store
        .prune_decisions_before(now - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(pruned, 1);
    assert!(store.cached_decision("item-2").await.unwrap().is_none());
    assert!(store.cached_decision("item-1").await.unwrap().is_some());
}
