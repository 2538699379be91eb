use crate::store::ItemStore;
use crate::types::{AiDecision, Item, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

/// SQLite-backed item store. The schema is created on connect so the binary
/// can run against a fresh database file.
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let db = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                source_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                published_at TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                saved INTEGER NOT NULL DEFAULT 0,
                saved_from_view INTEGER
            )
            "#,
        )
        .execute(&db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_decisions (
                item_id TEXT PRIMARY KEY,
                passed INTEGER NOT NULL,
                decided_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await?;

        info!("connected item store: {}", database_url);
        Ok(Self { db })
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<Item> {
        Ok(Item {
            id: row.try_get("id")?,
            source_id: row.try_get("source_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            published_at: row.try_get::<DateTime<Utc>, _>("published_at")?,
            read: row.try_get("read")?,
            saved: row.try_get("saved")?,
            saved_from_view: row.try_get("saved_from_view")?,
        })
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn upsert(&self, item: &Item) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, source_id, title, description, published_at, read, saved, saved_from_view)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                source_id = excluded.source_id,
                title = excluded.title,
                description = excluded.description,
                published_at = excluded.published_at,
                read = excluded.read,
                saved = excluded.saved,
                saved_from_view = excluded.saved_from_view
            "#,
        )
        .bind(&item.id)
        .bind(item.source_id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.published_at)
        .bind(item.read)
        .bind(item.saved)
        .bind(item.saved_from_view)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn query(&self, source_ids: &[i64], unread_only: bool) -> Result<Vec<Item>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; source_ids.len()].join(", ");
        let mut sql = format!(
            "SELECT * FROM items WHERE source_id IN ({})",
            placeholders
        );
        if unread_only {
            sql.push_str(" AND read = 0");
        }
        sql.push_str(" ORDER BY published_at DESC");

        let mut query = sqlx::query(&sql);
        for source_id in source_ids {
            query = query.bind(*source_id);
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<()> {
        sqlx::query("UPDATE items SET read = ? WHERE id = ?")
            .bind(read)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_saved(&self, id: &str, saved: bool, from_view: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE items SET saved = ?, saved_from_view = ? WHERE id = ?")
            .bind(saved)
            .bind(if saved { from_view } else { None })
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn cached_decision(&self, id: &str) -> Result<Option<AiDecision>> {
        let row = sqlx::query("SELECT passed, decided_at FROM ai_decisions WHERE item_id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        match row {
            Some(row) => Ok(Some(AiDecision {
                passed: row.try_get("passed")?,
                decided_at: row.try_get::<DateTime<Utc>, _>("decided_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn put_cached_decision(
        &self,
        id: &str,
        passed: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_decisions (item_id, passed, decided_at)
            VALUES (?, ?, ?)
            ON CONFLICT (item_id) DO UPDATE SET
                passed = excluded.passed,
                decided_at = excluded.decided_at
            "#,
        )
        .bind(id)
        .bind(passed)
        .bind(decided_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn prune_decisions_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ai_decisions WHERE decided_at < ?")
            .bind(cutoff)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
