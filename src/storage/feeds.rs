use chrono::Utc;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{from_millis, to_millis, DatabaseError, Feed, FeedRow};

const FEED_COLUMNS: &str =
    "id, url, display_name, is_active, last_fetched_at, created_at, updated_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Subscribe to a feed, returning its id.
    ///
    /// Re-adding an existing URL updates its display name and reactivates it.
    pub async fn insert_feed(&self, url: &str, display_name: &str) -> Result<i64, DatabaseError> {
        let now = to_millis(Utc::now());
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO rss_feeds (url, display_name, is_active, created_at, updated_at)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                display_name = excluded.display_name,
                is_active = 1,
                updated_at = excluded.updated_at
            RETURNING id
        "#,
        )
        .bind(url)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// All feeds, active or not, ordered by id
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM rss_feeds ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Feed::from_row).collect())
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM rss_feeds WHERE id = ?"))
                .bind(feed_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Feed::from_row))
    }

    /// Active feeds to process in a batch.
    ///
    /// `None` selects every active feed. `Some(ids)` selects the active
    /// feeds among `ids`; inactive or unknown ids are ignored. An empty id
    /// list selects nothing.
    pub async fn get_active_feeds(
        &self,
        feed_ids: Option<&[i64]>,
    ) -> Result<Vec<Feed>, DatabaseError> {
        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
            "SELECT {FEED_COLUMNS} FROM rss_feeds WHERE is_active = 1"
        ));

        if let Some(ids) = feed_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            builder.push(" AND id IN (");
            let mut separated = builder.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }
        builder.push(" ORDER BY id");

        let rows: Vec<FeedRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Feed::from_row).collect())
    }

    pub async fn set_feed_active(&self, feed_id: i64, active: bool) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE rss_feeds SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(active)
                .bind(to_millis(Utc::now()))
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record that a feed was checked, returning the new `last_fetched_at`.
    ///
    /// Runs whether or not the check produced new articles. The stored value
    /// is `max(now, previous + 1ms)` so it strictly increases even when two
    /// checks land in the same millisecond.
    pub async fn touch_feed(
        &self,
        feed_id: i64,
    ) -> Result<chrono::DateTime<Utc>, DatabaseError> {
        let now = to_millis(Utc::now());
        let (last_fetched_at,): (i64,) = sqlx::query_as(
            r#"
            UPDATE rss_feeds
            SET last_fetched_at = MAX(?, COALESCE(last_fetched_at + 1, 0)),
                updated_at = ?
            WHERE id = ?
            RETURNING last_fetched_at
        "#,
        )
        .bind(now)
        .bind(now)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(from_millis(last_fetched_at))
    }
}
