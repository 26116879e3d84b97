use sqlx::QueryBuilder;
use std::collections::HashSet;

use super::schema::Database;
use super::types::{Article, DatabaseError, Feed, FeedHistoryDbRow, FeedHistoryItem};

/// Bind parameters per `IN (...)` query, well under SQLite's 999 limit
const URL_BATCH_SIZE: usize = 500;

impl Database {
    // ========================================================================
    // Deduplication
    // ========================================================================

    /// URLs among `urls` already present in `bookmarks` or `rss_feed_items`.
    ///
    /// Matching is exact string comparison.
    pub async fn existing_urls(&self, urls: &[&str]) -> Result<HashSet<String>, DatabaseError> {
        let mut seen = HashSet::new();
        if urls.is_empty() {
            return Ok(seen);
        }

        for table in ["bookmarks", "rss_feed_items"] {
            for chunk in urls.chunks(URL_BATCH_SIZE) {
                let mut builder: QueryBuilder<sqlx::Sqlite> =
                    QueryBuilder::new(format!("SELECT DISTINCT url FROM {table} WHERE url IN ("));
                let mut separated = builder.separated(", ");
                for url in chunk {
                    separated.push_bind(*url);
                }
                separated.push_unseparated(")");

                let rows: Vec<(String,)> = builder.build_query_as().fetch_all(&self.pool).await?;
                seen.extend(rows.into_iter().map(|(url,)| url));
            }
        }

        Ok(seen)
    }

    /// Keep only the articles that have not been ingested before.
    ///
    /// An article is dropped when its URL is already a bookmark or a feed
    /// history item (from any feed). When the feed has been checked before,
    /// articles published at or before `last_fetched_at` are dropped too;
    /// articles without a publish date are always kept. Input order is
    /// preserved.
    pub async fn filter_new_articles(
        &self,
        articles: Vec<Article>,
        feed: &Feed,
    ) -> Result<Vec<Article>, DatabaseError> {
        if articles.is_empty() {
            return Ok(articles);
        }

        let urls: Vec<&str> = articles.iter().map(|a| a.url.as_str()).collect();
        let seen = self.existing_urls(&urls).await?;

        let total = articles.len();
        let fresh: Vec<Article> = articles
            .into_iter()
            .filter(|a| !seen.contains(&a.url))
            .filter(|a| match (feed.last_fetched_at, a.published_at) {
                (Some(last), Some(published)) => published > last,
                _ => true,
            })
            .collect();

        tracing::debug!(
            feed_id = feed.id,
            total = total,
            known_urls = seen.len(),
            new = fresh.len(),
            "Filtered feed articles"
        );

        Ok(fresh)
    }

    // ========================================================================
    // History Queries
    // ========================================================================

    /// History rows for a feed in insertion order
    pub async fn get_feed_history(
        &self,
        feed_id: i64,
    ) -> Result<Vec<FeedHistoryItem>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedHistoryDbRow>(
            r#"
            SELECT id, feed_id, guid, url, title, description, published_at
            FROM rss_feed_items
            WHERE feed_id = ?
            ORDER BY id
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeedHistoryDbRow::into_item).collect())
    }
}
