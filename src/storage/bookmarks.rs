use chrono::Utc;

use super::schema::Database;
use super::types::{to_millis, Article, Bookmark, BookmarkDbRow, DatabaseError};

impl Database {
    // ========================================================================
    // Article Persistence
    // ========================================================================

    /// Persist new articles for a feed, returning how many were stored.
    ///
    /// Each article becomes a bookmark plus a feed history row, written
    /// together in one transaction so a failure cannot leave a bookmark
    /// without its history record. Articles are written one at a time; a
    /// failure on one article is logged and the rest still get written.
    ///
    /// Empty input returns `Ok(0)` without touching the database.
    pub async fn save_articles(
        &self,
        feed_id: i64,
        articles: &[Article],
    ) -> Result<usize, DatabaseError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut created = 0;
        for article in articles {
            match self.save_article(feed_id, article).await {
                Ok(()) => created += 1,
                Err(e) => {
                    tracing::warn!(
                        feed_id = feed_id,
                        url = %article.url,
                        error = %e,
                        "Failed to save article, skipping"
                    );
                }
            }
        }

        Ok(created)
    }

    async fn save_article(&self, feed_id: i64, article: &Article) -> Result<(), sqlx::Error> {
        let now = to_millis(Utc::now());
        let created_at = article.published_at.map(to_millis).unwrap_or(now);
        let published_at = article.published_at.map(to_millis);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO bookmarks (url, title, is_read, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
        "#,
        )
        .bind(&article.url)
        .bind(&article.title)
        .bind(created_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO rss_feed_items (feed_id, guid, url, title, description, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(feed_id)
        .bind(&article.guid)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.description)
        .bind(published_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    // ========================================================================
    // Bookmark Queries
    // ========================================================================

    /// Add a bookmark outside of feed ingestion, returning its id
    pub async fn insert_bookmark(&self, url: &str, title: &str) -> Result<i64, DatabaseError> {
        let now = to_millis(Utc::now());
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO bookmarks (url, title, is_read, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            RETURNING id
        "#,
        )
        .bind(url)
        .bind(title)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_bookmark_by_url(&self, url: &str) -> Result<Option<Bookmark>, DatabaseError> {
        let row = sqlx::query_as::<_, BookmarkDbRow>(
            "SELECT id, url, title, is_read, created_at, updated_at FROM bookmarks WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(BookmarkDbRow::into_bookmark))
    }

    /// Bookmarks newest first
    pub async fn list_bookmarks(&self, limit: i64) -> Result<Vec<Bookmark>, DatabaseError> {
        let rows = sqlx::query_as::<_, BookmarkDbRow>(
            r#"
            SELECT id, url, title, is_read, created_at, updated_at
            FROM bookmarks
            ORDER BY created_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(BookmarkDbRow::into_bookmark).collect())
    }

    /// Delete a bookmark. Its feed history row stays behind.
    pub async fn delete_bookmark(&self, bookmark_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = ?")
            .bind(bookmark_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Article, Database};
    use chrono::{TimeZone, Utc};

    async fn test_db() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let feed_id = db
            .insert_feed("https://feed.example.com/rss", "Test Feed")
            .await
            .unwrap();
        (db, feed_id)
    }

    fn test_article(slug: &str) -> Article {
        Article {
            guid: format!("guid-{slug}"),
            url: format!("https://example.com/{slug}"),
            title: format!("Article {slug}"),
            description: Some("Test summary".to_string()),
            author: None,
            published_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            categories: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_articles_creates_bookmark_and_history() {
        let (db, feed_id) = test_db().await;
        let count = db
            .save_articles(feed_id, &[test_article("a"), test_article("b")])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let bookmark = db
            .get_bookmark_by_url("https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert!(!bookmark.is_read);
        assert_eq!(bookmark.title, "Article a");
        assert_eq!(
            bookmark.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );

        let history = db.get_feed_history(feed_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].guid, "guid-a");
        assert_eq!(history[0].description.as_deref(), Some("Test summary"));
    }

    #[tokio::test]
    async fn test_save_articles_undated_uses_now() {
        let (db, feed_id) = test_db().await;
        let mut article = test_article("undated");
        article.published_at = None;

        let before = Utc::now() - chrono::Duration::seconds(1);
        db.save_articles(feed_id, &[article]).await.unwrap();

        let bookmark = db
            .get_bookmark_by_url("https://example.com/undated")
            .await
            .unwrap()
            .unwrap();
        assert!(bookmark.created_at >= before);
    }

    #[tokio::test]
    async fn test_save_articles_empty_makes_no_db_calls() {
        let (db, feed_id) = test_db().await;
        // Any query against a closed pool errors, so Ok(0) proves nothing ran
        db.close().await;
        assert_eq!(db.save_articles(feed_id, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_articles_continues_after_failure() {
        let (db, feed_id) = test_db().await;
        db.insert_bookmark("https://example.com/dup", "Existing")
            .await
            .unwrap();

        let articles = vec![test_article("first"), test_article("dup"), test_article("last")];
        let count = db.save_articles(feed_id, &articles).await.unwrap();
        assert_eq!(count, 2);

        assert!(db
            .get_bookmark_by_url("https://example.com/last")
            .await
            .unwrap()
            .is_some());

        // The failed pair rolled back: no history row for the duplicate
        let history = db.get_feed_history(feed_id).await.unwrap();
        let urls: Vec<&str> = history.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/first", "https://example.com/last"]
        );
    }

    #[tokio::test]
    async fn test_save_articles_unknown_feed_creates_nothing() {
        let (db, _feed_id) = test_db().await;
        let count = db.save_articles(999, &[test_article("a")]).await.unwrap();
        assert_eq!(count, 0);
        // Bookmark insert rolled back along with the failing history insert
        assert!(db
            .get_bookmark_by_url("https://example.com/a")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_bookmark_keeps_history() {
        let (db, feed_id) = test_db().await;
        db.save_articles(feed_id, &[test_article("a")]).await.unwrap();
        let bookmark = db
            .get_bookmark_by_url("https://example.com/a")
            .await
            .unwrap()
            .unwrap();

        assert!(db.delete_bookmark(bookmark.id).await.unwrap());
        assert!(db.list_bookmarks(10).await.unwrap().is_empty());
        assert_eq!(db.get_feed_history(feed_id).await.unwrap().len(), 1);
    }
}
