use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::models::{Article, NewArticle};
use super::Database;
use crate::Result;

/// Repository for article persistence and queries
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ArticleRow {
    id: i64,
    site: String,
    title: String,
    url: String,
    hash: String,
    content: String,
    body: Option<String>,
    summary: Option<String>,
    category: String,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_scraped_at: DateTime<Utc>,
    retry_count: i64,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            site: row.site,
            title: row.title,
            url: row.url,
            hash: row.hash,
            content: row.content,
            body: row.body,
            summary: row.summary,
            category: row.category,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_scraped_at: row.last_scraped_at,
            retry_count: row.retry_count,
        }
    }
}

const ARTICLE_COLUMNS: &str = "id, site, title, url, hash, content, body, summary, category, \
     published_at, created_at, updated_at, last_scraped_at, retry_count";

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a new article. A unique-constraint violation on (url) or
    /// (hash) surfaces as a database error; the dedup gate downgrades it.
    pub async fn insert(&self, new_article: &NewArticle) -> Result<Article> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO articles
            (site, title, url, hash, content, body, category, published_at,
             created_at, updated_at, last_scraped_at, retry_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&new_article.site)
        .bind(&new_article.title)
        .bind(&new_article.url)
        .bind(&new_article.hash)
        .bind(&new_article.content)
        .bind(&new_article.body)
        .bind(&new_article.category)
        .bind(new_article.published_at)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id)
            .await?
            .ok_or(crate::Error::Database(sqlx::Error::RowNotFound))
    }

    /// Find an article by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Article::from))
    }

    /// Point lookup for the dedup gate: any row matching canonical URL
    /// or identity hash.
    pub async fn find_by_identity(&self, url: &str, hash: &str) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE url = ? OR hash = ? LIMIT 1",
            ARTICLE_COLUMNS
        ))
        .bind(url)
        .bind(hash)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Article::from))
    }

    /// Articles published at or after the cutoff, newest first (digest window)
    pub async fn list_published_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE published_at >= ? ORDER BY published_at DESC",
            ARTICLE_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Articles whose body is due for a refresh: not scraped since the
    /// cutoff and with retry budget left. Articles at the retry bound are
    /// permanently ineligible.
    pub async fn list_refresh_candidates(
        &self,
        cutoff: DateTime<Utc>,
        max_retries: u32,
        limit: u32,
    ) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM articles
            WHERE last_scraped_at < ? AND retry_count < ?
            ORDER BY last_scraped_at ASC
            LIMIT ?
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(cutoff)
        .bind(max_retries as i64)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Articles with a body but no summary yet (AI job input)
    pub async fn list_unsummarized(&self, limit: u32) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM articles
            WHERE summary IS NULL AND body IS NOT NULL AND LENGTH(body) > 0
            ORDER BY created_at DESC
            LIMIT ?
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Set the article summary
    pub async fn update_summary(&self, id: i64, summary: &str) -> Result<()> {
        let now = Utc::now();

        sqlx::query("UPDATE articles SET summary = ?, updated_at = ? WHERE id = ?")
            .bind(summary)
            .bind(now)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Store a refreshed body: bumps last_scraped_at and spends one retry
    pub async fn mark_refreshed(&self, id: i64, body: &str) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE articles
            SET body = ?, last_scraped_at = ?, retry_count = retry_count + 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(body)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Record an unchanged fetch: the article leaves the staleness window
    /// without spending retry budget.
    pub async fn touch_scraped(&self, id: i64) -> Result<()> {
        let now = Utc::now();

        sqlx::query("UPDATE articles SET last_scraped_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Record a failed fetch: spends one retry, keeps the staleness clock
    pub async fn bump_retry(&self, id: i64) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE articles SET retry_count = retry_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Total row count
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(self.db.pool())
            .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_article(n: u32, published_at: DateTime<Utc>) -> NewArticle {
        NewArticle {
            site: "kabutan".to_string(),
            title: format!("記事 {}", n),
            url: format!("https://kabutan.jp/news/?b=k{:08}", n),
            hash: format!("{:064x}", n),
            content: "カテゴリ: 決算".to_string(),
            body: None,
            category: "決算".to_string(),
            published_at,
        }
    }

    #[tokio::test]
    async fn test_digest_window_query_orders_descending() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let now = Utc::now();

        repo.insert(&new_article(1, now - Duration::minutes(40))).await.unwrap();
        repo.insert(&new_article(2, now - Duration::minutes(10))).await.unwrap();
        repo.insert(&new_article(3, now - Duration::minutes(70))).await.unwrap();

        let recent = repo.list_published_since(now - Duration::hours(1)).await.unwrap();

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].title, "記事 2");
        assert_eq!(recent[1].title, "記事 1");
    }

    #[tokio::test]
    async fn test_refresh_selection_respects_retry_bound() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let now = Utc::now();

        let stale = repo.insert(&new_article(1, now)).await.unwrap();
        let exhausted = repo.insert(&new_article(2, now)).await.unwrap();

        // Age both out of the freshness window, exhaust one
        let old = now - Duration::hours(48);
        sqlx::query("UPDATE articles SET last_scraped_at = ?")
            .bind(old)
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("UPDATE articles SET retry_count = 3 WHERE id = ?")
            .bind(exhausted.id)
            .execute(db.pool())
            .await
            .unwrap();

        let cutoff = now - Duration::hours(24);
        let due = repo.list_refresh_candidates(cutoff, 3, 50).await.unwrap();

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, stale.id);
    }

    #[tokio::test]
    async fn test_fresh_articles_are_not_refresh_candidates() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let now = Utc::now();

        repo.insert(&new_article(1, now)).await.unwrap();

        let due = repo
            .list_refresh_candidates(now - Duration::hours(24), 3, 50)
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_mark_refreshed_spends_retry_and_touch_does_not() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let article = repo.insert(&new_article(1, Utc::now())).await.unwrap();

        repo.mark_refreshed(article.id, "新しい本文").await.unwrap();
        let after_refresh = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(after_refresh.retry_count, 1);
        assert_eq!(after_refresh.body.as_deref(), Some("新しい本文"));
        assert!(after_refresh.last_scraped_at >= article.last_scraped_at);

        repo.touch_scraped(article.id).await.unwrap();
        let after_touch = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(after_touch.retry_count, 1);
        assert_eq!(after_touch.body.as_deref(), Some("新しい本文"));

        repo.bump_retry(article.id).await.unwrap();
        let after_bump = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(after_bump.retry_count, 2);
    }

    #[tokio::test]
    async fn test_update_summary() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let article = repo.insert(&new_article(1, Utc::now())).await.unwrap();
        assert!(article.summary.is_none());

        repo.update_summary(article.id, "要約テキスト").await.unwrap();
        let updated = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(updated.summary.as_deref(), Some("要約テキスト"));
    }

    #[tokio::test]
    async fn test_list_unsummarized_requires_body() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let now = Utc::now();

        repo.insert(&new_article(1, now)).await.unwrap();
        let mut with_body = new_article(2, now);
        with_body.body = Some("本文あり".to_string());
        let target = repo.insert(&with_body).await.unwrap();

        let pending = repo.list_unsummarized(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, target.id);
    }
}
