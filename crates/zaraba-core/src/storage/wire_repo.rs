use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::models::{NewWireArticle, WireArticle};
use super::Database;
use crate::Result;

/// Repository for the wire-news table
pub struct WireRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct WireRow {
    id: i64,
    title: String,
    url: String,
    hash: String,
    category: String,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<WireRow> for WireArticle {
    fn from(row: WireRow) -> Self {
        WireArticle {
            id: row.id,
            title: row.title,
            url: row.url,
            hash: row.hash,
            category: row.category,
            published_at: row.published_at,
            created_at: row.created_at,
        }
    }
}

const WIRE_COLUMNS: &str = "id, title, url, hash, category, published_at, created_at";

impl<'a> WireRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, new_article: &NewWireArticle) -> Result<WireArticle> {
        let result = sqlx::query(
            r#"
            INSERT INTO wire_articles (title, url, hash, category, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_article.title)
        .bind(&new_article.url)
        .bind(&new_article.hash)
        .bind(&new_article.category)
        .bind(new_article.published_at)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id)
            .await?
            .ok_or(crate::Error::Database(sqlx::Error::RowNotFound))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<WireArticle>> {
        let row: Option<WireRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wire_articles WHERE id = ?",
            WIRE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(WireArticle::from))
    }

    pub async fn find_by_identity(&self, url: &str, hash: &str) -> Result<Option<WireArticle>> {
        let row: Option<WireRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wire_articles WHERE url = ? OR hash = ? LIMIT 1",
            WIRE_COLUMNS
        ))
        .bind(url)
        .bind(hash)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(WireArticle::from))
    }

    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wire_articles")
            .fetch_one(self.db.pool())
            .await?;

        Ok(row.0)
    }
}
