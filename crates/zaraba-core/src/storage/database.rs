use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;
use crate::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let db_path = config.database_path();

        // Ensure the data directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}", db_path.display());

        tracing::info!("Connecting to database: {}", db_path.display());

        // Set PRAGMAs per-connection so every pooled connection agrees.
        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Create an in-memory database for testing
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(MIGRATION_001_ARTICLES)
            .execute(&self.pool)
            .await?;

        sqlx::query(MIGRATION_002_WIRE_ARTICLES)
            .execute(&self.pool)
            .await?;

        for statement in MIGRATION_INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

const MIGRATION_001_ARTICLES: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    hash TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    body TEXT,
    summary TEXT,
    category TEXT NOT NULL,
    published_at DATETIME NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_scraped_at DATETIME NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0
)
"#;

const MIGRATION_002_WIRE_ARTICLES: &str = r#"
CREATE TABLE IF NOT EXISTS wire_articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    hash TEXT NOT NULL,
    category TEXT NOT NULL,
    published_at DATETIME NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

// The unique indexes on (url) and (hash) are the authoritative dedup guard;
// the in-process gate only narrows the race window.
const MIGRATION_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_url ON articles(url)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_hash ON articles(hash)",
    "CREATE INDEX IF NOT EXISTS idx_articles_site ON articles(site)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_wire_articles_url ON wire_articles(url)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_wire_articles_hash ON wire_articles(hash)",
    "CREATE INDEX IF NOT EXISTS idx_wire_articles_published_at ON wire_articles(published_at DESC)",
];
