use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an open pool. Idempotent; also used by tests
/// against in-memory databases.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Articles table. Tags are stored as a JSON array of short strings.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            level TEXT NOT NULL,
            taxonomy TEXT NOT NULL,
            category TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            content TEXT,
            excerpt TEXT,
            word_count INTEGER NOT NULL DEFAULT 0,
            relevance_score REAL NOT NULL DEFAULT 0.0,
            research_result TEXT,
            is_generated INTEGER NOT NULL DEFAULT 0,
            generation_started_at INTEGER,
            last_generation_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Directed many-to-many self-relation. The composite key is the only
    // uniqueness guard; nothing prevents an article from relating to itself.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_relationships (
            article_id INTEGER NOT NULL,
            related_article_id INTEGER NOT NULL,
            PRIMARY KEY (article_id, related_article_id),
            FOREIGN KEY (article_id) REFERENCES articles(id),
            FOREIGN KEY (related_article_id) REFERENCES articles(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_title ON articles(title)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_taxonomy ON articles(taxonomy)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_is_generated ON articles(is_generated)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_relationships_related ON article_relationships(related_article_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
