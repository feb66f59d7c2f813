//! Database statistics and health overview.
//!
//! Provides a quick summary of database contents: article counts,
//! generation coverage, relationship counts, and a per-taxonomy
//! breakdown. Used by `wiki stats` to give confidence that populate runs
//! and background generation are working as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Per-taxonomy breakdown of article and generation counts.
struct TaxonomyStats {
    taxonomy: String,
    article_count: i64,
    generated_count: i64,
    last_updated_ts: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_articles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(&pool)
        .await?;

    let total_generated: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE is_generated = 1")
            .fetch_one(&pool)
            .await?;

    let total_relations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article_relationships")
        .fetch_one(&pool)
        .await?;

    let failed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM articles WHERE last_generation_error IS NOT NULL",
    )
    .fetch_one(&pool)
    .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("WikiForge — Database Stats");
    println!("==========================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Articles:      {}", total_articles);
    println!(
        "  Generated:     {} / {} ({}%)",
        total_generated,
        total_articles,
        if total_articles > 0 {
            (total_generated * 100) / total_articles
        } else {
            0
        }
    );
    println!("  Relationships: {}", total_relations);
    if failed > 0 {
        println!("  Failed:        {} (last generation attempt errored)", failed);
    }

    // Per-taxonomy breakdown
    let rows = sqlx::query(
        r#"
        SELECT
            taxonomy,
            COUNT(*) AS article_count,
            SUM(is_generated) AS generated_count,
            MAX(updated_at) AS last_updated_ts
        FROM articles
        GROUP BY taxonomy
        ORDER BY article_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let taxonomy_stats: Vec<TaxonomyStats> = rows
        .iter()
        .map(|row| TaxonomyStats {
            taxonomy: row.get("taxonomy"),
            article_count: row.get("article_count"),
            generated_count: row.get::<Option<i64>, _>("generated_count").unwrap_or(0),
            last_updated_ts: row.get("last_updated_ts"),
        })
        .collect();

    if !taxonomy_stats.is_empty() {
        println!();
        println!("  By taxonomy:");
        println!(
            "  {:<24} {:>8} {:>10}   {}",
            "TAXONOMY", "ARTICLES", "GENERATED", "LAST UPDATED"
        );
        println!("  {}", "-".repeat(64));

        for t in &taxonomy_stats {
            let updated_display = match t.last_updated_ts {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<24} {:>8} {:>10}   {}",
                t.taxonomy, t.article_count, t.generated_count, updated_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
