//! Batch maintenance commands for derived metrics.

use anyhow::Result;

use crate::config::Config;
use crate::{db, store};

/// Recompute `word_count` for every article with content.
pub async fn run_update_word_counts(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let updated = store::update_word_counts(&pool).await?;
    println!("updated word counts for {} articles", updated);
    pool.close().await;
    Ok(())
}

/// Recompute `relevance_score` for every article.
pub async fn run_update_relevance_scores(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let updated = store::update_relevance_scores(&pool).await?;
    println!("updated relevance scores for {} articles", updated);
    pool.close().await;
    Ok(())
}
