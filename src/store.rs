//! Article storage over SQLite.
//!
//! All reads and writes for article rows and the `article_relationships`
//! join table live here: lookups by title/id/slug, stub insertion, the
//! early research checkpoint, the transactional content-plus-relations
//! commit, generation status tracking, and the bulk recompute passes for
//! word counts and relevance scores.
//!
//! Slug uniqueness is enforced by the schema; violations surface to the
//! caller as [`PipelineError::Db`], untranslated.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Article, ArticleSummary, Level, NewStub, ResolvedRelated};

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn encode_tags(tags: &[String]) -> String {
    // Serializing a Vec<String> cannot fail.
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

fn decode_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn decode_err(msg: String) -> PipelineError {
    PipelineError::Db(sqlx::Error::Decode(msg.into()))
}

fn article_from_row(row: &SqliteRow) -> PipelineResult<Article> {
    let level_raw: String = row.try_get("level").map_err(PipelineError::Db)?;
    let level = Level::parse(&level_raw)
        .ok_or_else(|| decode_err(format!("unrecognized level in article row: '{}'", level_raw)))?;
    let tags_raw: String = row.try_get("tags").map_err(PipelineError::Db)?;

    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        level,
        taxonomy: row.try_get("taxonomy")?,
        category: row.try_get("category")?,
        tags: decode_tags(&tags_raw),
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        word_count: row.try_get("word_count")?,
        relevance_score: row.try_get("relevance_score")?,
        research_result: row.try_get("research_result")?,
        is_generated: row.try_get::<i64, _>("is_generated")? != 0,
        generation_started_at: row.try_get("generation_started_at")?,
        last_generation_error: row.try_get("last_generation_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const ARTICLE_COLUMNS: &str = "id, title, slug, level, taxonomy, category, tags, content, excerpt, \
     word_count, relevance_score, research_result, is_generated, generation_started_at, \
     last_generation_error, created_at, updated_at";

pub async fn count_articles(pool: &SqlitePool) -> PipelineResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn find_by_title(pool: &SqlitePool, title: &str) -> PipelineResult<Option<Article>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM articles WHERE title = ?",
        ARTICLE_COLUMNS
    ))
    .bind(title)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(article_from_row).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> PipelineResult<Option<Article>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM articles WHERE id = ?",
        ARTICLE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(article_from_row).transpose()
}

pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> PipelineResult<Option<Article>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM articles WHERE slug = ?",
        ARTICLE_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(article_from_row).transpose()
}

/// Insert a metadata-only stub article. Returns the new row id.
///
/// Takes a generic executor so it can run standalone or inside the
/// orchestrator's final transaction.
pub async fn insert_stub<'e>(
    exec: impl sqlx::Executor<'e, Database = sqlx::Sqlite>,
    stub: &NewStub,
) -> PipelineResult<i64> {
    let now = now_ts();
    let result = sqlx::query(
        r#"
        INSERT INTO articles (title, slug, level, taxonomy, category, tags, excerpt, is_generated, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&stub.title)
    .bind(&stub.slug)
    .bind(stub.level.as_str())
    .bind(&stub.taxonomy)
    .bind(&stub.category)
    .bind(encode_tags(&stub.tags))
    .bind(&stub.excerpt)
    .bind(now)
    .bind(now)
    .execute(exec)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Persist the research document immediately after the research stage.
///
/// This is the one intentional early durability checkpoint: it commits
/// separately so a later failure in the writer stage does not re-spend
/// the research call on retry.
pub async fn save_research(pool: &SqlitePool, id: i64, research: &str) -> PipelineResult<()> {
    sqlx::query("UPDATE articles SET research_result = ?, updated_at = ? WHERE id = ?")
        .bind(research)
        .bind(now_ts())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Snapshot all articles as compact summary records, in id order.
pub async fn list_summaries(pool: &SqlitePool) -> PipelineResult<Vec<ArticleSummary>> {
    let rows = sqlx::query("SELECT id, title, taxonomy, category, level, tags FROM articles ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        let level_raw: String = row.try_get("level")?;
        let level = Level::parse(&level_raw).ok_or_else(|| {
            decode_err(format!("unrecognized level in article row: '{}'", level_raw))
        })?;
        let tags_raw: String = row.try_get("tags")?;
        summaries.push(ArticleSummary {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            taxonomy: row.try_get("taxonomy")?,
            category: row.try_get("category")?,
            level,
            tags: decode_tags(&tags_raw),
        });
    }
    Ok(summaries)
}

/// Load the related articles of `id` (the `article_id` side of the join).
pub async fn related_articles(pool: &SqlitePool, id: i64) -> PipelineResult<Vec<Article>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM articles a
        JOIN article_relationships r ON r.related_article_id = a.id
        WHERE r.article_id = ?
        ORDER BY a.id
        "#,
        ARTICLE_COLUMNS
            .split(", ")
            .map(|c| format!("a.{}", c))
            .collect::<Vec<_>>()
            .join(", ")
    ))
    .bind(id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(article_from_row).collect()
}

/// Commit a finished generation run in a single transaction: insert staged
/// stubs, fill the target article's content fields, set `is_generated`,
/// and replace its outgoing relationship rows with the resolved list.
///
/// Returns the related article ids in suggestion order.
pub async fn commit_generated(
    pool: &SqlitePool,
    target_id: i64,
    content: &str,
    excerpt: &str,
    research: &str,
    resolved: &[ResolvedRelated],
) -> PipelineResult<Vec<i64>> {
    let mut tx = pool.begin().await?;

    let mut related_ids = Vec::with_capacity(resolved.len());
    for item in resolved {
        match item {
            ResolvedRelated::Existing(id) => related_ids.push(*id),
            ResolvedRelated::Stub(stub) => {
                let id = insert_stub(&mut *tx, stub).await?;
                related_ids.push(id);
            }
        }
    }

    sqlx::query(
        r#"
        UPDATE articles
        SET content = ?, excerpt = ?, research_result = ?, is_generated = 1, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(content)
    .bind(excerpt)
    .bind(research)
    .bind(now_ts())
    .bind(target_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM article_relationships WHERE article_id = ?")
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

    for related_id in &related_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO article_relationships (article_id, related_article_id) VALUES (?, ?)",
        )
        .bind(target_id)
        .bind(related_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(related_ids)
}

// ============ Generation status tracking ============
//
// Helpers for the implicit status record on each row:
//   not started -> in progress -> complete | failed
// The orchestrator does not call these itself; callers that want status
// visibility (the background worker, the populate loop) call them around
// a generation run.

pub async fn mark_generation_started(pool: &SqlitePool, id: i64) -> PipelineResult<()> {
    sqlx::query(
        "UPDATE articles SET generation_started_at = ?, last_generation_error = NULL WHERE id = ?",
    )
    .bind(now_ts())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_generation_complete(pool: &SqlitePool, id: i64) -> PipelineResult<()> {
    sqlx::query(
        "UPDATE articles SET is_generated = 1, generation_started_at = NULL, last_generation_error = NULL WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_generation_failed(pool: &SqlitePool, id: i64, error: &str) -> PipelineResult<()> {
    sqlx::query(
        "UPDATE articles SET is_generated = 0, generation_started_at = NULL, last_generation_error = ? WHERE id = ?",
    )
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Titles of all articles still awaiting generation, in id order.
pub async fn pending_titles(pool: &SqlitePool) -> PipelineResult<Vec<String>> {
    let titles: Vec<String> =
        sqlx::query_scalar("SELECT title FROM articles WHERE is_generated = 0 ORDER BY id")
            .fetch_all(pool)
            .await?;
    Ok(titles)
}

// ============ Derived metrics ============

/// Recompute `word_count` for every article that has content. Word count
/// is whitespace-split; it is not kept in sync on content mutation and is
/// only trustworthy right after this pass. Returns rows updated.
pub async fn update_word_counts(pool: &SqlitePool) -> PipelineResult<u64> {
    let rows = sqlx::query("SELECT id, content FROM articles WHERE content IS NOT NULL")
        .fetch_all(pool)
        .await?;

    let mut updated = 0u64;
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let content: String = row.try_get("content")?;
        let word_count = content.split_whitespace().count() as i64;
        sqlx::query("UPDATE articles SET word_count = ? WHERE id = ?")
            .bind(word_count)
            .bind(id)
            .execute(pool)
            .await?;
        updated += 1;
    }
    Ok(updated)
}

/// Compute the relevance score for one article from current database
/// state. Deterministic for a fixed state.
///
/// The level weighting (basic=0.0, advanced=1.0, intermediate=2.0) is
/// non-monotonic with difficulty and preserved as observed in production
/// data; see DESIGN.md.
pub async fn relevance_score(pool: &SqlitePool, article: &Article) -> PipelineResult<f64> {
    let taxonomy_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE taxonomy = ?")
        .bind(&article.taxonomy)
        .fetch_one(pool)
        .await?;

    let linkback_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM article_relationships WHERE related_article_id = ?",
    )
    .bind(article.id)
    .fetch_one(pool)
    .await?;

    let mut score = 0.0;
    score += taxonomy_count as f64 * if article.is_generated { 2.0 } else { 0.5 };
    score += linkback_count as f64;
    score += if article.is_generated { 1.0 } else { 0.0 };
    score += article.tags.len() as f64;
    score += match article.level {
        Level::Basic => 0.0,
        Level::Intermediate => 2.0,
        Level::Advanced => 1.0,
    };

    Ok(score)
}

/// Recompute and persist `relevance_score` for every article.
/// Returns rows updated.
pub async fn update_relevance_scores(pool: &SqlitePool) -> PipelineResult<u64> {
    let rows = sqlx::query(&format!("SELECT {} FROM articles ORDER BY id", ARTICLE_COLUMNS))
        .fetch_all(pool)
        .await?;

    let mut updated = 0u64;
    for row in &rows {
        let article = article_from_row(row)?;
        let score = relevance_score(pool, &article).await?;
        sqlx::query("UPDATE articles SET relevance_score = ? WHERE id = ?")
            .bind(score)
            .bind(article.id)
            .execute(pool)
            .await?;
        updated += 1;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        pool
    }

    fn stub(title: &str, slug: &str) -> NewStub {
        NewStub {
            title: title.to_string(),
            slug: slug.to_string(),
            level: Level::Basic,
            taxonomy: "Data Structures".to_string(),
            category: "Trees".to_string(),
            tags: vec!["trees".to_string(), "bst".to_string()],
            excerpt: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let pool = test_pool().await;
        let id = insert_stub(&pool, &stub("Binary Search Trees", "binary-search-trees"))
            .await
            .unwrap();

        let by_title = find_by_title(&pool, "Binary Search Trees")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_title.id, id);
        assert_eq!(by_title.level, Level::Basic);
        assert_eq!(by_title.tags, vec!["trees", "bst"]);
        assert!(by_title.needs_generation());

        let by_slug = find_by_slug(&pool, "binary-search-trees")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_slug.id, id);
        assert!(find_by_title(&pool, "Nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_constraint_error() {
        let pool = test_pool().await;
        insert_stub(&pool, &stub("Binary Search Trees", "binary-search-trees"))
            .await
            .unwrap();
        let err = insert_stub(&pool, &stub("Binary search trees!", "binary-search-trees"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Db(_)));
    }

    #[tokio::test]
    async fn test_research_checkpoint() {
        let pool = test_pool().await;
        let id = insert_stub(&pool, &stub("Heaps", "heaps")).await.unwrap();
        save_research(&pool, id, "research notes").await.unwrap();

        let article = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(article.research_result.as_deref(), Some("research notes"));
        // Research alone does not mark the article generated.
        assert!(article.needs_generation());
    }

    #[tokio::test]
    async fn test_commit_generated_replaces_relations() {
        let pool = test_pool().await;
        let target = insert_stub(&pool, &stub("Heaps", "heaps")).await.unwrap();
        let old_related = insert_stub(&pool, &stub("Old Link", "old-link")).await.unwrap();
        sqlx::query("INSERT INTO article_relationships (article_id, related_article_id) VALUES (?, ?)")
            .bind(target)
            .bind(old_related)
            .execute(&pool)
            .await
            .unwrap();

        let resolved = vec![
            ResolvedRelated::Stub(stub("Priority Queues", "priority-queues")),
            ResolvedRelated::Existing(old_related),
        ];
        let related_ids = commit_generated(&pool, target, "body", "excerpt", "research", &resolved)
            .await
            .unwrap();
        assert_eq!(related_ids.len(), 2);

        let article = find_by_id(&pool, target).await.unwrap().unwrap();
        assert_eq!(article.content.as_deref(), Some("body"));
        assert_eq!(article.excerpt.as_deref(), Some("excerpt"));
        assert!(article.is_generated);
        assert!(!article.needs_generation());

        let related = related_articles(&pool, target).await.unwrap();
        let ids: Vec<i64> = related.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&old_related));
        assert!(ids.contains(&related_ids[0]));
    }

    #[tokio::test]
    async fn test_status_tracking() {
        let pool = test_pool().await;
        let id = insert_stub(&pool, &stub("Heaps", "heaps")).await.unwrap();

        mark_generation_started(&pool, id).await.unwrap();
        let article = find_by_id(&pool, id).await.unwrap().unwrap();
        assert!(article.generation_started_at.is_some());
        assert!(article.last_generation_error.is_none());

        mark_generation_failed(&pool, id, "provider request failed")
            .await
            .unwrap();
        let article = find_by_id(&pool, id).await.unwrap().unwrap();
        assert!(article.generation_started_at.is_none());
        assert_eq!(
            article.last_generation_error.as_deref(),
            Some("provider request failed")
        );
        assert!(!article.is_generated);

        mark_generation_complete(&pool, id).await.unwrap();
        let article = find_by_id(&pool, id).await.unwrap().unwrap();
        assert!(article.is_generated);
        assert!(article.last_generation_error.is_none());
    }

    #[tokio::test]
    async fn test_word_count_recompute() {
        let pool = test_pool().await;
        let id = insert_stub(&pool, &stub("Heaps", "heaps")).await.unwrap();
        commit_generated(&pool, id, "one two  three\nfour", "e", "r", &[])
            .await
            .unwrap();

        let updated = update_word_counts(&pool).await.unwrap();
        assert_eq!(updated, 1);
        let article = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(article.word_count, 4);
    }

    #[tokio::test]
    async fn test_relevance_score_deterministic() {
        let pool = test_pool().await;
        let a = insert_stub(&pool, &stub("Heaps", "heaps")).await.unwrap();
        let b = insert_stub(&pool, &stub("Tries", "tries")).await.unwrap();
        sqlx::query("INSERT INTO article_relationships (article_id, related_article_id) VALUES (?, ?)")
            .bind(b)
            .bind(a)
            .execute(&pool)
            .await
            .unwrap();

        let article = find_by_id(&pool, a).await.unwrap().unwrap();
        let first = relevance_score(&pool, &article).await.unwrap();
        let second = relevance_score(&pool, &article).await.unwrap();
        assert_eq!(first, second);

        // 2 articles in taxonomy * 0.5 + 1 linkback + 0 generated + 2 tags + 0 level
        assert_eq!(first, 4.0);
    }

    #[tokio::test]
    async fn test_relevance_level_weighting_preserved() {
        let pool = test_pool().await;
        let mut intermediate = stub("Graphs", "graphs");
        intermediate.level = Level::Intermediate;
        let mut advanced = stub("B-Trees", "b-trees");
        advanced.level = Level::Advanced;
        advanced.taxonomy = "Storage".to_string();

        let i = insert_stub(&pool, &intermediate).await.unwrap();
        let a = insert_stub(&pool, &advanced).await.unwrap();

        let i_article = find_by_id(&pool, i).await.unwrap().unwrap();
        let a_article = find_by_id(&pool, a).await.unwrap().unwrap();

        // intermediate carries the 2.0 bonus, advanced only 1.0
        let i_score = relevance_score(&pool, &i_article).await.unwrap();
        let a_score = relevance_score(&pool, &a_article).await.unwrap();
        assert_eq!(i_score - a_score, 1.0);
    }
}
