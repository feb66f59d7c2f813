//! Initial database population.
//!
//! Seeds the curated starter articles as stubs, then walks the articles
//! pending at the start of the run through the generation pipeline. Stubs
//! created along the way are left for the next run, and generation
//! failures for individual articles are logged and skipped, so one bad
//! completion does not abort the whole run; the next populate picks up
//! where this one left off.

use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineResult;
use crate::generator::ArticleGenerator;
use crate::models::{Level, NewStub};
use crate::slug::slugify;
use crate::{db, store};

struct SeedArticle {
    title: &'static str,
    taxonomy: &'static str,
    category: &'static str,
    level: Level,
    tags: &'static [&'static str],
}

/// Curated starter set for a fresh database.
const INITIAL_ARTICLES: &[SeedArticle] = &[
    SeedArticle {
        title: "Big-O Notation",
        taxonomy: "Algorithms",
        category: "Fundamentals",
        level: Level::Basic,
        tags: &["complexity", "performance", "fundamentals"],
    },
    SeedArticle {
        title: "Arrays and Dynamic Arrays",
        taxonomy: "Data Structures",
        category: "Linear Structures",
        level: Level::Basic,
        tags: &["arrays", "memory", "fundamentals"],
    },
    SeedArticle {
        title: "Linked Lists",
        taxonomy: "Data Structures",
        category: "Linear Structures",
        level: Level::Basic,
        tags: &["linked-lists", "pointers", "fundamentals"],
    },
    SeedArticle {
        title: "Hash Tables",
        taxonomy: "Data Structures",
        category: "Maps",
        level: Level::Basic,
        tags: &["hashing", "maps", "collisions"],
    },
    SeedArticle {
        title: "Binary Search Trees",
        taxonomy: "Data Structures",
        category: "Trees",
        level: Level::Intermediate,
        tags: &["trees", "bst", "search"],
    },
    SeedArticle {
        title: "Graph Traversal",
        taxonomy: "Algorithms",
        category: "Graphs",
        level: Level::Intermediate,
        tags: &["graphs", "bfs", "dfs"],
    },
    SeedArticle {
        title: "Sorting Algorithms",
        taxonomy: "Algorithms",
        category: "Sorting",
        level: Level::Intermediate,
        tags: &["sorting", "quicksort", "mergesort"],
    },
    SeedArticle {
        title: "Dynamic Programming",
        taxonomy: "Algorithms",
        category: "Optimization",
        level: Level::Advanced,
        tags: &["dp", "memoization", "optimization"],
    },
    SeedArticle {
        title: "Concurrency and Threads",
        taxonomy: "Systems",
        category: "Concurrency",
        level: Level::Advanced,
        tags: &["threads", "locks", "race-conditions"],
    },
    SeedArticle {
        title: "Database Indexing",
        taxonomy: "Systems",
        category: "Databases",
        level: Level::Intermediate,
        tags: &["databases", "indexes", "b-trees"],
    },
    SeedArticle {
        title: "REST API Design",
        taxonomy: "System Design",
        category: "APIs",
        level: Level::Intermediate,
        tags: &["rest", "http", "api-design"],
    },
    SeedArticle {
        title: "Caching Strategies",
        taxonomy: "System Design",
        category: "Scalability",
        level: Level::Advanced,
        tags: &["caching", "invalidation", "scalability"],
    },
];

/// Run the populate command: seed stubs, then generate everything pending.
///
/// A non-empty database is left untouched unless `force` is set; `force`
/// re-runs both phases but never duplicates titles that already exist.
pub async fn run_populate(config: &Config, force: bool) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;

    let existing = store::count_articles(&pool).await?;
    if existing > 0 && !force {
        println!(
            "database already contains {} articles; use --force to populate anyway",
            existing
        );
        pool.close().await;
        return Ok(());
    }

    // Phase 1: seed stubs, one commit for the whole batch.
    let mut seeded = 0usize;
    let mut tx = pool.begin().await?;
    for seed in INITIAL_ARTICLES {
        if store::find_by_title(&pool, seed.title).await?.is_some() {
            continue;
        }
        let stub = NewStub {
            title: seed.title.to_string(),
            slug: slugify(seed.title),
            level: seed.level,
            taxonomy: seed.taxonomy.to_string(),
            category: seed.category.to_string(),
            tags: seed.tags.iter().map(|t| t.to_string()).collect(),
            excerpt: None,
        };
        match store::insert_stub(&mut *tx, &stub).await {
            Ok(_) => seeded += 1,
            Err(e) => warn!(title = seed.title, error = %e, "failed to seed stub, skipping"),
        }
    }
    tx.commit().await?;
    println!("seeded {} new stub articles", seeded);

    // Phase 2: generate the articles that were pending when the run
    // started.
    let generator = ArticleGenerator::from_config(config, pool.clone())?;
    let pacing = Duration::from_secs(config.generation.pacing_secs);
    let (generated, failed) = generate_pending(&pool, &generator, pacing).await?;

    // Derived metrics reflect the final state of the run.
    store::update_word_counts(&pool).await?;
    store::update_relevance_scores(&pool).await?;

    println!(
        "populate finished: {} generated, {} failed, {} total articles",
        generated,
        failed,
        store::count_articles(&pool).await?
    );

    pool.close().await;
    Ok(())
}

/// Generate every article that is pending right now, sequentially.
///
/// The pending list is materialized once up front: stubs created as side
/// effects of these generations stay pending for the next run, so one
/// populate never crawls into its own output. Per-article failures mark
/// the row and continue. Returns `(generated, failed)` counts.
pub async fn generate_pending(
    pool: &SqlitePool,
    generator: &ArticleGenerator,
    pacing: Duration,
) -> PipelineResult<(usize, usize)> {
    let titles = store::pending_titles(pool).await?;

    let mut generated = 0usize;
    let mut failed = 0usize;
    for title in titles {
        let Some(article) = store::find_by_title(pool, &title).await? else {
            continue;
        };
        if !article.needs_generation() {
            continue;
        }

        info!(%title, "populating article");
        store::mark_generation_started(pool, article.id).await?;
        match generator.generate(&title).await {
            Ok((filled, related)) => {
                store::mark_generation_complete(pool, article.id).await?;
                generated += 1;
                println!("generated '{}' ({} related)", filled.title, related.len());
            }
            Err(e) => {
                store::mark_generation_failed(pool, article.id, &e.to_string()).await?;
                failed += 1;
                warn!(%title, error = %e, "generation failed, skipping article");
            }
        }

        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }

    Ok((generated, failed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_schema;
    use crate::provider::CompletionClient;
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ResearchStub;

    #[async_trait]
    impl CompletionClient for ResearchStub {
        fn model_name(&self) -> &str {
            "research-stub"
        }
        async fn complete(&self, _prompt: &str) -> PipelineResult<String> {
            Ok("research notes".to_string())
        }
    }

    // Distinct suggestion titles per call so no suggestion dedupes
    // against a stub created earlier in the same run.
    const RUN_TITLES: [[&str; 5]; 2] = [
        ["Bloom Filters", "Skip Lists", "Tries", "AVL Trees", "Red-Black Trees"],
        ["Heapsort", "Quickselect", "Radix Sort", "Topological Sort", "Union Find"],
    ];

    /// Writer stub that counts calls and emits five fresh suggestions
    /// each time.
    struct WriterStub {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionClient for WriterStub {
        fn model_name(&self) -> &str {
            "writer-stub"
        }
        async fn complete(&self, _prompt: &str) -> PipelineResult<String> {
            let run = self.calls.fetch_add(1, Ordering::SeqCst);
            let suggestions = RUN_TITLES[run.min(1)]
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    format!(
                        r#"{{"title": "{t}", "taxonomy": "Data Structures", "category": "Misc", "level": "basic", "tags": ["tag-{run}-{i}"], "excerpt": "Short."}}"#
                    )
                })
                .collect::<Vec<_>>()
                .join(",");
            Ok(format!(
                "EXCERPT_START\nE\nEXCERPT_END\nB\nRELATED_ARTICLES_START\n{{\"articles\": [{}], \"existing_articles_map\": {{}}}}\nRELATED_ARTICLES_END",
                suggestions
            ))
        }
    }

    #[tokio::test]
    async fn test_generate_pending_only_covers_initial_snapshot() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();

        for (title, slug) in [("Hash Tables", "hash-tables"), ("Linked Lists", "linked-lists")] {
            store::insert_stub(
                &pool,
                &NewStub {
                    title: title.to_string(),
                    slug: slug.to_string(),
                    level: Level::Basic,
                    taxonomy: "Data Structures".to_string(),
                    category: "Fundamentals".to_string(),
                    tags: vec![],
                    excerpt: None,
                },
            )
            .await
            .unwrap();
        }

        let writer_calls = Arc::new(AtomicUsize::new(0));
        let generator = ArticleGenerator::new(
            pool.clone(),
            Box::new(ResearchStub),
            Box::new(WriterStub {
                calls: writer_calls.clone(),
            }),
            1,
        );

        let (generated, failed) = generate_pending(&pool, &generator, Duration::ZERO)
            .await
            .unwrap();

        // Only the two articles pending at the start of the run were
        // generated; the ten stubs their suggestions created were not
        // themselves walked into.
        assert_eq!(generated, 2);
        assert_eq!(failed, 0);
        assert_eq!(writer_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store::count_articles(&pool).await.unwrap(), 12);
        assert_eq!(store::pending_titles(&pool).await.unwrap().len(), 10);

        for title in ["Hash Tables", "Linked Lists"] {
            let article = store::find_by_title(&pool, title).await.unwrap().unwrap();
            assert!(article.is_generated);
        }
    }

    #[test]
    fn test_seed_titles_are_unique() {
        let mut titles: Vec<_> = INITIAL_ARTICLES.iter().map(|s| s.title).collect();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), INITIAL_ARTICLES.len());
    }

    #[test]
    fn test_seed_slugs_are_unique_and_well_formed() {
        let mut slugs: Vec<_> = INITIAL_ARTICLES.iter().map(|s| slugify(s.title)).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), INITIAL_ARTICLES.len());
        for slug in &slugs {
            assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
