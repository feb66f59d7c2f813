//! Article generation orchestration.
//!
//! Drives the full pipeline for one article: fetch-or-create the research
//! document, call the writer model, parse the marker protocol, resolve
//! each related-article suggestion against existing rows, and persist
//! everything in a single final transaction.
//!
//! Storage handle and provider clients are injected explicitly at
//! construction and scoped to this generator; there is no process-global
//! state. Two concurrent runs for the same title are an accepted race:
//! both may spend provider calls, and the last commit wins.

use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Article, ArticleSummary, NewStub, RelatedSuggestion, ResolvedRelated};
use crate::provider::{create_client, CompletionClient};
use crate::response::{parse_article_response, ParsedArticle};
use crate::slug::slugify;
use crate::{db, prompt, store};

pub struct ArticleGenerator {
    pool: SqlitePool,
    research_client: Box<dyn CompletionClient>,
    writer_client: Box<dyn CompletionClient>,
    parse_attempts: u32,
}

impl ArticleGenerator {
    pub fn new(
        pool: SqlitePool,
        research_client: Box<dyn CompletionClient>,
        writer_client: Box<dyn CompletionClient>,
        parse_attempts: u32,
    ) -> Self {
        Self {
            pool,
            research_client,
            writer_client,
            parse_attempts: parse_attempts.max(1),
        }
    }

    /// Build a generator with provider clients from config, over an
    /// existing pool.
    pub fn from_config(config: &Config, pool: SqlitePool) -> PipelineResult<Self> {
        let research_client = create_client(&config.providers.research)?;
        let writer_client = create_client(&config.providers.writer)?;
        Ok(Self::new(
            pool,
            research_client,
            writer_client,
            config.generation.parse_attempts,
        ))
    }

    /// Run the full research-and-generate workflow for the article with
    /// this title. The stub must already exist; this never creates the
    /// primary article.
    ///
    /// Returns the filled article and its resolved related articles in
    /// suggestion order.
    pub async fn generate(&self, title: &str) -> PipelineResult<(Article, Vec<Article>)> {
        match self.generate_inner(title).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(title, error = %e, "article generation failed");
                Err(e)
            }
        }
    }

    async fn generate_inner(&self, title: &str) -> PipelineResult<(Article, Vec<Article>)> {
        let article = store::find_by_title(&self.pool, title)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("article with title '{}'", title)))?;

        // Reuse an existing research document so a retry never re-spends
        // the research call.
        let research_document = match article
            .research_result
            .as_deref()
            .filter(|r| !r.trim().is_empty())
        {
            Some(existing) => {
                info!(title, "using existing research document");
                existing.to_string()
            }
            None => {
                info!(title, model = self.research_client.model_name(), "generating research document");
                let research_prompt = prompt::render_research_prompt(&article);
                let research = self.research_client.complete(&research_prompt).await?;
                // Early durability checkpoint, committed separately from
                // the final content transaction.
                store::save_research(&self.pool, article.id, &research).await?;
                research
            }
        };

        let existing = store::list_summaries(&self.pool).await?;

        let parsed = self
            .writer_stage_with_retry(&article, &research_document, &existing)
            .await?;

        let resolved = self.resolve_suggestions(parsed.suggestions, &existing).await?;

        let related_ids = store::commit_generated(
            &self.pool,
            article.id,
            &parsed.body,
            &parsed.excerpt,
            &research_document,
            &resolved,
        )
        .await?;

        let filled = store::find_by_id(&self.pool, article.id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("article id {}", article.id)))?;

        let mut related = Vec::with_capacity(related_ids.len());
        for id in related_ids {
            let related_article = store::find_by_id(&self.pool, id)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("article id {}", id)))?;
            related.push(related_article);
        }

        info!(
            title,
            related = related.len(),
            "article generated successfully"
        );
        Ok((filled, related))
    }

    /// Call the writer model and parse its response, retrying malformed
    /// completions a bounded number of times with increasing delay.
    /// Provider and storage errors propagate immediately.
    async fn writer_stage_with_retry(
        &self,
        article: &Article,
        research_document: &str,
        existing: &[ArticleSummary],
    ) -> PipelineResult<ParsedArticle> {
        let article_prompt = prompt::render_article_prompt(article, research_document, existing);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let completion = self.writer_client.complete(&article_prompt).await?;
            match parse_article_response(&completion) {
                Ok(parsed) => return Ok(parsed),
                Err(e) if e.is_retryable() && attempt < self.parse_attempts => {
                    warn!(
                        title = %article.title,
                        attempt,
                        error = %e,
                        "malformed completion, retrying writer stage"
                    );
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve each suggestion to an article id or a staged stub:
    /// id-references load directly; inline suggestions run through the
    /// matcher against the snapshot, falling back to a new stub.
    async fn resolve_suggestions(
        &self,
        suggestions: Vec<RelatedSuggestion>,
        existing: &[ArticleSummary],
    ) -> PipelineResult<Vec<ResolvedRelated>> {
        let mut resolved = Vec::with_capacity(suggestions.len());

        for suggestion in suggestions {
            match suggestion {
                RelatedSuggestion::Existing { id } => {
                    store::find_by_id(&self.pool, id).await?.ok_or_else(|| {
                        PipelineError::NotFound(format!("article id {} referenced by suggestion", id))
                    })?;
                    resolved.push(ResolvedRelated::Existing(id));
                }
                RelatedSuggestion::New(suggestion) => {
                    match crate::matcher::find_similar(&suggestion, existing) {
                        Some(id) => {
                            info!(
                                suggested = %suggestion.title,
                                matched_id = id,
                                "found similar existing article"
                            );
                            resolved.push(ResolvedRelated::Existing(id));
                        }
                        None => {
                            resolved.push(ResolvedRelated::Stub(NewStub {
                                slug: slugify(&suggestion.title),
                                title: suggestion.title,
                                level: suggestion.level,
                                taxonomy: suggestion.taxonomy,
                                category: suggestion.category,
                                tags: suggestion.tags,
                                excerpt: Some(suggestion.excerpt),
                            }));
                        }
                    }
                }
            }
        }

        Ok(resolved)
    }
}

/// CLI entry point: generate one article synchronously and print a
/// summary.
pub async fn run_generate(config: &Config, title: &str) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let generator = ArticleGenerator::from_config(config, pool.clone())?;

    let (article, related) = generator.generate(title).await?;

    println!("generated '{}'", article.title);
    println!("  slug: {}", article.slug);
    println!(
        "  words: {}",
        article
            .content
            .as_deref()
            .map(|c| c.split_whitespace().count())
            .unwrap_or(0)
    );
    println!("  related articles:");
    for r in &related {
        let state = if r.is_generated { "generated" } else { "stub" };
        println!("    #{} {} ({})", r.id, r.title, state);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}
