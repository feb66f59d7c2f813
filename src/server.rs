//! HTTP read API with generate-on-read.
//!
//! Serves article content as JSON for the frontend. Reads never block on
//! generation: requesting an ungenerated article returns the stub
//! immediately and submits its title to a background worker that runs the
//! pipeline. Subsequent reads see the generated content once the worker
//! commits.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/articles` | List all articles (metadata only) |
//! | `GET`  | `/articles/{slug}` | Fetch one article with its related articles |
//! | `GET`  | `/taxonomies` | Distinct taxonomies with article counts |
//! | `GET`  | `/categories` | Distinct taxonomy/category pairs with counts |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no article with slug: heaps" } }
//! ```
//!
//! Error codes: `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the
//! browser frontend.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::generator::ArticleGenerator;
use crate::models::Article;
use crate::{db, store};

/// Buffered generation requests; beyond this, trigger-on-read is dropped
/// and the read still succeeds.
const TRIGGER_QUEUE_DEPTH: usize = 32;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    /// Article titles queued for background generation.
    trigger: mpsc::Sender<String>,
}

/// Start the HTTP server and its background generation worker.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let generator = ArticleGenerator::from_config(config, pool.clone())?;

    let (trigger, rx) = mpsc::channel::<String>(TRIGGER_QUEUE_DEPTH);
    tokio::spawn(generation_worker(pool.clone(), generator, rx));

    let state = AppState { pool, trigger };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/articles", get(handle_list_articles))
        .route("/articles/{slug}", get(handle_get_article))
        .route("/taxonomies", get(handle_list_taxonomies))
        .route("/categories", get(handle_list_categories))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = config.server.bind.clone();
    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Drains the trigger queue one title at a time, running the full
/// pipeline for each. Requests for articles that were generated while
/// queued are dropped on recheck.
async fn generation_worker(
    pool: SqlitePool,
    generator: ArticleGenerator,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(title) = rx.recv().await {
        let article = match store::find_by_title(&pool, &title).await {
            Ok(Some(a)) => a,
            Ok(None) => continue,
            Err(e) => {
                warn!(%title, error = %e, "trigger lookup failed");
                continue;
            }
        };
        let now = chrono::Utc::now().timestamp();
        if !article.needs_generation() || article.generation_in_progress(now) {
            continue;
        }

        info!(%title, "background generation started");
        if let Err(e) = store::mark_generation_started(&pool, article.id).await {
            warn!(%title, error = %e, "failed to mark generation started");
            continue;
        }
        match generator.generate(&title).await {
            Ok(_) => {
                let _ = store::mark_generation_complete(&pool, article.id).await;
                info!(%title, "background generation complete");
            }
            Err(e) => {
                let _ = store::mark_generation_failed(&pool, article.id, &e.to_string()).await;
                warn!(%title, error = %e, "background generation failed");
            }
        }
    }
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::NotFound(msg) => not_found(msg),
            other => internal(other.to_string()),
        }
    }
}

// ============ Response shapes ============

/// Public JSON view of an article. The research document is internal
/// pipeline state and never leaves the server.
#[derive(Serialize)]
struct ArticleView {
    id: i64,
    title: String,
    slug: String,
    level: String,
    taxonomy: String,
    category: String,
    tags: Vec<String>,
    content: Option<String>,
    excerpt: Option<String>,
    word_count: i64,
    relevance_score: f64,
    is_generated: bool,
    updated_at: i64,
}

impl From<Article> for ArticleView {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            title: a.title,
            slug: a.slug,
            level: a.level.as_str().to_string(),
            taxonomy: a.taxonomy,
            category: a.category,
            tags: a.tags,
            content: a.content,
            excerpt: a.excerpt,
            word_count: a.word_count,
            relevance_score: a.relevance_score,
            is_generated: a.is_generated,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Serialize)]
struct ArticleResponse {
    article: ArticleView,
    related: Vec<ArticleView>,
    /// True when a background generation run was queued by this request.
    generation_queued: bool,
}

#[derive(Serialize)]
struct ArticleListResponse {
    articles: Vec<ArticleView>,
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /articles ============

async fn handle_list_articles(
    State(state): State<AppState>,
) -> Result<Json<ArticleListResponse>, AppError> {
    let rows = sqlx::query(
        "SELECT id FROM articles ORDER BY relevance_score DESC, id ASC",
    )
    .fetch_all(&state.pool)
    .await
    .map_err(|e| internal(e.to_string()))?;

    let mut articles = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i64 = row.try_get("id").map_err(|e| internal(e.to_string()))?;
        if let Some(mut article) = store::find_by_id(&state.pool, id).await? {
            // Metadata listing: bodies are fetched per slug.
            article.content = None;
            articles.push(ArticleView::from(article));
        }
    }

    Ok(Json(ArticleListResponse { articles }))
}

// ============ GET /articles/{slug} ============

/// Fetch one article by slug, with its related articles.
///
/// If the article still needs generation, its title is submitted to the
/// background worker and the stub is returned as-is; the read never
/// blocks on the pipeline.
async fn handle_get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, AppError> {
    let article = store::find_by_slug(&state.pool, &slug)
        .await?
        .ok_or_else(|| not_found(format!("no article with slug: {}", slug)))?;

    let mut generation_queued = false;
    let now = chrono::Utc::now().timestamp();
    if article.needs_generation() && !article.generation_in_progress(now) {
        match state.trigger.try_send(article.title.clone()) {
            Ok(()) => generation_queued = true,
            Err(e) => warn!(%slug, error = %e, "generation queue full, trigger dropped"),
        }
    }

    let related = store::related_articles(&state.pool, article.id).await?;

    Ok(Json(ArticleResponse {
        article: ArticleView::from(article),
        related: related.into_iter().map(ArticleView::from).collect(),
        generation_queued,
    }))
}

// ============ GET /taxonomies, GET /categories ============

#[derive(Serialize)]
struct TaxonomyEntry {
    taxonomy: String,
    article_count: i64,
    category_count: i64,
}

async fn handle_list_taxonomies(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaxonomyEntry>>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT taxonomy,
               COUNT(*) AS article_count,
               COUNT(DISTINCT category) AS category_count
        FROM articles
        GROUP BY taxonomy
        ORDER BY taxonomy
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(|e| internal(e.to_string()))?;

    let entries = rows
        .iter()
        .map(|row| {
            Ok(TaxonomyEntry {
                taxonomy: row.try_get("taxonomy")?,
                article_count: row.try_get("article_count")?,
                category_count: row.try_get("category_count")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(entries))
}

#[derive(Serialize)]
struct CategoryEntry {
    taxonomy: String,
    category: String,
    article_count: i64,
    /// Distinct difficulty levels present, comma-separated.
    levels: String,
}

async fn handle_list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryEntry>>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT taxonomy, category,
               COUNT(*) AS article_count,
               GROUP_CONCAT(DISTINCT level) AS levels
        FROM articles
        GROUP BY taxonomy, category
        ORDER BY taxonomy, category
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(|e| internal(e.to_string()))?;

    let entries = rows
        .iter()
        .map(|row| {
            Ok(CategoryEntry {
                taxonomy: row.try_get("taxonomy")?,
                category: row.try_get("category")?,
                article_count: row.try_get("article_count")?,
                levels: row.try_get::<Option<String>, _>("levels")?.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(entries))
}
