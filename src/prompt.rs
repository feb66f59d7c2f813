//! Prompt templates for the two generation stages.
//!
//! Pure formatting: no network or storage access. Word limits and audience
//! descriptions are selected per difficulty level, and the article prompt
//! embeds the existing-articles snapshot verbatim as JSON so the writer
//! model can reference rows by id.

use crate::models::{Article, ArticleSummary, Level};

/// Number of related-article suggestions the writer must return.
/// Fixed by the prompt contract; the parser enforces it.
pub const RELATED_ARTICLE_COUNT: usize = 5;

pub fn research_word_limit(level: Level) -> u32 {
    match level {
        Level::Basic => 400,
        Level::Intermediate => 800,
        Level::Advanced => 1200,
    }
}

pub fn article_word_limit(level: Level) -> u32 {
    match level {
        Level::Basic => 250,
        Level::Intermediate => 500,
        Level::Advanced => 750,
    }
}

pub fn level_description(level: Level) -> &'static str {
    match level {
        Level::Basic => "junior developers or those new to this topic",
        Level::Intermediate => "developers with 2-4 years of experience",
        Level::Advanced => "senior developers with 5+ years of experience",
    }
}

/// Render the research-stage prompt from an article's descriptive
/// attributes.
pub fn render_research_prompt(article: &Article) -> String {
    format!(
        r#"You are helping prepare a research document for a technical interview preparation article.

Context:
- Title: {title}
- Target Audience: {level_description}
- Topic Area: {taxonomy}
- Category: {category}
- Related Topics: {tags}

Guidelines:
1. Research depth should match a {level} level article
2. Focus on key technical concepts and interview relevance
3. Include practical examples and common interview questions
4. Maximum length: {word_limit} words
5. Structure the research to cover:
   - Core concepts
   - Technical details
   - Common misconceptions
   - Interview question patterns
   - Best practices

The research will be used to write an article that helps developers prepare for technical interviews. Keep the focus technical and practical.

Please provide comprehensive research that will allow us to write an informative article.
"#,
        title = article.title,
        level_description = level_description(article.level),
        taxonomy = article.taxonomy,
        category = article.category,
        tags = article.tags.join(", "),
        level = article.level,
        word_limit = research_word_limit(article.level),
    )
}

/// Render the article-stage prompt: metadata, the research document, and
/// the existing-articles snapshot, plus the marker protocol the parser
/// expects (`EXCERPT_START`/`EXCERPT_END`, markdown body,
/// `RELATED_ARTICLES_START`/`RELATED_ARTICLES_END`).
pub fn render_article_prompt(
    article: &Article,
    research_document: &str,
    existing: &[ArticleSummary],
) -> String {
    // Pretty-printed JSON so ids survive verbatim into the model context.
    let existing_articles = serde_json::to_string_pretty(existing)
        .unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are writing a technical article for a programming interview preparation website.

Context:
- Title: {title}
- Target Audience: {level_description}
- Topic Area: {taxonomy}
- Category: {category}
- Tags: {tags}
- Word Limit: {word_limit} words

Existing Articles in our database:
{existing_articles}

Research Document:
{research_document}

Requirements:
1. Write the article in Markdown format
2. Keep the content technical and precise
3. Include code examples where relevant
4. Focus on interview preparation
5. Use a professional but engaging tone
6. Include interview-specific tips
7. Stay within the word limit

Response format (follow it exactly):
1. A short excerpt of at most 80 words between the literal markers EXCERPT_START and EXCERPT_END.
2. The article body in Markdown, with no extra delimiters.
3. The literal marker RELATED_ARTICLES_START, then a JSON object, then the literal marker RELATED_ARTICLES_END.

The JSON object must contain:
- "articles": an array of exactly {related_count} suggested related articles we should create next, each with:
  - title: string
  - taxonomy: string (same options as the current article)
  - category: string
  - level: one of [basic, intermediate, advanced]
  - tags: array of strings
  - excerpt: string of at most 80 words
- "existing_articles_map": an object mapping the index of a suggestion (as a string, e.g. "0") to the id of an existing article from the database above, whenever a suggestion matches or is very similar to one of them. Mapped suggestions are resolved by id and their inline fields are ignored.

Begin with the excerpt:
"#,
        title = article.title,
        level_description = level_description(article.level),
        taxonomy = article.taxonomy,
        category = article.category,
        tags = article.tags.join(", "),
        word_limit = article_word_limit(article.level),
        existing_articles = existing_articles,
        research_document = research_document,
        related_count = RELATED_ARTICLE_COUNT,
    )
}
