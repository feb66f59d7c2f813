//! Core data models for articles and generation.
//!
//! These types represent the persisted article rows, the snapshot records
//! handed to the writer model, and the suggestion records parsed back out
//! of its response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Difficulty level of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Basic,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Basic => "basic",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }

    /// Parse a level string as produced by the writer model or stored in
    /// the database. Returns `None` for unrecognized values.
    pub fn parse(s: &str) -> Option<Level> {
        match s {
            "basic" => Some(Level::Basic),
            "intermediate" => Some(Level::Intermediate),
            "advanced" => Some(Level::Advanced),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted article row.
///
/// Content fields (`content`, `excerpt`, `research_result`) are absent on
/// stub articles and filled in by the generation pipeline. `word_count`
/// and `relevance_score` are derived metrics, only trustworthy right
/// after an explicit recompute.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub level: Level,
    pub taxonomy: String,
    pub category: String,
    pub tags: Vec<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub word_count: i64,
    pub relevance_score: f64,
    pub research_result: Option<String>,
    pub is_generated: bool,
    pub generation_started_at: Option<i64>,
    pub last_generation_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// How long a generation run may hold the in-progress marker. A marker
/// older than this is treated as the leftover of a crashed process and no
/// longer blocks re-triggering.
pub const GENERATION_STALE_SECS: i64 = 600;

impl Article {
    /// An article needs (re)generation when content is missing OR the
    /// generated flag is false. Both conditions are checked independently:
    /// stale content with the flag cleared still qualifies.
    pub fn needs_generation(&self) -> bool {
        self.content.is_none() || !self.is_generated
    }

    /// Whether a generation run is currently believed to be in flight.
    /// `now` is a unix timestamp; markers older than
    /// [`GENERATION_STALE_SECS`] do not count.
    pub fn generation_in_progress(&self, now: i64) -> bool {
        self.generation_started_at
            .is_some_and(|started| now - started < GENERATION_STALE_SECS)
    }
}

/// Compact snapshot record of an existing article, embedded into the
/// writer prompt so the model can reference rows by id.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub taxonomy: String,
    pub category: String,
    pub level: Level,
    pub tags: Vec<String>,
}

/// Metadata for a stub article about to be inserted.
#[derive(Debug, Clone)]
pub struct NewStub {
    pub title: String,
    pub slug: String,
    pub level: Level,
    pub taxonomy: String,
    pub category: String,
    pub tags: Vec<String>,
    pub excerpt: Option<String>,
}

/// Full metadata for a suggested new article, as returned by the writer
/// model for suggestions not mapped to an existing row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSuggestion {
    pub title: String,
    pub taxonomy: String,
    pub category: String,
    pub level: Level,
    pub tags: Vec<String>,
    pub excerpt: String,
}

/// A related-article suggestion parsed from the writer response: either
/// a reference to an existing article id, or full metadata for a new stub.
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedSuggestion {
    Existing { id: i64 },
    New(NewSuggestion),
}

/// A suggestion resolved against the database, ready to persist.
#[derive(Debug, Clone)]
pub enum ResolvedRelated {
    /// Reuse an existing article row.
    Existing(i64),
    /// Insert this stub and relate to it.
    Stub(NewStub),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(content: Option<&str>, is_generated: bool, started: Option<i64>) -> Article {
        Article {
            id: 1,
            title: "Heaps".to_string(),
            slug: "heaps".to_string(),
            level: Level::Basic,
            taxonomy: "Data Structures".to_string(),
            category: "Trees".to_string(),
            tags: vec![],
            content: content.map(str::to_string),
            excerpt: None,
            word_count: 0,
            relevance_score: 0.0,
            research_result: None,
            is_generated,
            generation_started_at: started,
            last_generation_error: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_needs_generation_checks_both_conditions() {
        assert!(article(None, false, None).needs_generation());
        assert!(article(None, true, None).needs_generation());
        assert!(article(Some("body"), false, None).needs_generation());
        assert!(!article(Some("body"), true, None).needs_generation());
    }

    #[test]
    fn test_fresh_marker_counts_as_in_progress() {
        let a = article(None, false, Some(1_000));
        assert!(a.generation_in_progress(1_000));
        assert!(a.generation_in_progress(1_000 + GENERATION_STALE_SECS - 1));
    }

    #[test]
    fn test_old_marker_goes_stale() {
        let a = article(None, false, Some(1_000));
        assert!(!a.generation_in_progress(1_000 + GENERATION_STALE_SECS));

        let never_started = article(None, false, None);
        assert!(!never_started.generation_in_progress(1_000));
    }
}
