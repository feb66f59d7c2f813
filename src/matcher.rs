//! Deduplication heuristic for related-article suggestions.
//!
//! Decides whether a suggested article is "the same as" an existing one.
//! False negatives only cost an extra stub article; false positives wire
//! an unrelated existing article into the relation, which is the costlier
//! failure mode — hence the category/taxonomy co-match required at the
//! high similarity threshold.

use std::collections::HashSet;

use crate::models::{ArticleSummary, NewSuggestion};

const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;
const TAG_MATCH_SIMILARITY_THRESHOLD: f64 = 0.7;
const MIN_SHARED_TAGS: usize = 3;

/// Symmetric similarity ratio between two titles, case-insensitive:
/// 1.0 for identical strings, 0.0 for fully disjoint ones.
///
/// Bigram-based (Sørensen–Dice), so word order carries little weight and
/// reordered titles still score high, matching how a sequence-ratio
/// comparison treats them.
pub fn compute_similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&a.to_lowercase(), &b.to_lowercase())
}

/// Find an existing article the candidate duplicates, if any.
///
/// Evaluated per existing article in the caller-supplied order, first
/// match wins:
/// 1. case-insensitive exact title equality;
/// 2. title similarity above the high threshold AND matching category
///    AND matching taxonomy;
/// 3. at least three shared tags AND title similarity above the lower
///    threshold.
pub fn find_similar(candidate: &NewSuggestion, existing: &[ArticleSummary]) -> Option<i64> {
    let candidate_tags: HashSet<&str> = candidate.tags.iter().map(String::as_str).collect();

    for article in existing {
        if candidate.title.to_lowercase() == article.title.to_lowercase() {
            return Some(article.id);
        }

        if compute_similarity(&candidate.title, &article.title) > TITLE_SIMILARITY_THRESHOLD
            && candidate.category == article.category
            && candidate.taxonomy == article.taxonomy
        {
            return Some(article.id);
        }

        let shared_tags = article
            .tags
            .iter()
            .filter(|t| candidate_tags.contains(t.as_str()))
            .count();
        if shared_tags >= MIN_SHARED_TAGS
            && compute_similarity(&candidate.title, &article.title) > TAG_MATCH_SIMILARITY_THRESHOLD
        {
            return Some(article.id);
        }
    }

    None
}
