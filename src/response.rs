//! Writer-response parsing: the marker/JSON protocol.
//!
//! The writer model returns three regions in fixed order:
//!
//! ```text
//! EXCERPT_START <excerpt> EXCERPT_END
//! <markdown article body>
//! RELATED_ARTICLES_START { "articles": [...], "existing_articles_map": {...} } RELATED_ARTICLES_END
//! ```
//!
//! Markers are used instead of a pure-JSON envelope because long markdown
//! bodies cannot be safely embedded in a JSON string without heavy
//! escaping, and models respect plain-text sentinels more reliably than
//! they escape JSON. The protocol is brittle by nature, so it is isolated
//! here behind one function with a test per malformation mode. The
//! orchestrator absorbs transient malformations with a bounded retry; this
//! module never retries.

use serde_json::Value;
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Level, NewSuggestion, RelatedSuggestion};
use crate::prompt::RELATED_ARTICLE_COUNT;

const EXCERPT_START: &str = "EXCERPT_START";
const EXCERPT_END: &str = "EXCERPT_END";
const RELATED_START: &str = "RELATED_ARTICLES_START";
const RELATED_END: &str = "RELATED_ARTICLES_END";

/// Excerpts above this word count are logged, not rejected; model output
/// length is not deterministic.
const EXCERPT_WORD_BUDGET: usize = 90;

/// A fully parsed writer response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArticle {
    pub excerpt: String,
    pub body: String,
    pub suggestions: Vec<RelatedSuggestion>,
}

/// Parse a raw writer completion into excerpt, body, and related-article
/// suggestions.
///
/// Fails with [`PipelineError::Parse`] on any protocol violation: missing
/// marker, markers out of order, malformed JSON, wrong suggestion count,
/// missing required field, or unrecognized level value.
pub fn parse_article_response(content: &str) -> PipelineResult<ParsedArticle> {
    let excerpt_start = find_marker(content, EXCERPT_START)?;
    let excerpt_end = find_marker(content, EXCERPT_END)?;
    let related_start = find_marker(content, RELATED_START)?;
    let related_end = find_marker(content, RELATED_END)?;

    let excerpt_body_start = excerpt_start + EXCERPT_START.len();
    let body_start = excerpt_end + EXCERPT_END.len();
    if excerpt_body_start > excerpt_end || body_start > related_start || related_start > related_end
    {
        return Err(PipelineError::Parse(
            "response markers are out of order".to_string(),
        ));
    }

    let excerpt = content[excerpt_body_start..excerpt_end].trim().to_string();
    let body = content[body_start..related_start].trim().to_string();
    let json_fragment = content[related_start + RELATED_START.len()..related_end].trim();

    let data: Value = serde_json::from_str(json_fragment).map_err(|e| {
        PipelineError::Parse(format!(
            "related-articles JSON is malformed ({}): {}",
            e, json_fragment
        ))
    })?;

    let suggestions = parse_suggestions(&data)?;

    let excerpt_words = excerpt.split_whitespace().count();
    if excerpt_words > EXCERPT_WORD_BUDGET {
        warn!(words = excerpt_words, "main excerpt exceeds word budget");
    }

    Ok(ParsedArticle {
        excerpt,
        body,
        suggestions,
    })
}

fn find_marker(content: &str, marker: &str) -> PipelineResult<usize> {
    content
        .find(marker)
        .ok_or_else(|| PipelineError::Parse(format!("response is missing the {} marker", marker)))
}

fn parse_suggestions(data: &Value) -> PipelineResult<Vec<RelatedSuggestion>> {
    let obj = data
        .as_object()
        .ok_or_else(|| PipelineError::Parse("related-articles JSON is not an object".to_string()))?;

    let articles = obj
        .get("articles")
        .ok_or_else(|| PipelineError::Parse("JSON is missing the articles field".to_string()))?
        .as_array()
        .ok_or_else(|| PipelineError::Parse("articles field is not an array".to_string()))?;

    let existing_map = obj
        .get("existing_articles_map")
        .ok_or_else(|| {
            PipelineError::Parse("JSON is missing the existing_articles_map field".to_string())
        })?
        .as_object()
        .ok_or_else(|| {
            PipelineError::Parse("existing_articles_map field is not an object".to_string())
        })?;

    if articles.len() != RELATED_ARTICLE_COUNT {
        return Err(PipelineError::Parse(format!(
            "expected {} related articles, got {}",
            RELATED_ARTICLE_COUNT,
            articles.len()
        )));
    }

    let mut suggestions = Vec::with_capacity(articles.len());
    for (idx, entry) in articles.iter().enumerate() {
        // A map entry overrides whatever inline metadata the model wrote
        // at this index: the suggestion is really an existing article.
        if let Some(mapped) = existing_map.get(&idx.to_string()) {
            let id = mapped.as_i64().ok_or_else(|| {
                PipelineError::Parse(format!(
                    "existing_articles_map entry for index {} is not an integer id: {}",
                    idx, mapped
                ))
            })?;
            suggestions.push(RelatedSuggestion::Existing { id });
            continue;
        }

        suggestions.push(RelatedSuggestion::New(parse_new_suggestion(idx, entry)?));
    }

    Ok(suggestions)
}

fn parse_new_suggestion(idx: usize, entry: &Value) -> PipelineResult<NewSuggestion> {
    let obj = entry.as_object().ok_or_else(|| {
        PipelineError::Parse(format!("suggestion at index {} is not an object", idx))
    })?;

    let field = |name: &str| -> PipelineResult<&Value> {
        obj.get(name).ok_or_else(|| {
            PipelineError::Parse(format!(
                "suggestion at index {} is missing required field: {}",
                idx, name
            ))
        })
    };
    let string_field = |name: &str| -> PipelineResult<String> {
        field(name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::Parse(format!(
                    "suggestion at index {} has a non-string {} field",
                    idx, name
                ))
            })
    };

    let level_raw = string_field("level")?;
    let level = Level::parse(&level_raw).ok_or_else(|| {
        PipelineError::Parse(format!(
            "suggestion at index {} has an invalid level value: {}",
            idx, level_raw
        ))
    })?;

    let tags = field("tags")?
        .as_array()
        .ok_or_else(|| {
            PipelineError::Parse(format!("suggestion at index {} has a non-array tags field", idx))
        })?
        .iter()
        .map(|t| {
            t.as_str().map(str::to_string).ok_or_else(|| {
                PipelineError::Parse(format!("suggestion at index {} has a non-string tag", idx))
            })
        })
        .collect::<PipelineResult<Vec<String>>>()?;

    let excerpt = string_field("excerpt")?;
    let excerpt_words = excerpt.split_whitespace().count();
    if excerpt_words > EXCERPT_WORD_BUDGET {
        warn!(
            index = idx,
            words = excerpt_words,
            "related-article excerpt exceeds word budget"
        );
    }

    Ok(NewSuggestion {
        title: string_field("title")?,
        taxonomy: string_field("taxonomy")?,
        category: string_field("category")?,
        level,
        tags,
        excerpt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion_json(n: usize) -> String {
        (0..n)
            .map(|i| {
                format!(
                    r#"{{"title": "Topic {i}", "taxonomy": "Data Structures", "category": "Trees", "level": "basic", "tags": ["t{i}"], "excerpt": "About topic {i}."}}"#
                )
            })
            .collect::<Vec<_>>()
            .join(",\n")
    }

    fn well_formed(map: &str) -> String {
        format!(
            "EXCERPT_START\nA short excerpt.\nEXCERPT_END\n\n# Body\n\nSome markdown content.\n\nRELATED_ARTICLES_START\n{{\"articles\": [{}], \"existing_articles_map\": {}}}\nRELATED_ARTICLES_END\n",
            suggestion_json(5),
            map
        )
    }

    #[test]
    fn test_well_formed_response() {
        let parsed = parse_article_response(&well_formed("{}")).unwrap();
        assert_eq!(parsed.excerpt, "A short excerpt.");
        assert_eq!(parsed.body, "# Body\n\nSome markdown content.");
        assert_eq!(parsed.suggestions.len(), 5);
        assert!(parsed
            .suggestions
            .iter()
            .all(|s| matches!(s, RelatedSuggestion::New(_))));
    }

    #[test]
    fn test_map_entries_reduced_to_references() {
        let parsed = parse_article_response(&well_formed(r#"{"1": 42, "3": 7}"#)).unwrap();
        assert_eq!(parsed.suggestions[1], RelatedSuggestion::Existing { id: 42 });
        assert_eq!(parsed.suggestions[3], RelatedSuggestion::Existing { id: 7 });
        match &parsed.suggestions[0] {
            RelatedSuggestion::New(s) => assert_eq!(s.title, "Topic 0"),
            other => panic!("expected inline suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_excerpt_start() {
        let response = well_formed("{}").replace("EXCERPT_START", "");
        let err = parse_article_response(&response).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(err.to_string().contains("EXCERPT_START"));
    }

    #[test]
    fn test_missing_excerpt_end() {
        let response = well_formed("{}").replace("EXCERPT_END", "EXCERPT_FIN");
        assert!(matches!(
            parse_article_response(&response),
            Err(PipelineError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_related_start() {
        let response = well_formed("{}").replace("RELATED_ARTICLES_START", "");
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("RELATED_ARTICLES_START"));
    }

    #[test]
    fn test_missing_related_end() {
        let response = well_formed("{}").replace("RELATED_ARTICLES_END", "");
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("RELATED_ARTICLES_END"));
    }

    #[test]
    fn test_malformed_json_includes_fragment() {
        let response =
            "EXCERPT_START e EXCERPT_END body RELATED_ARTICLES_START {not json]] RELATED_ARTICLES_END";
        let err = parse_article_response(response).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(err.to_string().contains("{not json]]"));
    }

    #[test]
    fn test_wrong_suggestion_count() {
        let response = format!(
            "EXCERPT_START e EXCERPT_END body RELATED_ARTICLES_START {{\"articles\": [{}], \"existing_articles_map\": {{}}}} RELATED_ARTICLES_END",
            suggestion_json(4)
        );
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("expected 5 related articles, got 4"));
    }

    #[test]
    fn test_missing_map_field() {
        let response = format!(
            "EXCERPT_START e EXCERPT_END body RELATED_ARTICLES_START {{\"articles\": [{}]}} RELATED_ARTICLES_END",
            suggestion_json(5)
        );
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("existing_articles_map"));
    }

    #[test]
    fn test_json_not_an_object() {
        let response = format!(
            "EXCERPT_START e EXCERPT_END body RELATED_ARTICLES_START [{}] RELATED_ARTICLES_END",
            suggestion_json(5)
        );
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn test_missing_required_field() {
        let response = well_formed("{}").replace("\"taxonomy\": \"Data Structures\", ", "");
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("missing required field: taxonomy"));
    }

    #[test]
    fn test_invalid_level_value() {
        let response = well_formed("{}").replace("\"level\": \"basic\"", "\"level\": \"expert\"");
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("invalid level value: expert"));
    }

    #[test]
    fn test_non_integer_map_id() {
        let response = well_formed(r#"{"0": "forty-two"}"#);
        let err = parse_article_response(&response).unwrap_err();
        assert!(err.to_string().contains("not an integer id"));
    }

    #[test]
    fn test_overlong_excerpt_is_tolerated() {
        let long_excerpt = "word ".repeat(120);
        let response = well_formed("{}").replace("A short excerpt.", &long_excerpt);
        // Over the ~90-word budget: logged, never rejected.
        let parsed = parse_article_response(&response).unwrap();
        assert_eq!(parsed.excerpt.split_whitespace().count(), 120);
    }

    #[test]
    fn test_markers_out_of_order() {
        let response = "RELATED_ARTICLES_START {} RELATED_ARTICLES_END EXCERPT_START e EXCERPT_END";
        let err = parse_article_response(response).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }
}
