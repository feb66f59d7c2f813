//! URL-safe slug derivation from article titles.

/// Derive a URL-safe slug from a title.
///
/// Lowercases the input, collapses every maximal run of characters outside
/// `[a-z0-9]` into a single hyphen, and strips leading/trailing hyphens.
/// Pure and deterministic; slug collisions between distinct titles are not
/// resolved here — the storage layer enforces uniqueness and surfaces a
/// constraint violation to the caller.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_title() {
        assert_eq!(slugify("Binary Search Trees"), "binary-search-trees");
    }

    #[test]
    fn test_punctuation_collapses() {
        assert_eq!(slugify("Big-O Notation!"), "big-o-notation");
    }

    #[test]
    fn test_multiple_spaces() {
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
    }

    #[test]
    fn test_no_leading_or_trailing_hyphens() {
        assert_eq!(slugify("--- What is REST? ---"), "what-is-rest");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_digits_kept() {
        assert_eq!(slugify("HTTP/2 Basics"), "http-2-basics");
    }

    #[test]
    fn test_idempotent() {
        for title in [
            "Binary Search Trees",
            "Big-O Notation!",
            "  Multiple   Spaces  ",
            "C++ vs. Rust: a comparison (2024)",
        ] {
            let once = slugify(title);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_output_shape() {
        let slug = slugify("C++ vs. Rust: a comparison (2024)");
        assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        assert!(!slug.contains("--"));
        assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }
}
