//! Text normalization shared by indexing and querying.
//!
//! Both `searchable_text` and search queries go through [`tokenize`], so a
//! term that appears in a span is always found by a query containing it.
//!
//! Policy: Unicode lowercasing; tokens are maximal runs of alphanumeric
//! characters; everything else (whitespace, punctuation, `#`, `_`) is a
//! separator. No stemming, no stop words.

/// Split text into normalized tokens, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Build the derived index text for a span's content.
pub fn searchable_text(content: &str) -> String {
    tokenize(content).join(" ")
}

/// Distinct query terms, keeping first-occurrence order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(query) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_punctuation() {
        assert_eq!(
            tokenize("## Postgres or PostgreSQL?"),
            vec!["postgres", "or", "postgresql"]
        );
    }

    #[test]
    fn test_separators() {
        assert_eq!(
            tokenize("snake_case, kebab-case/path.md"),
            vec!["snake", "case", "kebab", "case", "path", "md"]
        );
    }

    #[test]
    fn test_unicode_letters_kept() {
        assert_eq!(tokenize("Ünïcödé Straße"), vec!["ünïcödé", "straße"]);
    }

    #[test]
    fn test_empty_and_symbols_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("### --- !!!").is_empty());
    }

    #[test]
    fn test_searchable_text_joins_tokens() {
        assert_eq!(
            searchable_text("### Clone tables\n\nDuplicate your TABLES."),
            "clone tables duplicate your tables"
        );
    }

    #[test]
    fn test_query_terms_dedup() {
        assert_eq!(query_terms("Tables tables VIEW"), vec!["tables", "view"]);
    }

    #[test]
    fn test_query_and_content_share_normalization() {
        let content = searchable_text("The SQL-Editor");
        for term in query_terms("sql editor") {
            assert!(content.split(' ').any(|t| t == term));
        }
    }
}
