//! Heading-boundary text chunker.
//!
//! Splits content into spans that start at markdown heading lines of a
//! configurable maximum depth. With `max_heading_depth = 3`, lines starting
//! with `# `, `## ` and `### ` open a new span while `#### ` does not.
//!
//! # Heading policy
//!
//! - The heading must start at column 0. Indented headings are body text.
//! - 1..=`max_heading_depth` `#` characters must be immediately followed
//!   by an ASCII space. `#Title` and `#\tTitle` are body text.
//! - Fenced code blocks get no special treatment.
//!
//! # Algorithm
//!
//! 1. Normalize line endings (`\r\n` and lone `\r` become `\n`).
//! 2. Walk the lines, keeping each line's trailing `\n`.
//! 3. A heading line flushes the buffer and becomes the first line of the
//!    next span. Content before the first heading forms a leading span.
//! 4. Spans with no non-whitespace content are dropped.
//!
//! Concatenating the returned spans reproduces the normalized content
//! except for a whitespace-only prelude.
//!
//! # Example
//!
//! ```rust
//! use docspan_core::chunk::chunk;
//!
//! let spans = chunk("Intro\n# One\nbody\n## Two\n", 3).unwrap();
//! assert_eq!(spans, vec!["Intro\n", "# One\nbody\n", "## Two\n"]);
//! ```

use std::borrow::Cow;

use crate::error::{CoreError, Result};

/// Split `content` into heading-bounded spans.
///
/// Fails with [`CoreError::InvalidInput`] if `max_heading_depth` is 0.
/// Output is deterministic for identical input.
pub fn chunk(content: &str, max_heading_depth: usize) -> Result<Vec<String>> {
    if max_heading_depth < 1 {
        return Err(CoreError::InvalidInput(
            "max_heading_depth must be >= 1".to_string(),
        ));
    }

    let normalized = normalize_line_endings(content);
    let mut spans = Vec::new();
    let mut current = String::new();

    for line in normalized.split_inclusive('\n') {
        if is_heading(line, max_heading_depth) && !current.is_empty() {
            push_span(&mut spans, std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    push_span(&mut spans, current);

    Ok(spans)
}

/// Returns true if `line` opens a new span at the given depth.
pub fn is_heading(line: &str, max_heading_depth: usize) -> bool {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    hashes >= 1 && hashes <= max_heading_depth && line.as_bytes().get(hashes) == Some(&b' ')
}

/// Convert `\r\n` and lone `\r` line endings to `\n`.
pub fn normalize_line_endings(content: &str) -> Cow<'_, str> {
    if !content.contains('\r') {
        return Cow::Borrowed(content);
    }
    Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
}

fn push_span(spans: &mut Vec<String>, span: String) {
    if !span.trim().is_empty() {
        spans.push(span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::DATABASE_GUIDE;

    #[test]
    fn test_no_headings_single_span() {
        let spans = chunk("Just a paragraph.\n\nAnother one.", 3).unwrap();
        assert_eq!(spans, vec!["Just a paragraph.\n\nAnother one."]);
    }

    #[test]
    fn test_empty_content() {
        assert!(chunk("", 3).unwrap().is_empty());
        assert!(chunk("  \n\t\n", 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = chunk("# A", 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_sample_document_depth_three() {
        let spans = chunk(DATABASE_GUIDE, 3).unwrap();
        assert_eq!(spans.len(), 11);
        assert!(spans[0].starts_with("import Layout"));
        assert!(spans[1].starts_with("## Postgres or PostgreSQL?"));
        assert!(spans[2].starts_with("## Features"));
        assert!(spans[3].starts_with("### Table View"));
        assert!(spans[4].starts_with("### Relationships"));
        assert!(spans[8].starts_with("### Extensions"));
        assert!(spans[9].starts_with("## Tips"));
        assert!(spans[10].starts_with("## Next steps"));
    }

    #[test]
    fn test_sample_document_shallower_depths() {
        assert_eq!(chunk(DATABASE_GUIDE, 2).unwrap().len(), 5);
        assert_eq!(chunk(DATABASE_GUIDE, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_round_trip_reconstructs_content() {
        let spans = chunk(DATABASE_GUIDE, 3).unwrap();
        assert_eq!(spans.concat(), DATABASE_GUIDE);
    }

    #[test]
    fn test_deeper_headings_stay_in_parent() {
        let text = "# Top\nintro\n#### Deep\ndetail\n";
        let spans = chunk(text, 3).unwrap();
        assert_eq!(spans, vec!["# Top\nintro\n#### Deep\ndetail\n"]);
        assert_eq!(chunk(text, 4).unwrap().len(), 2);
    }

    #[test]
    fn test_heading_policy() {
        assert!(is_heading("# Title\n", 1));
        assert!(is_heading("### Title", 3));
        assert!(!is_heading("### Title", 2));
        assert!(!is_heading("  # Indented", 3));
        assert!(!is_heading("#Title", 3));
        assert!(!is_heading("#\tTitle", 3));
        assert!(!is_heading("#", 3));
        assert!(!is_heading("text # not heading", 3));
    }

    #[test]
    fn test_indented_heading_not_boundary() {
        let spans = chunk("# A\n  # not a boundary\n", 3).unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_whitespace_prelude_dropped() {
        let spans = chunk("\n\n   \n# A\nbody\n", 3).unwrap();
        assert_eq!(spans, vec!["# A\nbody\n"]);
    }

    #[test]
    fn test_crlf_matches_lf() {
        let lf = chunk("intro\n# A\nbody\n## B\nmore\n", 3).unwrap();
        let crlf = chunk("intro\r\n# A\r\nbody\r\n## B\r\nmore\r\n", 3).unwrap();
        assert_eq!(lf, crlf);
    }

    #[test]
    fn test_lone_cr_normalized() {
        assert_eq!(normalize_line_endings("a\rb\r\nc"), "a\nb\nc");
        assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_consecutive_headings() {
        let spans = chunk("# A\n## B\n### C\n", 3).unwrap();
        assert_eq!(spans, vec!["# A\n", "## B\n", "### C\n"]);
    }

    #[test]
    fn test_multibyte_utf8_content() {
        let text = "┌──┐\n# Ünïcödé\n│ body │\n";
        let spans = chunk(text, 3).unwrap();
        assert_eq!(spans, vec!["┌──┐\n", "# Ünïcödé\n│ body │\n"]);
    }

    #[test]
    fn test_deterministic() {
        let a = chunk(DATABASE_GUIDE, 3).unwrap();
        let b = chunk(DATABASE_GUIDE, 3).unwrap();
        assert_eq!(a, b);
    }
}
