//! Pluggable keyword predicate

/// Decides whether a page body matches a search keyword.
///
/// The crawl engine treats matching as opaque; swapping in a different
/// implementation (regex, stemmed, whatever) needs no scheduler changes.
pub trait KeywordMatcher: Send + Sync {
    fn matches(&self, content: &str, keyword: &str) -> bool;
}

/// Default matcher: case-insensitive substring containment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringMatcher;

impl KeywordMatcher for SubstringMatcher {
    fn matches(&self, content: &str, keyword: &str) -> bool {
        if keyword.is_empty() {
            return false;
        }
        content.to_lowercase().contains(&keyword.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let m = SubstringMatcher;
        assert!(m.matches("Buy a WIDGET today", "widget"));
        assert!(m.matches("buy a widget today", "WIDGET"));
    }

    #[test]
    fn test_substring_not_word_boundary() {
        let m = SubstringMatcher;
        assert!(m.matches("widgetry", "widget"));
    }

    #[test]
    fn test_no_match() {
        let m = SubstringMatcher;
        assert!(!m.matches("nothing to see", "widget"));
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let m = SubstringMatcher;
        assert!(!m.matches("anything", ""));
    }
}
