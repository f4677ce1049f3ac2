//! Input validation for the HTTP API

use crate::store::SEARCH_ID_LENGTH;

pub const KEYWORD_MIN_LENGTH: usize = 4;
pub const KEYWORD_MAX_LENGTH: usize = 32;

/// A keyword must be non-blank and between 4 and 32 characters long.
pub fn validate_keyword(keyword: &str) -> Result<(), String> {
    let trimmed = keyword.trim();
    if trimmed.is_empty() {
        return Err("keyword must not be blank".to_string());
    }
    let len = trimmed.chars().count();
    if !(KEYWORD_MIN_LENGTH..=KEYWORD_MAX_LENGTH).contains(&len) {
        return Err(format!(
            "keyword must be between {KEYWORD_MIN_LENGTH} and {KEYWORD_MAX_LENGTH} characters"
        ));
    }
    Ok(())
}

/// A search id is exactly 8 alphanumeric characters.
pub fn validate_search_id(id: &str) -> Result<(), String> {
    if id.len() != SEARCH_ID_LENGTH || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!(
            "search id must be exactly {SEARCH_ID_LENGTH} alphanumeric characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_bounds() {
        assert!(validate_keyword("security").is_ok());
        assert!(validate_keyword("abcd").is_ok());
        assert!(validate_keyword(&"x".repeat(32)).is_ok());
        assert!(validate_keyword("abc").is_err());
        assert!(validate_keyword(&"x".repeat(33)).is_err());
        assert!(validate_keyword("").is_err());
        assert!(validate_keyword("   ").is_err());
    }

    #[test]
    fn test_search_id_shape() {
        assert!(validate_search_id("a1b2c3d4").is_ok());
        assert!(validate_search_id("ABCD1234").is_ok());
        assert!(validate_search_id("short").is_err());
        assert!(validate_search_id("toolongid").is_err());
        assert!(validate_search_id("a1b2c3d!").is_err());
    }
}
