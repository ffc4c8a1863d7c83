//! Actor extraction from free-text action log lines.
//!
//! Older document log rows carry no actor reference, only a sentence such as
//! `"v2 uploaded by quocthe"` or `"Phê duyệt bởi ngocanh"`. The patterns are
//! tried in order and the first non-empty capture wins, so specific phrases
//! take precedence over the generic `bởi` / `by` fallbacks.

use std::sync::LazyLock;

use regex::Regex;

static USERNAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)created\s+by\s+(\S+)",
        r"(?i)uploaded\s+by\s+(\S+)",
        r"(?i)approved\s+by\s+(\S+)",
        r"(?i)tạo\s+(?:tài\s+liệu\s+)?bởi\s+(\S+)",
        r"(?i)tải\s+lên(?:\s+phiên\s+bản)?\s*(?:v\d+)?\s*bởi\s+(\S+)",
        r"(?i)phê\s+duyệt\s+bởi\s+(\S+)",
        r"(?i)từ\s+chối\s+bởi\s+(\S+)",
        r"(?i)bởi\s+(\S+)",
        r"(?i)by\s+(\S+)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid regex"))
    .collect()
});

/// Extract the username mentioned in a log detail line.
///
/// Returns `None` for blank input or when no pattern matches.
///
/// ```
/// use sams_core::log::extract_username;
///
/// assert_eq!(extract_username("Created by quocthe"), Some("quocthe".to_owned()));
/// assert_eq!(extract_username("Tải lên phiên bản v3 bởi lan.nguyen"), Some("lan.nguyen".to_owned()));
/// assert_eq!(extract_username(""), None);
/// ```
#[must_use]
pub fn extract_username(detail: &str) -> Option<String> {
    if detail.trim().is_empty() {
        return None;
    }
    USERNAME_PATTERNS.iter().find_map(|re| {
        re.captures(detail)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_patterns() {
        assert_eq!(
            extract_username("v1 uploaded by quocthe"),
            Some("quocthe".to_owned())
        );
        assert_eq!(
            extract_username("APPROVED BY NgocAnh at 10:00"),
            Some("NgocAnh".to_owned())
        );
    }

    #[test]
    fn test_vietnamese_patterns() {
        assert_eq!(
            extract_username("Tạo tài liệu bởi minhtran"),
            Some("minhtran".to_owned())
        );
        assert_eq!(
            extract_username("Từ chối bởi hoang: thiếu chữ ký"),
            Some("hoang:".to_owned())
        );
        assert_eq!(
            extract_username("tải lên v2 bởi thu"),
            Some("thu".to_owned())
        );
    }

    #[test]
    fn test_specific_pattern_wins_over_generic() {
        // "by" appears first in the text, but "approved by" is tried earlier.
        assert_eq!(
            extract_username("Requested by alice, approved by bob"),
            Some("bob".to_owned())
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_username("   "), None);
        assert_eq!(extract_username("Status changed to ACTIVE"), None);
        assert_eq!(extract_username("created by"), None);
    }
}
