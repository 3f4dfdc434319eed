//! Shell-style wildcard matching
//!
//! `*` matches zero or more of any character. Every other character is
//! literal. Matching is anchored to the whole value and case-sensitive;
//! callers lowercase both sides when they need case-insensitive rules.
//!
//! # Examples
//!
//! ```
//! use aria2_capture::util::pattern::matches;
//!
//! assert!(matches("a.b.com", "*.b.com"));
//! assert!(!matches("a.b.com", "*.c.com"));
//! ```

use regex::Regex;

/// Convert a wildcard pattern into an anchored regex
fn wildcard_to_regex(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?s)^{}$", body)).ok()
}

/// Check whether `value` matches the wildcard `pattern`
pub fn matches(value: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return value == pattern;
    }
    match wildcard_to_regex(pattern) {
        Some(re) => re.is_match(value),
        None => {
            tracing::warn!("Unusable wildcard pattern: {}", pattern);
            false
        }
    }
}

/// Check a value against a comma-separated pattern list, first match wins
///
/// Blank entries are ignored, surrounding whitespace is trimmed.
pub fn matches_any(value: &str, pattern_list: &str) -> bool {
    pattern_list
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| matches(value, p))
}
