//! Mention extraction
//!
//! `@name` tokens are matched with `@([\w-]+)` when the `@` opens the text or follows a
//! non-word character, so email addresses are not mentions. Tokens are de-duplicated
//! case-insensitively, keeping the first spelling seen.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn mention_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:^|[^\w])@([\w-]+)").ok())
        .as_ref()
}

/// Extract distinct mention tokens (without the `@`) in order of first appearance.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let Some(pattern) = mention_pattern() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    pattern
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|token| seen.insert(token.to_lowercase()))
        .collect()
}
