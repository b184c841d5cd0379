//! `LIKE` / `ILIKE` matching.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use regex::{Regex, RegexBuilder};

use crate::core::{Result, StoreError};

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

lazy_static::lazy_static! {
    static ref COMPILED_PATTERNS: Mutex<LruCache<(String, bool), Arc<Regex>>> =
        Mutex::new(LruCache::new(CACHE_CAPACITY));
}

/// Translates a LIKE pattern into an anchored regex. `%` matches any run,
/// `_` one character, and a backslash escapes the next character.
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => regex.push_str(&regex::escape(&escaped.to_string())),
                None => regex.push_str(r"\\"),
            },
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push('$');
    regex
}

/// Patterns without wildcards or escapes are plain comparisons.
fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['%', '_', '\\'])
}

fn compiled(pattern: &str, case_sensitive: bool) -> Result<Arc<Regex>> {
    let key = (pattern.to_string(), case_sensitive);

    if let Some(regex) = COMPILED_PATTERNS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(regex));
    }

    let regex = RegexBuilder::new(&like_to_regex(pattern))
        .case_insensitive(!case_sensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| StoreError::Backend(format!("Invalid LIKE pattern '{}': {}", pattern, e)))?;
    let regex = Arc::new(regex);

    COMPILED_PATTERNS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .put(key, Arc::clone(&regex));

    Ok(regex)
}

pub fn matches_like(text: &str, pattern: &str, case_sensitive: bool) -> Result<bool> {
    if is_literal(pattern) {
        return Ok(if case_sensitive {
            text == pattern
        } else {
            text.to_lowercase() == pattern.to_lowercase()
        });
    }
    Ok(compiled(pattern, case_sensitive)?.is_match(text))
}
