//! Pattern compilation for thread filters and search verification.

use regex::Regex;

use crate::error::{ArchiveError, Result};

/// Compile a `*`-wildcard pattern into an anchored, case-insensitive regex.
///
/// Everything except `*` is matched literally, so `*fern*` matches any
/// subject containing "fern" in any case. Fails with `InvalidPattern` for
/// empty input.
pub fn compile_wildcard(pattern: &str) -> Result<Regex> {
    if pattern.trim().is_empty() {
        return Err(ArchiveError::InvalidPattern(pattern.to_string()));
    }
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?i)^");
    let parts: Vec<&str> = pattern.split('*').collect();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            expr.push_str(".*");
        }
        expr.push_str(&regex::escape(part));
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| ArchiveError::InvalidPattern(e.to_string()))
}

/// Validate and lowercase a full-text search pattern.
///
/// Message search treats the pattern as a case-insensitive literal;
/// wildcards are not interpreted. Fails with `InvalidPattern` when nothing
/// searchable remains.
pub fn literal_needle(pattern: &str) -> Result<String> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
        return Err(ArchiveError::InvalidPattern(pattern.to_string()));
    }
    Ok(trimmed.to_lowercase())
}
