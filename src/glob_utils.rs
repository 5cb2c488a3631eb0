//! Glob pattern matching utilities for path filtering

use globset::{Glob, GlobMatcher};

/// Compile glob patterns into matchers for efficient repeated matching
///
/// Malformed patterns are logged and dropped, so they never match anything.
pub fn compile_patterns(patterns: &[String]) -> Vec<GlobMatcher> {
    patterns
        .iter()
        .filter_map(|pattern| match Glob::new(pattern) {
            Ok(glob) => Some(glob.compile_matcher()),
            Err(e) => {
                tracing::warn!("Ignoring invalid glob pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

/// Check if a path matches any of the precompiled glob matchers
///
/// Besides the full path, every path suffix is tried so that `lib/**` matches
/// `/abs/project/lib/a.ts`.
pub fn matches_any_matcher(path: &str, matchers: &[GlobMatcher]) -> bool {
    let path = path.replace('\\', "/");
    matchers.iter().any(|matcher| {
        if matcher.is_match(&path) {
            return true;
        }

        let path_no_slash = path.trim_start_matches('/');
        if matcher.is_match(path_no_slash) {
            return true;
        }

        let path_parts: Vec<&str> = path_no_slash.split('/').collect();
        (1..path_parts.len()).any(|i| matcher.is_match(path_parts[i..].join("/")))
    })
}

/// Check if a file path matches any of the given glob patterns
///
/// # Examples
///
/// ```
/// use code_sage::glob_utils::matches_any_pattern;
///
/// let patterns = vec!["lib/**".to_string(), "src/**/*.ts".to_string()];
/// assert!(matches_any_pattern("/project/lib/utils.ts", &patterns));
/// assert!(matches_any_pattern("/project/src/components/Button.ts", &patterns));
/// assert!(!matches_any_pattern("/project/tests/unit.rs", &patterns));
/// ```
pub fn matches_any_pattern(path: &str, patterns: &[String]) -> bool {
    matches_any_matcher(path, &compile_patterns(patterns))
}
