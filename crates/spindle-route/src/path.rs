//! Path composition.
//!
//! Group prefixes and relative route paths are joined lexically: duplicate
//! separators collapse, `.` segments vanish and `..` removes the preceding
//! segment (stopping at the root). A trailing `/` on the relative path is
//! kept so that directory-style mounts still address "everything below".
//!
//! # Example
//!
//! ```rust
//! use spindle_route::path::join_paths;
//!
//! assert_eq!(join_paths("/api", "users").unwrap(), "/api/users");
//! assert_eq!(join_paths("/api", "assets/").unwrap(), "/api/assets/");
//! assert_eq!(join_paths("/api/v1", "../v2//users").unwrap(), "/api/v2/users");
//! ```

use spindle_core::RouteError;

/// Lexically cleans a slash-separated path.
///
/// An empty result is returned as `"."`, a rooted path never climbs above
/// `/`.
#[must_use]
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Joins two path elements and cleans the result.
///
/// Empty elements are ignored; joining two empty elements yields `""`.
#[must_use]
pub fn join(base: &str, relative: &str) -> String {
    match (base.is_empty(), relative.is_empty()) {
        (true, true) => String::new(),
        (false, true) => clean(base),
        (true, false) => clean(relative),
        (false, false) => clean(&format!("{base}/{relative}")),
    }
}

/// Joins a group's absolute base path with a relative route path.
///
/// An empty `relative` returns `base` untouched. Otherwise the clean join is
/// returned, with a trailing `/` appended when `relative` ends in one and
/// cleaning removed it.
///
/// # Errors
///
/// Returns [`RouteError::EmptyPath`] if an empty path reaches the
/// trailing-separator check.
pub fn join_paths(base: &str, relative: &str) -> Result<String, RouteError> {
    if relative.is_empty() {
        return Ok(base.to_string());
    }

    let mut final_path = join(base, relative);
    if last_char(relative)? == b'/' && last_char(&final_path)? != b'/' {
        final_path.push('/');
    }
    Ok(final_path)
}

fn last_char(s: &str) -> Result<u8, RouteError> {
    s.as_bytes().last().copied().ok_or(RouteError::EmptyPath)
}
