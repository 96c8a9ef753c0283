//! Slash-separated path helpers.
//!
//! Object keys and virtual paths always use `/`, independent of the host
//! platform, so these work on strings rather than `std::path`.

/// Lexically clean a slash path.
///
/// Collapses repeated slashes, removes `.` segments, resolves `..` against
/// preceding segments and drops any trailing slash. An empty result is `"."`
/// for relative input and `"/"` for absolute input.
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join segments with `/` and clean the result. Empty segments are ignored;
/// joining nothing yields the empty string.
pub fn join(segments: &[&str]) -> String {
    let non_empty: Vec<&str> = segments.iter().copied().filter(|s| !s.is_empty()).collect();
    if non_empty.is_empty() {
        return String::new();
    }
    clean(&non_empty.join("/"))
}

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Whether the path addresses the root.
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/" || path == "."
}
