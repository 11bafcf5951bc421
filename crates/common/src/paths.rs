//! Virtual path handling for datastore namespaces.
//!
//! Paths here are not filesystem paths. They name entries in a remote
//! directory tree, always `/`-separated regardless of platform, and are
//! normalized before any resolution or mutation so that equivalent
//! spellings land on the same entries.

/// Path separator for datastore paths
pub const SEPARATOR: char = '/';

/// Normalize a raw path into absolute canonical form.
///
/// Collapses repeated separators, drops `.` segments, and resolves `..`
/// against the segments seen so far. `..` at the root is a no-op rather
/// than an error, so every input maps to some valid absolute path. The
/// result always starts with `/` and never ends with one (except for the
/// root itself).
///
/// Sanitizing is idempotent: `sanitize(sanitize(p)) == sanitize(p)`.
pub fn sanitize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    out.push(SEPARATOR);
    out.push_str(&parts.join("/"));
    out
}

/// Parent of a sanitized path.
///
/// The root is its own parent.
pub fn dirname(path: &str) -> String {
    match path.rfind(SEPARATOR) {
        Some(0) | None => SEPARATOR.to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Final segment of a sanitized path.
///
/// Empty for the root.
pub fn basename(path: &str) -> String {
    match path.rfind(SEPARATOR) {
        Some(idx) => path[idx + 1..].to_string(),
        None => path.to_string(),
    }
}

/// Split a sanitized path into its segments, root first.
///
/// The root itself yields no segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|part| !part.is_empty())
}

/// Whether a sanitized path is the namespace root.
pub fn is_root(path: &str) -> bool {
    path == "/"
}
