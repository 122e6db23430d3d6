//! Display-name to path-segment sanitizing
//!
//! Entry directories and image filenames are derived from provider display
//! titles, which can contain anything. The mapping here is total and
//! idempotent: the same input always yields the same safe, non-empty
//! segment, and re-sanitizing an already-safe name is a no-op.

/// Substituted when sanitizing strips a name down to nothing.
pub const FALLBACK_NAME: &str = "default_name";

/// Maps an arbitrary display name to a safe path segment.
///
/// Colons become `" - "`, slashes become `_`, characters forbidden on
/// common filesystems (`<>"|?*` and controls) are dropped, runs of
/// whitespace and hyphens collapse, and the result is trimmed of leading
/// and trailing spaces, dots and hyphens. Non-Latin scripts pass through
/// untouched.
pub fn sanitize_name(raw: &str) -> String {
    let mut replaced = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            ':' => replaced.push_str(" - "),
            '/' | '\\' => replaced.push('_'),
            '<' | '>' | '"' | '|' | '?' | '*' => {}
            c if c.is_control() => {}
            c => replaced.push(c),
        }
    }

    // Collapse whitespace runs, then hyphen runs.
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed
        .split('-')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let trimmed = collapsed.trim_matches(|c| c == ' ' || c == '.' || c == '-');

    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
