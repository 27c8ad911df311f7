//! Lenient version ordering.
//!
//! Package managers report versions like `1.21`, `v0.14.1` or `2024.1`,
//! which are not strict semver. They are padded to three components and then
//! ordered with `semver`; anything that still does not parse is treated as
//! not orderable.

use std::cmp::Ordering;

/// Parse a version leniently: optional `v` prefix, missing minor/patch
/// components padded with zero.
pub fn parse_lenient(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }

    // Split off pre-release/build suffixes before padding the core.
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    if parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    semver::Version::parse(&padded).ok()
}

/// Order two version strings, or `None` when either side is not a version.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_lenient(a)?.cmp(&parse_lenient(b)?))
}

/// Whether one of the two versions is a strict upgrade of the other.
pub fn is_strict_upgrade_pair(a: &str, b: &str) -> bool {
    matches!(
        compare_versions(a, b),
        Some(Ordering::Less | Ordering::Greater)
    )
}
