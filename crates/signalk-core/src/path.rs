//! SignalK path helpers.
//!
//! SignalK paths are dot-separated strings like "navigation.speedOverGround".
//! The store keys entries by the raw string; these helpers provide the
//! segment-aware joins and prefix checks the normalizers and the self
//! resolver need.

/// Append `key` to `base`, treating an empty base as the root.
pub fn join(base: &str, key: &str) -> String {
    match (base.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}.{key}"),
    }
}

/// Remove a whole-segment `prefix` from `path`.
///
/// Returns `Some("")` when the path equals the prefix and `None` when the
/// prefix does not end on a segment boundary of `path`.
pub fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('.')
    }
}
