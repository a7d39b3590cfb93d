//! Server URL joining

/// Resolve `reference` against the configured server URL
///
/// Absolute references (anything with a scheme, e.g. `https://` or `data:`)
/// are returned unchanged. Relative references are appended to `base` with
/// exactly one `/` between them.
#[must_use]
pub fn resolve(base: &str, reference: &str) -> String {
    if url::Url::parse(reference).is_ok() {
        return reference.to_string();
    }

    let base = base.trim_end_matches('/');
    let reference = reference.trim_start_matches('/');

    if reference.is_empty() {
        return base.to_string();
    }

    format!("{base}/{reference}")
}
