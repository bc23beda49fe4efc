//! Timestamp cursors on query URLs
//!
//! Search queries are narrowed with `_lastUpdated=gt<ts>`, `$everything`
//! operations with `_since=<ts>`. Server-issued continuation URLs carrying a
//! `page_token` already encode their position and are left alone.

/// Marker of a server-issued continuation token
pub const PAGE_TOKEN_MARKER: &str = "&page_token";

/// Marker of the patient `$everything` operation
pub const EVERYTHING_OPERATION: &str = "$everything";

/// Cursor parameter accepted by `$everything`
pub const SINCE_PARAM: &str = "_since";

/// Prefix of the search cursor parameter
pub const LAST_UPDATED_GT: &str = "_lastUpdated=gt";

/// Affix a last-updated cursor to `url`
///
/// # Examples
///
/// ```
/// use fhirsync::core::sync::cursor::affix;
///
/// assert_eq!(
///     affix("Observation", "2024-01-02T00:00:00.000Z"),
///     "Observation?_lastUpdated=gt2024-01-02T00:00:00.000Z"
/// );
/// assert_eq!(
///     affix("Patient/1/$everything", "2024-01-02T00:00:00.000Z"),
///     "Patient/1/$everything?_since=2024-01-02T00:00:00.000Z"
/// );
/// ```
pub fn affix(url: &str, last_updated: &str) -> String {
    if url.contains(PAGE_TOKEN_MARKER) {
        return url.to_string();
    }

    if url.contains(EVERYTHING_OPERATION) {
        let without_since = remove_query_param(url, SINCE_PARAM);
        return append_query_param(&without_since, &format!("{SINCE_PARAM}={last_updated}"));
    }

    let cursor = format!("{LAST_UPDATED_GT}{last_updated}");
    match replace_last_updated(url, &cursor) {
        Some(replaced) => replaced,
        None => append_query_param(url, &cursor),
    }
}

/// Append `param` to the query string, starting one if needed
pub fn append_query_param(url: &str, param: &str) -> String {
    if url.ends_with('?') || url.ends_with('&') {
        format!("{url}{param}")
    } else if url.contains('?') {
        format!("{url}&{param}")
    } else {
        format!("{url}?{param}")
    }
}

/// Remove every occurrence of the query parameter `name`
///
/// Drops the `?` as well when no parameters remain.
pub fn remove_query_param(url: &str, name: &str) -> String {
    let Some((path, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| !param.is_empty() && param_name(param) != name)
        .collect();

    if kept.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", kept.join("&"))
    }
}

fn param_name(param: &str) -> &str {
    param.split_once('=').map_or(param, |(name, _)| name)
}

/// Replace the first `_lastUpdated=gt...` parameter with `cursor` in place
///
/// Later `gt` cursors are dropped so the result carries exactly one. Other
/// `_lastUpdated` comparisons (`lt`, `le`, ...) are kept. Returns `None` when
/// the URL has no `gt` cursor.
fn replace_last_updated(url: &str, cursor: &str) -> Option<String> {
    let (path, query) = url.split_once('?')?;

    let mut replaced = false;
    let mut params = Vec::new();
    for param in query.split('&') {
        if param.starts_with(LAST_UPDATED_GT) {
            if !replaced {
                params.push(cursor);
                replaced = true;
            }
        } else {
            params.push(param);
        }
    }

    replaced.then(|| format!("{path}?{}", params.join("&")))
}
