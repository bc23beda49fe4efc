//! Count-only request URLs
//!
//! Before a pass starts, each pending query can be asked for its match count
//! with `_summary=count`, using the same cursor the real fetch will use.

use super::cursor::{affix, append_query_param, remove_query_param};

/// Parameter asking the server for a count-only bundle
pub const SUMMARY_COUNT: &str = "_summary=count";

const SUMMARY_PARAM: &str = "_summary";

/// Derive the count-only variant of a pending URL
///
/// # Examples
///
/// ```
/// use fhirsync::core::sync::summary::summary_url;
///
/// assert_eq!(summary_url("Patient?_count=50", None), "Patient?_count=50&_summary=count");
/// assert_eq!(
///     summary_url("Patient?_summary=data", Some("2024-01-01T00:00:00.000Z")),
///     "Patient?_lastUpdated=gt2024-01-01T00:00:00.000Z&_summary=count"
/// );
/// ```
pub fn summary_url(url: &str, last_updated: Option<&str>) -> String {
    let stripped = remove_query_param(url, SUMMARY_PARAM);
    let cursored = match last_updated {
        Some(ts) => affix(&stripped, ts),
        None => stripped,
    };
    append_query_param(&cursored, SUMMARY_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: &str = "2024-05-06T07:08:09.000Z";

    #[test]
    fn test_summary_without_cursor() {
        assert_eq!(summary_url("Observation", None), "Observation?_summary=count");
    }

    #[test]
    fn test_summary_replaces_existing_summary() {
        let url = summary_url("Encounter?_summary=true&_count=10", Some(TS));
        assert_eq!(
            url,
            "Encounter?_count=10&_lastUpdated=gt2024-05-06T07:08:09.000Z&_summary=count"
        );
        assert_eq!(url.matches("_summary").count(), 1);
    }

    #[test]
    fn test_summary_for_everything_uses_since() {
        assert_eq!(
            summary_url("Patient/p1/$everything", Some(TS)),
            "Patient/p1/$everything?_since=2024-05-06T07:08:09.000Z&_summary=count"
        );
    }

    #[test]
    fn test_summary_replaces_existing_cursor() {
        let url = summary_url("Task?_lastUpdated=gt2020-01-01&_summary=count", Some(TS));
        assert_eq!(url, "Task?_lastUpdated=gt2024-05-06T07:08:09.000Z&_summary=count");
    }
}
