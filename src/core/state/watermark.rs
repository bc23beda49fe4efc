//! Watermark model for tracking sync state
//!
//! A watermark is the most recent `meta.lastUpdated` seen for one resource
//! type. It is stored as a string and affixed to the next query for that
//! type so the server only returns newer resources.

use crate::domain::{FhirSyncError, Resource, ResourceType, Result};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last-seen update timestamp for one resource type
///
/// # Examples
///
/// ```
/// use fhirsync::core::state::Watermark;
/// use fhirsync::domain::ResourceType;
///
/// let watermark = Watermark::parse(ResourceType::Observation, "2024-03-02T10:15:00+02:00").unwrap();
/// assert_eq!(watermark.formatted(), "2024-03-02T08:15:00.000Z");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Resource type this watermark tracks
    pub resource_type: ResourceType,

    /// Highest `meta.lastUpdated` observed
    pub last_updated: DateTime<FixedOffset>,
}

impl Watermark {
    pub fn new(resource_type: ResourceType, last_updated: DateTime<FixedOffset>) -> Self {
        Self {
            resource_type,
            last_updated,
        }
    }

    /// Parse a stored watermark value
    ///
    /// # Errors
    ///
    /// Returns a state error if `value` is not an RFC 3339 timestamp.
    pub fn parse(resource_type: ResourceType, value: &str) -> Result<Self> {
        let last_updated = DateTime::parse_from_rfc3339(value).map_err(|e| {
            FhirSyncError::State(format!(
                "Stored watermark for {resource_type} is not a valid timestamp '{value}': {e}"
            ))
        })?;
        Ok(Self::new(resource_type, last_updated))
    }

    /// Value written to the timestamp store and affixed to query URLs
    pub fn formatted(&self) -> String {
        format_timestamp(&self.last_updated)
    }

    /// Whether this watermark is strictly later than `other`
    pub fn is_after(&self, other: &Watermark) -> bool {
        self.last_updated > other.last_updated
    }
}

/// Format a timestamp the way watermarks are stored
///
/// Always UTC with millisecond precision and a `Z` suffix, so the value can
/// be placed in a query string without escaping a `+` offset.
///
/// Sub-millisecond digits are truncated, never rounded up. A resource whose
/// `meta.lastUpdated` carries them stays strictly after its own stored
/// watermark and is fetched again by every following `gt` query.
pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Per-type maximum `meta.lastUpdated` within one page of resources
///
/// Resources without `meta.lastUpdated` or with a type outside the known set
/// do not contribute.
pub fn page_maxima(resources: &[Resource]) -> Vec<Watermark> {
    let mut maxima: BTreeMap<ResourceType, DateTime<FixedOffset>> = BTreeMap::new();

    for resource in resources {
        let (Some(kind), Some(last_updated)) = (resource.kind(), resource.last_updated) else {
            continue;
        };
        maxima
            .entry(kind)
            .and_modify(|current| {
                if last_updated > *current {
                    *current = last_updated;
                }
            })
            .or_insert(last_updated);
    }

    maxima
        .into_iter()
        .map(|(resource_type, last_updated)| Watermark::new(resource_type, last_updated))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation(id: &str, last_updated: &str) -> Resource {
        Resource::try_from(json!({
            "resourceType": "Observation",
            "id": id,
            "meta": {"lastUpdated": last_updated}
        }))
        .unwrap()
    }

    #[test]
    fn test_format_normalises_to_utc_millis() {
        let ts = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.678901-05:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-02T08:04:05.678Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = Watermark::parse(ResourceType::Patient, "yesterday");
        assert!(matches!(result, Err(FhirSyncError::State(_))));
    }

    #[test]
    fn test_page_maxima_takes_latest_per_type() {
        let resources = vec![
            observation("o1", "2024-01-01T00:00:00Z"),
            observation("o2", "2024-01-02T00:00:00Z"),
            Resource::try_from(json!({
                "resourceType": "Patient",
                "id": "p1",
                "meta": {"lastUpdated": "2023-12-31T23:00:00+01:00"}
            }))
            .unwrap(),
            Resource::try_from(json!({"resourceType": "Patient", "id": "p2"})).unwrap(),
        ];

        let maxima = page_maxima(&resources);
        assert_eq!(maxima.len(), 2);

        let observation = maxima
            .iter()
            .find(|w| w.resource_type == ResourceType::Observation)
            .unwrap();
        assert_eq!(observation.formatted(), "2024-01-02T00:00:00.000Z");

        let patient = maxima
            .iter()
            .find(|w| w.resource_type == ResourceType::Patient)
            .unwrap();
        assert_eq!(patient.formatted(), "2023-12-31T22:00:00.000Z");
    }

    #[test]
    fn test_page_maxima_ignores_unknown_types() {
        let resources = vec![Resource::try_from(json!({
            "resourceType": "Widget",
            "meta": {"lastUpdated": "2024-01-01T00:00:00Z"}
        }))
        .unwrap()];
        assert!(page_maxima(&resources).is_empty());
    }

    #[test]
    fn test_page_maxima_covers_everything_operation_types() {
        let resources: Vec<Resource> = ["Coverage", "Goal", "Device"]
            .into_iter()
            .map(|resource_type| {
                Resource::try_from(json!({
                    "resourceType": resource_type,
                    "meta": {"lastUpdated": "2024-01-01T00:00:00Z"}
                }))
                .unwrap()
            })
            .collect();

        let types: Vec<ResourceType> = page_maxima(&resources)
            .into_iter()
            .map(|w| w.resource_type)
            .collect();
        assert_eq!(
            types,
            vec![ResourceType::Coverage, ResourceType::Device, ResourceType::Goal]
        );
    }

    #[test]
    fn test_format_truncates_sub_millisecond_digits() {
        let ts = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.999999Z").unwrap();
        let formatted = format_timestamp(&ts);
        assert_eq!(formatted, "2024-01-02T03:04:05.999Z");

        let stored = Watermark::parse(ResourceType::Patient, &formatted).unwrap();
        assert!(Watermark::new(ResourceType::Patient, ts).is_after(&stored));
    }

    #[test]
    fn test_is_after() {
        let older = Watermark::parse(ResourceType::Task, "2024-01-01T00:00:00Z").unwrap();
        let newer = Watermark::parse(ResourceType::Task, "2024-01-01T00:00:01Z").unwrap();
        assert!(newer.is_after(&older));
        assert!(!older.is_after(&newer));
        assert!(!older.is_after(&older));
    }
}
