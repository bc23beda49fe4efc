//! Initial request templates
//!
//! Turns the configured URL lists into the ordered set of queries one sync
//! pass starts from: one URL per resource type with the location, cohort and
//! patient-list filters spliced in.

use super::cursor::append_query_param;
use crate::config::SyncConfig;
use crate::domain::{FhirSyncError, ResourceType, Result};
use std::collections::HashSet;

/// Query fragment the selected patient lists are substituted into
pub const PATIENT_LIST_MARKER: &str = "_has:Group:member:id=";

const LOCATION_PARAM: &str = "location=";
const LIST_TYPE_PARAM: &str = "list-type=";

/// Filters applied while building templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncFilterConfig {
    pub location_filter_enabled: bool,
    pub location_id: Option<String>,
    pub cohort_filter_enabled: bool,
    pub cohort_type: Option<String>,
    pub patient_list_filter_enabled: bool,
    pub selected_patient_lists: Vec<String>,
}

impl From<&SyncConfig> for SyncFilterConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            location_filter_enabled: config.location_filter_enabled,
            location_id: config.location_id.clone(),
            cohort_filter_enabled: config.cohort_filter_enabled,
            cohort_type: config.cohort_type.clone(),
            patient_list_filter_enabled: config.patient_list_filter_enabled,
            selected_patient_lists: config.selected_patient_lists.clone(),
        }
    }
}

impl SyncFilterConfig {
    fn location(&self) -> Option<&str> {
        if !self.location_filter_enabled {
            return None;
        }
        self.location_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    fn cohort(&self) -> Option<&str> {
        if !self.cohort_filter_enabled {
            return None;
        }
        self.cohort_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Selected list ids, blank entries and repeats removed, order kept
    fn patient_lists(&self) -> Vec<&str> {
        if !self.patient_list_filter_enabled {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        self.selected_patient_lists
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .collect()
    }
}

/// Split a comma separated URL list, dropping blanks
pub fn split_url_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|url| !url.is_empty())
}

/// Build the initial request queue
///
/// First-sync URLs come ahead of recurring URLs and the first URL seen for a
/// resource type wins.
///
/// # Errors
///
/// Returns [`FhirSyncError::UnrecognizedResourceType`] for a URL whose
/// resource type is not known.
///
/// # Examples
///
/// ```
/// use fhirsync::core::sync::templates::{build_templates, SyncFilterConfig};
///
/// let urls = build_templates(
///     "Patient?_count=100",
///     "Patient?_count=50,Observation?_count=50",
///     &SyncFilterConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(urls, vec!["Patient?_count=100", "Observation?_count=50"]);
/// ```
pub fn build_templates(
    first_sync_urls: &str,
    recurring_sync_urls: &str,
    filters: &SyncFilterConfig,
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut templates = Vec::new();

    for url in split_url_list(first_sync_urls).chain(split_url_list(recurring_sync_urls)) {
        let resource_type = ResourceType::from_url(url)
            .ok_or_else(|| FhirSyncError::UnrecognizedResourceType(url.to_string()))?;

        if !seen.insert(resource_type) {
            tracing::debug!(url, resource_type = %resource_type, "Skipping URL for already templated type");
            continue;
        }

        templates.push(apply_filters(url, resource_type, filters));
    }

    Ok(templates)
}

/// Splice the configured filters into one URL
pub fn apply_filters(url: &str, resource_type: ResourceType, filters: &SyncFilterConfig) -> String {
    let mut url = url.to_string();

    if resource_type == ResourceType::Group {
        if let Some(location) = filters.location() {
            if !url.contains(LOCATION_PARAM) {
                url = append_query_param(&url, &format!("{LOCATION_PARAM}{location}"));
            }
        }

        if let Some(cohort) = filters.cohort() {
            if !url.contains(LIST_TYPE_PARAM) {
                url = append_query_param(&url, &format!("{LIST_TYPE_PARAM}{cohort}"));
            }
        }
    }

    if url.contains(PATIENT_LIST_MARKER) {
        url = apply_patient_lists(&url, &filters.patient_lists());
    }

    url
}

/// Fill or strip the patient-list membership filter
fn apply_patient_lists(url: &str, ids: &[&str]) -> String {
    if !ids.is_empty() {
        return url.replacen(
            PATIENT_LIST_MARKER,
            &format!("{PATIENT_LIST_MARKER}{}", ids.join(",")),
            1,
        );
    }

    let dangling = format!("{PATIENT_LIST_MARKER}&");
    if url.contains(&dangling) {
        return url.replace(&dangling, "");
    }

    // Marker as the last parameter: drop it together with its separator
    match url.strip_suffix(PATIENT_LIST_MARKER) {
        Some(rest) => rest
            .strip_suffix('&')
            .or_else(|| rest.strip_suffix('?'))
            .unwrap_or(rest)
            .to_string(),
        None => url.to_string(),
    }
}
