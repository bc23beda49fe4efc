//! FHIR page and resource models
//!
//! Only the parts of a FHIR response that drive synchronisation are modelled
//! here: bundle links and entries, list references, operation outcome
//! diagnostics and `meta.lastUpdated`. Everything else travels untouched in
//! [`Resource::body`].

use super::errors::{FhirError, FhirSyncError};
use super::resource_type::ResourceType;
use super::result::Result;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bundle link relation that points at the following page
pub const NEXT_RELATION: &str = "next";

/// Bundle type carrying search results
pub const SEARCHSET: &str = "searchset";

/// A single FHIR resource as returned by the server
///
/// The raw JSON is kept verbatim so it can be persisted as-is; the fields
/// needed for routing and watermarking are lifted out at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Resource {
    /// `resourceType` as sent by the server
    pub resource_type: String,

    /// Logical id, if present
    pub id: Option<String>,

    /// `meta.lastUpdated`, if present
    pub last_updated: Option<DateTime<FixedOffset>>,

    /// Full resource JSON
    pub body: Value,
}

impl Resource {
    /// Known resource type of this resource, if any
    pub fn kind(&self) -> Option<ResourceType> {
        ResourceType::from_name(&self.resource_type)
    }
}

impl TryFrom<Value> for Resource {
    type Error = String;

    fn try_from(body: Value) -> std::result::Result<Self, Self::Error> {
        let resource_type = body
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| "resource is missing 'resourceType'".to_string())?
            .to_string();

        let id = body.get("id").and_then(Value::as_str).map(str::to_string);

        let last_updated = match body
            .get("meta")
            .and_then(|meta| meta.get("lastUpdated"))
            .and_then(Value::as_str)
        {
            Some(raw) => Some(DateTime::parse_from_rfc3339(raw).map_err(|e| {
                format!("invalid meta.lastUpdated '{raw}' on {resource_type}: {e}")
            })?),
            None => None,
        };

        Ok(Self {
            resource_type,
            id,
            last_updated,
            body,
        })
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        resource.body
    }
}

/// Link entry of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLink {
    /// Link relation, e.g. `self` or `next`
    pub relation: String,

    /// Target URL
    pub url: String,
}

/// Entry of a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Absolute URL of the entry resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    /// Entry payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

/// FHIR Bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle type (`searchset`, `history`, `transaction`, ...)
    #[serde(rename = "type")]
    pub bundle_type: String,

    /// Total number of matches, when the server reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(default)]
    pub link: Vec<BundleLink>,

    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// URL of the `next` page, if the server announced one
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|link| link.relation == NEXT_RELATION)
            .map(|link| link.url.as_str())
    }

    /// Whether this bundle carries search results
    pub fn is_searchset(&self) -> bool {
        self.bundle_type == SEARCHSET
    }

    /// Consume the bundle, keeping the entry resources in entry order
    pub fn into_resources(self) -> Vec<Resource> {
        self.entry
            .into_iter()
            .filter_map(|entry| entry.resource)
            .collect()
    }
}

/// FHIR Reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Entry of a FHIR List
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub item: Reference,
}

/// FHIR List, used by OpenMRS to represent patient rosters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub entry: Vec<ListEntry>,
}

impl ListResource {
    /// References of every entry that points at a Patient, in list order
    pub fn patient_references(&self) -> impl Iterator<Item = &str> {
        self.entry
            .iter()
            .filter_map(|entry| entry.item.reference.as_deref())
            .filter(|reference| ResourceType::from_url(reference) == Some(ResourceType::Patient))
    }
}

/// Human readable part of a CodeableConcept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CodeableText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Issue of an OperationOutcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeIssue {
    #[serde(default)]
    pub severity: String,

    #[serde(default)]
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CodeableText>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// FHIR OperationOutcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    #[serde(default)]
    pub issue: Vec<OutcomeIssue>,
}

impl OperationOutcome {
    /// Diagnostic text of the first issue
    ///
    /// Falls back to the issue details text, then the issue code.
    pub fn diagnostics(&self) -> String {
        let Some(issue) = self.issue.first() else {
            return "OperationOutcome without issues".to_string();
        };

        issue
            .diagnostics
            .clone()
            .or_else(|| issue.details.as_ref().and_then(|d| d.text.clone()))
            .unwrap_or_else(|| format!("{} ({})", issue.code, issue.severity))
    }
}

/// One fetched page, classified by its `resourceType`
#[derive(Debug, Clone, PartialEq)]
pub enum FhirResource {
    OperationOutcome(OperationOutcome),
    Bundle(Bundle),
    List(ListResource),
    Other(Resource),
}

impl FhirResource {
    /// Parse a page from its JSON representation
    ///
    /// # Errors
    ///
    /// Returns `FhirError::InvalidResponse` if the JSON is not a FHIR resource
    /// or one of the modelled shapes fails to deserialize.
    pub fn from_json(value: Value) -> Result<Self> {
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("response is missing 'resourceType'"))?
            .to_string();

        let page = match resource_type.as_str() {
            "OperationOutcome" => {
                FhirResource::OperationOutcome(serde_json::from_value(value).map_err(invalid)?)
            }
            "Bundle" => FhirResource::Bundle(serde_json::from_value(value).map_err(invalid)?),
            "List" => FhirResource::List(serde_json::from_value(value).map_err(invalid)?),
            _ => FhirResource::Other(Resource::try_from(value).map_err(invalid)?),
        };

        Ok(page)
    }

    /// Parse a page from raw response bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(invalid)?;
        Self::from_json(value)
    }

    /// `resourceType` of this page
    pub fn type_name(&self) -> &str {
        match self {
            FhirResource::OperationOutcome(_) => "OperationOutcome",
            FhirResource::Bundle(_) => "Bundle",
            FhirResource::List(_) => "List",
            FhirResource::Other(resource) => &resource.resource_type,
        }
    }
}

fn invalid(err: impl ToString) -> FhirSyncError {
    FhirError::InvalidResponse(err.to_string()).into()
}
