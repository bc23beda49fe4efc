//! FHIR resource type classification
//!
//! Sync URLs, list references and bundle entries are all routed by resource
//! type. [`ResourceType`] is a closed lookup table of every FHIR R4 resource
//! type; anything else is reported as unrecognized rather than silently
//! mis-routed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares [`ResourceType`] with its lookup table and names from one list
macro_rules! resource_types {
    ($($name:ident),+ $(,)?) => {
        /// A FHIR R4 resource type
        ///
        /// # Examples
        ///
        /// ```
        /// use fhirsync::domain::ResourceType;
        ///
        /// assert_eq!(ResourceType::from_url("Patient?_count=50"), Some(ResourceType::Patient));
        /// assert_eq!(ResourceType::from_url("patient/123/$everything"), Some(ResourceType::Patient));
        /// assert_eq!(ResourceType::from_url("Widget?_count=50"), None);
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum ResourceType {
            $($name),+
        }

        impl ResourceType {
            /// Every FHIR R4 resource type, alphabetically
            pub const ALL: &'static [ResourceType] = &[$(ResourceType::$name),+];

            /// The FHIR name of this type, e.g. `"MedicationRequest"`
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ResourceType::$name => stringify!($name)),+
                }
            }
        }
    };
}

resource_types! {
    Account,
    ActivityDefinition,
    AdverseEvent,
    AllergyIntolerance,
    Appointment,
    AppointmentResponse,
    AuditEvent,
    Basic,
    Binary,
    BiologicallyDerivedProduct,
    BodyStructure,
    Bundle,
    CapabilityStatement,
    CarePlan,
    CareTeam,
    CatalogEntry,
    ChargeItem,
    ChargeItemDefinition,
    Claim,
    ClaimResponse,
    ClinicalImpression,
    CodeSystem,
    Communication,
    CommunicationRequest,
    CompartmentDefinition,
    Composition,
    ConceptMap,
    Condition,
    Consent,
    Contract,
    Coverage,
    CoverageEligibilityRequest,
    CoverageEligibilityResponse,
    DetectedIssue,
    Device,
    DeviceDefinition,
    DeviceMetric,
    DeviceRequest,
    DeviceUseStatement,
    DiagnosticReport,
    DocumentManifest,
    DocumentReference,
    EffectEvidenceSynthesis,
    Encounter,
    Endpoint,
    EnrollmentRequest,
    EnrollmentResponse,
    EpisodeOfCare,
    EventDefinition,
    Evidence,
    EvidenceVariable,
    ExampleScenario,
    ExplanationOfBenefit,
    FamilyMemberHistory,
    Flag,
    Goal,
    GraphDefinition,
    Group,
    GuidanceResponse,
    HealthcareService,
    ImagingStudy,
    Immunization,
    ImmunizationEvaluation,
    ImmunizationRecommendation,
    ImplementationGuide,
    InsurancePlan,
    Invoice,
    Library,
    Linkage,
    List,
    Location,
    Measure,
    MeasureReport,
    Media,
    Medication,
    MedicationAdministration,
    MedicationDispense,
    MedicationKnowledge,
    MedicationRequest,
    MedicationStatement,
    MedicinalProduct,
    MedicinalProductAuthorization,
    MedicinalProductContraindication,
    MedicinalProductIndication,
    MedicinalProductIngredient,
    MedicinalProductInteraction,
    MedicinalProductManufactured,
    MedicinalProductPackaged,
    MedicinalProductPharmaceutical,
    MedicinalProductUndesirableEffect,
    MessageDefinition,
    MessageHeader,
    MolecularSequence,
    NamingSystem,
    NutritionOrder,
    Observation,
    ObservationDefinition,
    OperationDefinition,
    OperationOutcome,
    Organization,
    OrganizationAffiliation,
    Parameters,
    Patient,
    PaymentNotice,
    PaymentReconciliation,
    Person,
    PlanDefinition,
    Practitioner,
    PractitionerRole,
    Procedure,
    Provenance,
    Questionnaire,
    QuestionnaireResponse,
    RelatedPerson,
    RequestGroup,
    ResearchDefinition,
    ResearchElementDefinition,
    ResearchStudy,
    ResearchSubject,
    RiskAssessment,
    RiskEvidenceSynthesis,
    Schedule,
    SearchParameter,
    ServiceRequest,
    Slot,
    Specimen,
    SpecimenDefinition,
    StructureDefinition,
    StructureMap,
    Subscription,
    Substance,
    SubstanceNucleicAcid,
    SubstancePolymer,
    SubstanceProtein,
    SubstanceReferenceInformation,
    SubstanceSourceMaterial,
    SubstanceSpecification,
    SupplyDelivery,
    SupplyRequest,
    Task,
    TerminologyCapabilities,
    TestReport,
    TestScript,
    ValueSet,
    VerificationResult,
    VisionPrescription,
}

impl ResourceType {
    /// Look up a type by its exact FHIR name, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }

    /// Classify a request URL or resource reference
    ///
    /// Relative URLs (`Patient?_count=50`, `Patient/1/$everything`) are
    /// classified by their first path segment. Absolute URLs such as
    /// server-issued `next` links are classified by the first path segment
    /// that names a known type, so `https://host/fhir/R4/Observation?...`
    /// resolves to `Observation`.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or_default();

        match path.find("://") {
            Some(scheme_end) => {
                let after_scheme = &path[scheme_end + 3..];
                let path = after_scheme
                    .find('/')
                    .map(|i| &after_scheme[i..])
                    .unwrap_or_default();
                path.split('/')
                    .filter(|segment| !segment.is_empty())
                    .find_map(Self::from_name)
            }
            None => path
                .split('/')
                .find(|segment| !segment.is_empty())
                .and_then(Self::from_name),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s.trim()).ok_or_else(|| format!("Unknown FHIR resource type: {s}"))
    }
}

impl AsRef<str> for ResourceType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Coverage?_count=50", ResourceType::Coverage)]
    #[test_case("Specimen?_count=50", ResourceType::Specimen)]
    #[test_case("Goal?_count=50", ResourceType::Goal)]
    #[test_case("Consent", ResourceType::Consent)]
    #[test_case("Device/7", ResourceType::Device)]
    #[test_case("ImagingStudy?patient=1", ResourceType::ImagingStudy)]
    #[test_case("MedicationAdministration", ResourceType::MedicationAdministration)]
    #[test_case("VisionPrescription", ResourceType::VisionPrescription)]
    fn test_classifies_r4_types(url: &str, expected: ResourceType) {
        assert_eq!(ResourceType::from_url(url), Some(expected));
        assert_eq!(expected.to_string(), url.split(['?', '/']).next().unwrap());
    }

    #[test]
    fn test_table_is_sorted_and_unique() {
        assert_eq!(ResourceType::ALL.len(), 146);
        for pair in ResourceType::ALL.windows(2) {
            assert!(pair[0].as_str() < pair[1].as_str());
        }
    }

    #[test]
    fn test_round_trip_names() {
        for t in ResourceType::ALL {
            assert_eq!(ResourceType::from_name(t.as_str()), Some(*t));
        }
    }

    #[test]
    fn test_from_url_is_case_insensitive() {
        assert_eq!(
            ResourceType::from_url("observation?_count=50"),
            Some(ResourceType::Observation)
        );
        assert_eq!(
            ResourceType::from_url("GROUP?location=abc"),
            Some(ResourceType::Group)
        );
    }

    #[test]
    fn test_prefix_of_longer_name_is_not_confused() {
        assert_eq!(
            ResourceType::from_url("MedicationRequest?_count=10"),
            Some(ResourceType::MedicationRequest)
        );
        assert_eq!(
            ResourceType::from_url("Medication?_count=10"),
            Some(ResourceType::Medication)
        );
        assert_eq!(ResourceType::from_url("PatientX?_count=10"), None);
    }

    #[test]
    fn test_from_url_everything_and_references() {
        assert_eq!(
            ResourceType::from_url("Patient/123/$everything"),
            Some(ResourceType::Patient)
        );
        assert_eq!(
            ResourceType::from_url("Patient/abc"),
            Some(ResourceType::Patient)
        );
    }

    #[test]
    fn test_from_url_absolute() {
        assert_eq!(
            ResourceType::from_url(
                "https://demo.openmrs.org/openmrs/ws/fhir2/R4/Encounter?_count=50&_getpages=x"
            ),
            Some(ResourceType::Encounter)
        );
        assert_eq!(
            ResourceType::from_url("https://host/fhir?_getpages=abc&page_token=1"),
            None
        );
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("Widget".parse::<ResourceType>().is_err());
        assert_eq!(
            " Task ".parse::<ResourceType>().unwrap(),
            ResourceType::Task
        );
    }

    #[test]
    fn test_serializes_as_name() {
        let json = serde_json::to_string(&ResourceType::QuestionnaireResponse).unwrap();
        assert_eq!(json, "\"QuestionnaireResponse\"");
    }
}
