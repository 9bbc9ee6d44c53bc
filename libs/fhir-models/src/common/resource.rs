//! Resource model
//!
//! Version-agnostic representation of a FHIR resource: the `resourceType`
//! discriminant and logical id are typed, every other element is kept as an
//! order-preserving JSON object so the model round-trips losslessly.

use super::complex::{Address, CodeableConcept, Extension, HumanName, Identifier};
use super::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Resource kinds known to the deduplication toolkit.
///
/// The list is closed on purpose: code that routes or cleans resources by
/// kind matches on this enum exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    AllergyIntolerance,
    CarePlan,
    Composition,
    Condition,
    Coverage,
    Device,
    DiagnosticReport,
    DocumentReference,
    Encounter,
    FamilyMemberHistory,
    Immunization,
    Location,
    Medication,
    MedicationAdministration,
    MedicationDispense,
    MedicationRequest,
    MedicationStatement,
    Observation,
    Organization,
    Patient,
    Practitioner,
    Procedure,
    RelatedPerson,
}

impl ResourceType {
    pub const ALL: [ResourceType; 23] = [
        ResourceType::AllergyIntolerance,
        ResourceType::CarePlan,
        ResourceType::Composition,
        ResourceType::Condition,
        ResourceType::Coverage,
        ResourceType::Device,
        ResourceType::DiagnosticReport,
        ResourceType::DocumentReference,
        ResourceType::Encounter,
        ResourceType::FamilyMemberHistory,
        ResourceType::Immunization,
        ResourceType::Location,
        ResourceType::Medication,
        ResourceType::MedicationAdministration,
        ResourceType::MedicationDispense,
        ResourceType::MedicationRequest,
        ResourceType::MedicationStatement,
        ResourceType::Observation,
        ResourceType::Organization,
        ResourceType::Patient,
        ResourceType::Practitioner,
        ResourceType::Procedure,
        ResourceType::RelatedPerson,
    ];

    /// FHIR type name, as used in `resourceType` and in references
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::AllergyIntolerance => "AllergyIntolerance",
            ResourceType::CarePlan => "CarePlan",
            ResourceType::Composition => "Composition",
            ResourceType::Condition => "Condition",
            ResourceType::Coverage => "Coverage",
            ResourceType::Device => "Device",
            ResourceType::DiagnosticReport => "DiagnosticReport",
            ResourceType::DocumentReference => "DocumentReference",
            ResourceType::Encounter => "Encounter",
            ResourceType::FamilyMemberHistory => "FamilyMemberHistory",
            ResourceType::Immunization => "Immunization",
            ResourceType::Location => "Location",
            ResourceType::Medication => "Medication",
            ResourceType::MedicationAdministration => "MedicationAdministration",
            ResourceType::MedicationDispense => "MedicationDispense",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::MedicationStatement => "MedicationStatement",
            ResourceType::Observation => "Observation",
            ResourceType::Organization => "Organization",
            ResourceType::Patient => "Patient",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::Procedure => "Procedure",
            ResourceType::RelatedPerson => "RelatedPerson",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnsupportedResourceType(s.to_string()))
    }
}

/// A FHIR resource
///
/// `id` and `resourceType` are the identity of the resource; everything else
/// lives in `fields`, keyed by element name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "resourceType")]
    pub resource_type: ResourceType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Every other element of the resource
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Resource {
    /// Create an empty resource of the given type
    pub fn new(resource_type: ResourceType, id: Option<String>) -> Self {
        Self {
            resource_type,
            id,
            fields: Map::new(),
        }
    }

    /// Parse from a JSON value
    ///
    /// Unknown `resourceType` values yield [`Error::UnsupportedResourceType`],
    /// so callers can keep such resources aside untouched.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::InvalidResource("expected a JSON object".to_string()));
        };
        let resource_type = match fields.remove("resourceType") {
            Some(Value::String(s)) => s.parse::<ResourceType>()?,
            _ => return Err(Error::MissingField("resourceType".to_string())),
        };
        let id = match fields.remove("id") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(Error::InvalidFieldValue(format!("id must be a string, got {other}")))
            }
        };
        Ok(Self {
            resource_type,
            id,
            fields,
        })
    }

    /// Convert to a JSON value, `resourceType` and `id` first
    pub fn to_value(&self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 2);
        out.insert(
            "resourceType".to_string(),
            Value::String(self.resource_type.as_str().to_string()),
        );
        if let Some(id) = &self.id {
            out.insert("id".to_string(), Value::String(id.clone()));
        }
        for (k, v) in &self.fields {
            out.insert(k.clone(), v.clone());
        }
        Value::Object(out)
    }

    /// Relative reference to this resource (`Type/id`), if it has an id
    pub fn reference(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(|id| format!("{}/{}", self.resource_type, id))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// String element, if present and a string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Deserialize an element into a typed view
    ///
    /// Malformed elements are treated as absent.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.fields
            .get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Deserialize an array element into typed items, skipping malformed items
    pub fn get_list<T: DeserializeOwned>(&self, field: &str) -> Vec<T> {
        match self.fields.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The resource's extensions
    pub fn extensions(&self) -> Vec<Extension> {
        self.get_list("extension")
    }

    /// The `code` concept, for kinds whose identity starts from it
    pub fn code(&self) -> Option<CodeableConcept> {
        self.get_as("code")
    }

    pub fn identifiers(&self) -> Vec<Identifier> {
        self.get_list("identifier")
    }

    pub fn names(&self) -> Vec<HumanName> {
        self.get_list("name")
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.get_list("address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_serializes_resource() {
        let value = json!({
            "resourceType": "Condition",
            "id": "c1",
            "code": { "text": "Hypertension" }
        });

        let resource = Resource::from_value(value.clone()).unwrap();
        assert_eq!(resource.resource_type, ResourceType::Condition);
        assert_eq!(resource.id.as_deref(), Some("c1"));
        assert_eq!(resource.reference().as_deref(), Some("Condition/c1"));
        assert_eq!(resource.to_value(), value);
    }

    #[test]
    fn serde_derive_matches_manual_conversion() {
        let value = json!({"resourceType": "Medication", "id": "m1", "status": "active"});
        let derived: Resource = serde_json::from_value(value.clone()).unwrap();
        let manual = Resource::from_value(value).unwrap();
        assert_eq!(derived, manual);
    }

    #[test]
    fn rejects_unknown_resource_type() {
        let err = Resource::from_value(json!({"resourceType": "Basic", "id": "b"})).unwrap_err();
        assert!(matches!(err, Error::UnsupportedResourceType(t) if t == "Basic"));
    }

    #[test]
    fn rejects_missing_resource_type() {
        let err = Resource::from_value(json!({"id": "b"})).unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
    }

    #[test]
    fn malformed_fields_read_as_absent() {
        let resource =
            Resource::from_value(json!({"resourceType": "Observation", "code": "oops"})).unwrap();
        let code: Option<crate::CodeableConcept> = resource.get_as("code");
        assert!(code.is_none());
        assert!(resource.reference().is_none());
    }

    #[test]
    fn keyed_element_views() {
        let resource = Resource::from_value(json!({
            "resourceType": "Practitioner",
            "id": "p",
            "identifier": [{"system": "http://hl7.org/fhir/sid/us-npi", "value": "1234567893"}, 7],
            "name": [{"given": ["Gregory"], "family": "House"}],
            "address": [{"city": "Princeton"}]
        }))
        .unwrap();
        assert_eq!(resource.identifiers()[0].value.as_deref(), Some("1234567893"));
        assert_eq!(resource.identifiers().len(), 1);
        assert_eq!(resource.names()[0].family.as_deref(), Some("House"));
        assert_eq!(resource.addresses()[0].city.as_deref(), Some("Princeton"));
        assert!(resource.code().is_none());

        let condition =
            Resource::from_value(json!({"resourceType": "Condition", "code": {"text": "Asthma"}})).unwrap();
        assert_eq!(condition.code().and_then(|c| c.text).as_deref(), Some("Asthma"));
    }

    #[test]
    fn resource_type_round_trips_through_str() {
        for t in ResourceType::ALL {
            assert_eq!(t.as_str().parse::<ResourceType>().unwrap(), t);
        }
    }
}
