//! Per-type matching strategies
//!
//! Each strategy keys its resources and hands them to
//! [`fold_resources`](crate::fold::fold_resources). The key rules live next to
//! the type they describe; the helpers below are shared.

pub mod allergy_intolerance;
pub mod care_plan;
pub mod composition;
pub mod condition;
pub mod coverage;
pub mod diagnostic_report;
pub mod encounter;
pub mod family_member_history;
pub mod immunization;
pub mod location;
pub mod medication;
pub mod medication_related;
pub mod observation;
pub mod organization;
pub mod practitioner;
pub mod procedure;
pub mod related_person;

pub use allergy_intolerance::deduplicate_allergy_intolerances;
pub use care_plan::deduplicate_care_plans;
pub use composition::deduplicate_compositions;
pub use condition::deduplicate_conditions;
pub use coverage::deduplicate_coverages;
pub use diagnostic_report::deduplicate_diagnostic_reports;
pub use encounter::deduplicate_encounters;
pub use family_member_history::deduplicate_family_member_histories;
pub use immunization::deduplicate_immunizations;
pub use location::deduplicate_locations;
pub use medication::deduplicate_medications;
pub use medication_related::{
    deduplicate_medication_administrations, deduplicate_medication_dispenses,
    deduplicate_medication_requests, deduplicate_medication_statements,
};
pub use observation::{
    deduplicate_observations, deduplicate_observations_labs, deduplicate_observations_social,
    observation_category, ObservationCategory,
};
pub use organization::deduplicate_organizations;
pub use practitioner::deduplicate_practitioners;
pub use procedure::deduplicate_procedures;
pub use related_person::deduplicate_related_persons;

use crate::address::normalize_address;
use crate::codes::{
    extract_display_from_concept, has_blacklisted_text, is_unknown_coding, known_codings, normalize_text,
    CodeSystem,
};
use ferrum_models::{Address, CodeableConcept, Coding, HumanName, Reference, Resource};
use serde_json::Value;

/// `reference` string of a Reference element
pub(crate) fn reference_at(resource: &Resource, field: &str) -> Option<String> {
    resource
        .get_as::<Reference>(field)
        .and_then(|r| r.reference)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Sorted, de-duplicated `reference` strings of a Reference array
pub(crate) fn references_at(resource: &Resource, field: &str) -> Vec<String> {
    let mut refs: Vec<String> = resource
        .get_list::<Reference>(field)
        .into_iter()
        .filter_map(|r| r.reference)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    refs.sort();
    refs.dedup();
    refs
}

pub(crate) fn concept_at(resource: &Resource, field: &str) -> Option<CodeableConcept> {
    resource.get_as::<CodeableConcept>(field)
}

/// Normalized display of a concept, for display-based key families
pub(crate) fn display_key(concept: &CodeableConcept) -> Option<String> {
    extract_display_from_concept(concept).map(|d| normalize_text(&d))
}

/// Identity of a concept that says something: its known codes, else its
/// display. Blacklisted ("no known ...") concepts have none.
pub(crate) fn concept_fingerprint(concept: &CodeableConcept) -> Option<String> {
    if has_blacklisted_text(concept) {
        return None;
    }
    let mut codes: Vec<String> = known_codings(concept)
        .into_iter()
        .filter_map(|c| c.code)
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    codes.sort();
    codes.dedup();
    if !codes.is_empty() {
        return Some(codes.join(","));
    }
    display_key(concept)
}

/// First name rendered as `given family`, lowercased
pub(crate) fn human_name_key(names: &[HumanName]) -> Option<String> {
    let name = names.first()?;
    let mut parts: Vec<String> = name.given.clone();
    if let Some(family) = &name.family {
        parts.push(family.clone());
    }
    let rendered = if parts.iter().all(|p| p.trim().is_empty()) {
        name.text.clone().unwrap_or_default()
    } else {
        parts.join(" ")
    };
    let key = normalize_text(&rendered);
    (!key.is_empty()).then_some(key)
}

/// Normalized first address as a key fragment
pub(crate) fn address_key(addresses: &[Address]) -> Option<String> {
    let normalized = normalize_address(addresses.first()?);
    if normalized.is_empty() {
        return None;
    }
    serde_json::to_string(&normalized).ok()
}

/// Drop unknown placeholder codings from a concept element
pub(crate) fn drop_unknown_codings(resource: &mut Resource, field: &str) {
    let Some(Value::Object(concept)) = resource.get_mut(field) else {
        return;
    };
    let Some(Value::Array(codings)) = concept.get_mut("coding") else {
        return;
    };
    codings.retain(|c| {
        serde_json::from_value::<Coding>(c.clone()).map_or(true, |coding| !is_unknown_coding(&coding, None))
    });
    if codings.is_empty() {
        concept.remove("coding");
    }
}

/// Keep only codings of `systems`, unless that would leave none
pub(crate) fn retain_code_systems(resource: &mut Resource, field: &str, systems: &[CodeSystem]) {
    let Some(Value::Array(codings)) = resource.get_mut(field).and_then(|c| c.get_mut("coding")) else {
        return;
    };
    let relevant = |coding: &Value| {
        coding
            .get("system")
            .and_then(Value::as_str)
            .is_some_and(|s| systems.iter().any(|cs| cs.matches(s)))
    };
    if codings.iter().any(relevant) {
        codings.retain(relevant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_prefers_codes() {
        let c: CodeableConcept = serde_json::from_value(json!({
            "coding": [{"system": "http://snomed.info/sct", "code": "227493005"}],
            "text": "Cashew nuts"
        }))
        .unwrap();
        assert_eq!(concept_fingerprint(&c).as_deref(), Some("227493005"));

        let text_only: CodeableConcept = serde_json::from_value(json!({"text": "Cashew  Nuts"})).unwrap();
        assert_eq!(concept_fingerprint(&text_only).as_deref(), Some("cashew nuts"));

        let none: CodeableConcept = serde_json::from_value(json!({"text": "No known allergies"})).unwrap();
        assert_eq!(concept_fingerprint(&none), None);
    }

    #[test]
    fn retains_relevant_systems_only_when_present() {
        let mut r = Resource::from_value(json!({
            "resourceType": "Condition",
            "code": {"coding": [
                {"system": "http://snomed.info/sct", "code": "1"},
                {"system": "http://example.org/local", "code": "x"}
            ]}
        }))
        .unwrap();
        retain_code_systems(&mut r, "code", &[CodeSystem::Snomed, CodeSystem::Icd10]);
        assert_eq!(r.get("code"), Some(&json!({"coding": [{"system": "http://snomed.info/sct", "code": "1"}]})));

        let mut local = Resource::from_value(json!({
            "resourceType": "Condition",
            "code": {"coding": [{"system": "http://example.org/local", "code": "x"}]}
        }))
        .unwrap();
        retain_code_systems(&mut local, "code", &[CodeSystem::Snomed]);
        assert_eq!(local.get("code").and_then(|c| c["coding"].as_array()).map(Vec::len), Some(1));
    }

    #[test]
    fn human_name_key_uses_given_and_family() {
        let names: Vec<HumanName> =
            serde_json::from_value(json!([{"given": ["Jane", "Q"], "family": "Doe"}])).unwrap();
        assert_eq!(human_name_key(&names).as_deref(), Some("jane q doe"));
        let text: Vec<HumanName> = serde_json::from_value(json!([{"text": "Dr. Who"}])).unwrap();
        assert_eq!(human_name_key(&text).as_deref(), Some("dr. who"));
    }
}
