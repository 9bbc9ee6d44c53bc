use ferrum_models::{
    Bundle, BundleType, CodeableConcept, Error, HumanName, Identifier, Period, Resource, ResourceType,
};
use serde_json::json;

fn searchset() -> serde_json::Value {
    json!({
        "resourceType": "Bundle",
        "id": "b1",
        "type": "searchset",
        "meta": {"lastUpdated": "2024-01-01T00:00:00Z"},
        "entry": [
            {"fullUrl": "urn:uuid:1", "resource": {
                "resourceType": "Patient",
                "id": "p1",
                "name": [{"given": ["Ada"], "family": "Lovelace"}],
                "identifier": [{"system": "urn:mrn", "value": "42"}]
            }},
            {"resource": {
                "resourceType": "Encounter",
                "id": "e1",
                "period": {"start": "2020-01-01T10:00:00Z", "end": "2020-01-01T11:00:00Z"},
                "subject": {"reference": "Patient/p1"}
            }},
            {"resource": {"resourceType": "Basic", "id": "x"}},
            {"request": {"method": "GET", "url": "Patient?name=ada"}}
        ]
    })
}

#[test]
fn parse_searchset_bundle() {
    let bundle = Bundle::from_value(&searchset()).expect("bundle should parse");

    assert_eq!(bundle.bundle_type, BundleType::Searchset);
    assert_eq!(bundle.entry_count(), 4);
    assert_eq!(bundle.resources().count(), 3);
    assert!(bundle.extensions.contains_key("meta"));

    let typed = bundle.typed_resources();
    let types: Vec<ResourceType> = typed.iter().map(|r| r.resource_type).collect();
    assert_eq!(types, vec![ResourceType::Patient, ResourceType::Encounter]);
}

#[test]
fn typed_views_over_bundle_resources() {
    let bundle = Bundle::from_value(&searchset()).expect("bundle should parse");
    let typed = bundle.typed_resources();

    let patient = &typed[0];
    let names: Vec<HumanName> = patient.get_list("name");
    assert_eq!(names[0].family.as_deref(), Some("Lovelace"));
    let identifiers: Vec<Identifier> = patient.get_list("identifier");
    assert_eq!(identifiers[0].value.as_deref(), Some("42"));

    let encounter = &typed[1];
    let period: Period = encounter.get_as("period").expect("period should be present");
    assert_eq!(period.start.as_deref(), Some("2020-01-01T10:00:00Z"));
    assert_eq!(encounter.reference().as_deref(), Some("Encounter/e1"));
}

#[test]
fn resource_survives_json_round_trip() {
    let value = json!({
        "resourceType": "Condition",
        "id": "c1",
        "code": {"coding": [{"system": "http://snomed.info/sct", "code": "38341003"}]},
        "onsetDateTime": "2020-05-01"
    });
    let resource = Resource::from_value(value.clone()).expect("condition should parse");
    assert_eq!(resource.to_value(), value);

    let code: CodeableConcept = resource.get_as("code").expect("code should be present");
    assert_eq!(code.coding[0].code.as_deref(), Some("38341003"));
}

#[test]
fn rejects_non_string_id() {
    let err = Resource::from_value(json!({"resourceType": "Condition", "id": 7})).unwrap_err();
    assert!(matches!(err, Error::InvalidFieldValue(_)));
}
