#![allow(dead_code)]

use ferrum_dedup::{Bundle, BundleType, DedupOutcome, Deduplicator, Resource, ResourceGraph, RunContext};
use serde_json::{json, Value};
use std::collections::HashSet;

pub const RXNORM: &str = "http://www.nlm.nih.gov/research/umls/rxnorm";
pub const ICD10: &str = "http://hl7.org/fhir/sid/icd-10-cm";
pub const LOINC: &str = "http://loinc.org";
pub const NPI: &str = "http://hl7.org/fhir/sid/us-npi";

pub fn resource(value: Value) -> Resource {
    Resource::from_value(value).expect("test resource must parse")
}

/// Overlay `extra`'s top-level fields onto `base`
pub fn with(mut base: Value, extra: Value) -> Value {
    if let (Value::Object(base), Value::Object(extra)) = (&mut base, extra) {
        base.extend(extra);
    }
    base
}

pub fn patient() -> Resource {
    resource(json!({"resourceType": "Patient", "id": "pat"}))
}

pub fn medication(id: &str, rxnorm: &str) -> Resource {
    resource(json!({
        "resourceType": "Medication",
        "id": id,
        "code": {"coding": [{"system": RXNORM, "code": rxnorm}]}
    }))
}

pub fn blacklisted_medication(id: &str) -> Resource {
    resource(json!({
        "resourceType": "Medication",
        "id": id,
        "code": {"text": "No known medications"}
    }))
}

pub fn medication_request(id: &str, medication: &str, status: &str) -> Resource {
    resource(json!({
        "resourceType": "MedicationRequest",
        "id": id,
        "status": status,
        "medicationReference": {"reference": medication},
        "subject": {"reference": "Patient/pat"},
        "authoredOn": "2023-02-01"
    }))
}

pub fn medication_statement(id: &str, medication: &str, start: &str) -> Resource {
    resource(json!({
        "resourceType": "MedicationStatement",
        "id": id,
        "status": "active",
        "medicationReference": {"reference": medication},
        "subject": {"reference": "Patient/pat"},
        "effectivePeriod": {"start": start}
    }))
}

pub fn condition(id: &str, icd10: &str, onset: &str) -> Resource {
    resource(json!({
        "resourceType": "Condition",
        "id": id,
        "subject": {"reference": "Patient/pat"},
        "code": {"coding": [{"system": ICD10, "code": icd10}]},
        "onsetDateTime": onset
    }))
}

pub fn organization(id: &str, name: &str, line: &str) -> Resource {
    resource(json!({
        "resourceType": "Organization",
        "id": id,
        "name": name,
        "address": [{"line": [line], "city": "Springfield", "state": "IL", "postalCode": "62701"}]
    }))
}

pub fn practitioner(id: &str, given: &str, family: &str, npi: &str) -> Resource {
    resource(json!({
        "resourceType": "Practitioner",
        "id": id,
        "name": [{"given": [given], "family": family}],
        "identifier": [{"system": NPI, "value": npi}]
    }))
}

pub fn text_observation(id: &str, text: &str, value: f64, date: &str) -> Resource {
    resource(json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": {"text": text},
        "valueQuantity": {"value": value, "unit": "score"},
        "effectiveDateTime": date
    }))
}

pub fn lab(id: &str, loinc: &str, value: f64, date: &str) -> Resource {
    resource(json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "category": [{"coding": [{"code": "laboratory"}]}],
        "code": {"coding": [{"system": LOINC, "code": loinc}]},
        "valueQuantity": {"value": value, "unit": "mg/dL"},
        "effectiveDateTime": date
    }))
}

pub fn diagnostic_report(id: &str, results: &[&str], performers: &[&str]) -> Resource {
    let refs = |items: &[&str]| items.iter().map(|r| json!({"reference": r})).collect::<Vec<_>>();
    resource(json!({
        "resourceType": "DiagnosticReport",
        "id": id,
        "status": "final",
        "result": refs(results),
        "performer": refs(performers)
    }))
}

pub fn composition(id: &str, authors: &[&str], entries: &[&str]) -> Resource {
    let refs = |items: &[&str]| items.iter().map(|r| json!({"reference": r})).collect::<Vec<_>>();
    resource(json!({
        "resourceType": "Composition",
        "id": id,
        "status": "final",
        "author": refs(authors),
        "section": [{"title": "Summary", "entry": refs(entries)}]
    }))
}

pub fn bundle(resources: Vec<Resource>) -> Bundle {
    Bundle::from_resources(BundleType::Collection, resources.iter().map(Resource::to_value))
}

pub fn run(resources: Vec<Resource>) -> DedupOutcome {
    Deduplicator::default().run(ResourceGraph::from_resources(resources), &RunContext::default())
}

pub fn ids_of(resources: &[Resource]) -> Vec<&str> {
    resources.iter().filter_map(|r| r.id.as_deref()).collect()
}

/// Every `reference` string anywhere below `value`
pub fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("reference", Value::String(reference)) => out.push(reference.clone()),
                    _ => collect_references(child, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        _ => {}
    }
}

fn raw_reference(value: &Value) -> Option<String> {
    Some(format!("{}/{}", value["resourceType"].as_str()?, value["id"].as_str()?))
}

/// References in `graph`, unmodelled entries included, whose target is not in `graph`
pub fn unresolved_references(graph: &ResourceGraph) -> Vec<String> {
    let present: HashSet<String> = graph
        .iter()
        .filter_map(Resource::reference)
        .chain(graph.unmodelled().filter_map(raw_reference))
        .collect();
    let mut refs = Vec::new();
    for resource in graph.iter() {
        for value in resource.fields.values() {
            collect_references(value, &mut refs);
        }
    }
    for value in graph.unmodelled() {
        collect_references(value, &mut refs);
    }
    refs.retain(|r| !present.contains(r));
    refs
}
