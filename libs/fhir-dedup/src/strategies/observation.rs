//! Observation strategies
//!
//! Observations are split by category before matching, each partition with
//! its own grouping granularity:
//!
//! - **generic**: code (else display) + value, with a missing date matching
//!   any date
//! - **social history**: code (else display) + value only; merged records
//!   widen `effectivePeriod` to cover every instance
//! - **labs and vitals**: LOINC/SNOMED/CPT code + value + timestamp
//!
//! Every variant drops "unknown" codings from the merged `code` and resolves
//! status by precedence.

use super::{display_key, drop_unknown_codings};
use crate::codes::{extract_codes, is_placeholder, is_unknown_coding, known_codings, normalize_text, CodeSystem};
use crate::date::{date_from_string, lenient_date, DateFormat, DateSource, CLINICAL_EVENT_DATES};
use crate::fold::{
    flexible_keys, fold_resources, make_key, resolve_status, DeduplicationResult, FlexField, Keyed,
    MergeOptions,
};
use crate::status::OBSERVATION_STATUS;
use ferrum_models::{CodeableConcept, Period, Quantity, Resource};
use serde_json::{Map, Value};

const LAB_CODE_SYSTEMS: [CodeSystem; 3] = [CodeSystem::Loinc, CodeSystem::Snomed, CodeSystem::Cpt];

const LAB_DATES: &[DateSource] = &[
    DateSource::Instant("effectiveDateTime"),
    DateSource::Period("effectivePeriod"),
    DateSource::Instant("effectiveInstant"),
    DateSource::Instant("issued"),
];

/// Partition an observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationCategory {
    VitalsAndLabs,
    Social,
    Other,
}

/// Category from the first coded `category` entry
pub fn observation_category(resource: &Resource) -> ObservationCategory {
    let code = resource
        .get_list::<CodeableConcept>("category")
        .into_iter()
        .find_map(|c| c.coding.into_iter().next().and_then(|c| c.code));
    match code.as_deref().map(str::trim) {
        Some(c) if c.eq_ignore_ascii_case("vital-signs") || c.eq_ignore_ascii_case("laboratory") => {
            ObservationCategory::VitalsAndLabs
        }
        Some(c) if c.eq_ignore_ascii_case("social-history") => ObservationCategory::Social,
        _ => ObservationCategory::Other,
    }
}

/// Code identity of a concept, falling back to its display.
///
/// Placeholder codes never identify anything, even when the coding carries a
/// display of its own.
fn concept_identity(concept: &CodeableConcept) -> Option<String> {
    let codes = extract_codes(concept);
    if let Some((_, code)) = codes.first_of(&LAB_CODE_SYSTEMS) {
        return Some(make_key("code", code));
    }
    let other = concept
        .coding
        .iter()
        .filter(|c| !is_unknown_coding(c, None))
        .filter_map(|c| c.code.as_deref().map(str::trim))
        .find(|c| !c.is_empty() && !is_placeholder(c));
    if let Some(code) = other {
        return Some(make_key("code", code.to_lowercase()));
    }
    display_key(concept).map(|d| make_key("display", d))
}

fn concept_value(concept: &CodeableConcept) -> Option<String> {
    let mut codes: Vec<String> = known_codings(concept)
        .into_iter()
        .filter_map(|c| c.code)
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty() && !is_placeholder(c))
        .collect();
    codes.sort();
    codes.dedup();
    if !codes.is_empty() {
        return Some(codes.join(","));
    }
    display_key(concept)
}

fn canonical_value(field: &str, value: &Value) -> Option<String> {
    let rendered = match field {
        "valueQuantity" => {
            let q: Quantity = serde_json::from_value(value.clone()).ok()?;
            let unit = q.unit.or(q.code).map(|u| u.trim().to_lowercase()).unwrap_or_default();
            format!("{}{}{unit}", q.comparator.unwrap_or_default(), q.value?)
        }
        "valueCodeableConcept" => concept_value(&serde_json::from_value(value.clone()).ok()?)?,
        "valueString" => {
            let text = normalize_text(value.as_str()?);
            if text.is_empty() || is_placeholder(&text) {
                return None;
            }
            text
        }
        _ => serde_json::to_string(value).ok()?,
    };
    Some(format!("{field}={rendered}"))
}

fn value_of(fields: &Map<String, Value>) -> Option<String> {
    fields
        .iter()
        .filter(|(k, _)| k.len() > "value".len() && k.starts_with("value"))
        .find_map(|(k, v)| canonical_value(k, v))
}

/// Panel observations (blood pressure) carry their values in components
fn component_values(resource: &Resource) -> Option<String> {
    let Some(Value::Array(components)) = resource.get("component") else {
        return None;
    };
    let mut parts: Vec<String> = components
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|component| {
            let code = component
                .get("code")
                .and_then(|c| serde_json::from_value::<CodeableConcept>(c.clone()).ok())
                .and_then(|c| concept_identity(&c))?;
            Some(format!("{code}:{}", value_of(component)?))
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    parts.sort();
    Some(parts.join("|"))
}

fn observation_value(resource: &Resource) -> Option<String> {
    value_of(&resource.fields).or_else(|| component_values(resource))
}

fn generic_key(resource: &Resource) -> Keyed {
    let identity = resource.code().and_then(|c| concept_identity(&c));
    let (Some(identity), Some(value)) = (identity, observation_value(resource)) else {
        return Keyed::Dangling;
    };
    let date = lenient_date(resource, CLINICAL_EVENT_DATES, DateFormat::DateTime);
    Keyed::from_keys(flexible_keys(
        "observation",
        &[FlexField::exact(identity), FlexField::exact(value), FlexField::optional(date)],
    ))
}

fn social_key(resource: &Resource) -> Keyed {
    let identity = resource.code().and_then(|c| concept_identity(&c));
    match (identity, observation_value(resource)) {
        (Some(identity), Some(value)) => Keyed::single(make_key("social", (identity, value))),
        _ => Keyed::Dangling,
    }
}

fn lab_key(resource: &Resource) -> Keyed {
    let code = resource.code().and_then(|c| {
        extract_codes(&c)
            .first_of(&LAB_CODE_SYSTEMS)
            .map(|(_, code)| code.to_string())
    });
    let (Some(code), Some(value)) = (code, observation_value(resource)) else {
        return Keyed::Dangling;
    };
    let date = lenient_date(resource, LAB_DATES, DateFormat::DateTime);
    Keyed::single(make_key("lab", (code, value, date)))
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    drop_unknown_codings(merged, "code");
    resolve_status(&OBSERVATION_STATUS, merged, existing, incoming);
}

/// Earliest or latest of `candidates`, compared as UTC instants
fn extreme(candidates: Vec<String>, latest: bool) -> Option<String> {
    let parsed = candidates
        .into_iter()
        .filter_map(|raw| date_from_string(&raw, DateFormat::DateTime).ok().map(|n| (n, raw)));
    let picked = if latest {
        parsed.max_by(|a, b| a.0.cmp(&b.0))
    } else {
        parsed.min_by(|a, b| a.0.cmp(&b.0))
    };
    picked.map(|(_, raw)| raw)
}

/// Replace the effective date with a period spanning both records
fn widen_effective_period(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for resource in [existing, incoming] {
        let instant = resource.get_str("effectiveDateTime").map(str::to_string);
        let period = resource.get_as::<Period>("effectivePeriod").unwrap_or_default();
        starts.extend(period.start.clone().or_else(|| instant.clone()));
        ends.extend(period.end.or(instant).or(period.start));
    }
    let (start, end) = (extreme(starts, false), extreme(ends, true));
    if start.is_none() && end.is_none() {
        return;
    }

    let mut period = Map::new();
    if let Some(start) = start {
        period.insert("start".into(), Value::String(start));
    }
    if let Some(end) = end {
        period.insert("end".into(), Value::String(end));
    }
    merged.remove("effectiveDateTime");
    merged.set("effectivePeriod", Value::Object(period));
}

fn social_post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    widen_effective_period(merged, existing, incoming);
    post_merge(merged, existing, incoming);
}

/// Observations outside the social and lab/vital categories
pub fn deduplicate_observations(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), generic_key)
}

pub fn deduplicate_observations_social(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(social_post_merge), social_key)
}

pub fn deduplicate_observations_labs(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), lab_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation(id: &str, code: Value, value: Value, date: Option<&str>) -> Resource {
        let mut obs = json!({
            "resourceType": "Observation",
            "id": id,
            "status": "final",
            "code": code,
            "valueQuantity": value
        });
        if let Some(date) = date {
            obs["effectiveDateTime"] = json!(date);
        }
        Resource::from_value(obs).unwrap()
    }

    fn glucose() -> Value {
        json!({"coding": [{"system": "http://loinc.org", "code": "2345-7", "display": "Glucose"}]})
    }

    fn mg(value: f64) -> Value {
        json!({"value": value, "unit": "mg/dL"})
    }

    fn text_only(text: &str) -> Value {
        json!({"text": text})
    }

    fn unknown_with_text(text: &str) -> Value {
        json!({
            "coding": [{"system": "http://terminology.hl7.org/ValueSet/v3-Unknown", "code": "UNK", "display": "unknown"}],
            "text": text
        })
    }

    #[test]
    fn categorizes_by_first_category_coding() {
        let with_category = |code: &str| {
            Resource::from_value(json!({
                "resourceType": "Observation",
                "category": [{"coding": [{"system": "http://terminology.hl7.org/CodeSystem/observation-category", "code": code}]}]
            }))
            .unwrap()
        };
        assert_eq!(observation_category(&with_category("vital-signs")), ObservationCategory::VitalsAndLabs);
        assert_eq!(observation_category(&with_category("laboratory")), ObservationCategory::VitalsAndLabs);
        assert_eq!(observation_category(&with_category("social-history")), ObservationCategory::Social);
        assert_eq!(observation_category(&with_category("exam")), ObservationCategory::Other);
        let bare = Resource::from_value(json!({"resourceType": "Observation"})).unwrap();
        assert_eq!(observation_category(&bare), ObservationCategory::Other);
    }

    #[test]
    fn display_fallback_groups_identical_text() {
        let date = Some("2020-01-01T10:00:00Z");
        let result = deduplicate_observations(vec![
            observation("1", text_only("Pain score"), mg(4.0), date),
            observation("2", text_only("pain  score"), mg(4.0), date),
            observation("3", text_only("Fatigue score"), mg(4.0), date),
        ]);
        assert_eq!(result.resources.len(), 2);
        assert_eq!(
            result.replacement_map.get("Observation/1"),
            Some(&vec!["Observation/2".to_string()])
        );
    }

    #[test]
    fn missing_date_matches_any_date() {
        let result = deduplicate_observations(vec![
            observation("1", glucose(), mg(90.0), Some("2020-01-01T10:00:00Z")),
            observation("2", glucose(), mg(90.0), None),
        ]);
        assert_eq!(result.resources.len(), 1);
    }

    #[test]
    fn different_dates_or_values_stay_apart() {
        let result = deduplicate_observations(vec![
            observation("1", glucose(), mg(90.0), Some("2020-01-01T10:00:00Z")),
            observation("2", glucose(), mg(90.0), Some("2020-02-01T10:00:00Z")),
            observation("3", glucose(), mg(95.0), Some("2020-01-01T10:00:00Z")),
        ]);
        assert_eq!(result.resources.len(), 3);
    }

    #[test]
    fn unknown_codes_do_not_group_different_text() {
        let result = deduplicate_observations(vec![
            observation("1", unknown_with_text("Glucose"), mg(90.0), None),
            observation("2", unknown_with_text("Sodium"), mg(90.0), None),
        ]);
        assert_eq!(result.resources.len(), 2);
    }

    #[test]
    fn useless_observations_are_dangling() {
        let no_value = Resource::from_value(json!({
            "resourceType": "Observation",
            "id": "nv",
            "code": glucose()
        }))
        .unwrap();
        let no_code = observation("nc", unknown_with_text("unknown"), mg(1.0), None);
        let result = deduplicate_observations(vec![no_value, no_code]);
        assert!(result.resources.is_empty());
        assert!(result.dangling_references.contains("Observation/nv"));
        assert!(result.dangling_references.contains("Observation/nc"));
    }

    #[test]
    fn merge_drops_unknown_codings_and_keeps_others() {
        let local = json!({"coding": [
            {"system": "http://example.org/lab", "code": "GLU"},
            {"system": "http://terminology.hl7.org/ValueSet/v3-Unknown", "code": "UNK", "display": "unknown"}
        ]});
        let result = deduplicate_observations(vec![
            observation("1", local.clone(), mg(90.0), None),
            observation("2", local, mg(90.0), None),
        ]);
        assert_eq!(result.resources.len(), 1);
        let codings = result.resources[0].get("code").and_then(|c| c["coding"].as_array()).unwrap();
        assert_eq!(codings.len(), 1);
        assert_eq!(codings[0]["code"], json!("GLU"));
    }

    fn smoking(id: &str, effective: Value) -> Resource {
        let mut obs = json!({
            "resourceType": "Observation",
            "id": id,
            "status": "final",
            "category": [{"coding": [{"code": "social-history"}]}],
            "code": {"coding": [{"system": "http://loinc.org", "code": "72166-2"}]},
            "valueCodeableConcept": {"coding": [{"system": "http://snomed.info/sct", "code": "8517006", "display": "Former smoker"}]}
        });
        if let (Value::Object(obs), Value::Object(effective)) = (&mut obs, effective) {
            obs.extend(effective);
        }
        Resource::from_value(obs).unwrap()
    }

    #[test]
    fn social_history_widens_effective_period() {
        let result = deduplicate_observations_social(vec![
            smoking("1", json!({"effectiveDateTime": "2019-01-01"})),
            smoking("2", json!({"effectivePeriod": {"start": "2018-05-01", "end": "2019-06-01"}})),
            smoking("3", json!({"effectiveDateTime": "2021-03-03"})),
        ]);
        assert_eq!(result.resources.len(), 1);
        let merged = &result.resources[0];
        assert!(!merged.has("effectiveDateTime"));
        assert_eq!(
            merged.get("effectivePeriod"),
            Some(&json!({"start": "2018-05-01", "end": "2021-03-03"}))
        );
    }

    #[test]
    fn social_history_with_unknown_code_is_dangling() {
        let mut obs = smoking("x", json!({}));
        obs.set("code", unknown_with_text("unknown"));
        let result = deduplicate_observations_social(vec![obs]);
        assert!(result.dangling_references.contains("Observation/x"));
    }

    #[test]
    fn labs_key_on_code_value_and_timestamp() {
        let result = deduplicate_observations_labs(vec![
            observation("1", glucose(), mg(90.0), Some("2020-01-01T10:00:00Z")),
            observation("2", glucose(), mg(90.0), Some("2020-01-01T10:00:00.000+00:00")),
            observation("3", glucose(), mg(90.0), Some("2020-01-01T18:00:00Z")),
            observation("4", text_only("Glucose"), mg(90.0), Some("2020-01-01T10:00:00Z")),
        ]);
        assert_eq!(result.resources.len(), 2);
        assert!(result.dangling_references.contains("Observation/4"));
    }

    #[test]
    fn vitals_compare_component_values() {
        let bp = |id: &str, systolic: f64| {
            Resource::from_value(json!({
                "resourceType": "Observation",
                "id": id,
                "code": {"coding": [{"system": "http://loinc.org", "code": "85354-9"}]},
                "effectiveDateTime": "2020-01-01T10:00:00Z",
                "component": [
                    {"code": {"coding": [{"system": "http://loinc.org", "code": "8480-6"}]}, "valueQuantity": {"value": systolic, "unit": "mmHg"}},
                    {"code": {"coding": [{"system": "http://loinc.org", "code": "8462-4"}]}, "valueQuantity": {"value": 80, "unit": "mmHg"}}
                ]
            }))
            .unwrap()
        };
        let result = deduplicate_observations_labs(vec![bp("1", 120.0), bp("2", 120.0), bp("3", 135.0)]);
        assert_eq!(result.resources.len(), 2);
    }
}
