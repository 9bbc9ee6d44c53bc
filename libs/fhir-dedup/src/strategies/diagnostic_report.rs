//! DiagnosticReport: any of several independent signals identifies a report.
//!
//! - a hash of the result references
//! - a hash of the presented forms
//! - report code + date + performers
//! - report display + date + performers
//!
//! Date and performers are wildcards when missing. A report with neither
//! results nor presented forms carries nothing worth keeping and is dangling.

use super::{display_key, references_at};
use crate::codes::{extract_codes, CodeSystem};
use crate::date::{lenient_date, DateFormat, DateSource};
use crate::fold::{
    flexible_keys, fold_resources, make_key, resolve_status, DeduplicationResult, FlexField, KeySet, Keyed,
    MergeOptions,
};
use crate::status::DIAGNOSTIC_REPORT_STATUS;
use ferrum_models::{Attachment, Resource};
use sha2::{Digest, Sha256};

const REPORT_DATES: &[DateSource] = &[
    DateSource::Instant("effectiveDateTime"),
    DateSource::Period("effectivePeriod"),
    DateSource::Instant("issued"),
];

const REPORT_CODE_SYSTEMS: [CodeSystem; 3] = [CodeSystem::Loinc, CodeSystem::Snomed, CodeSystem::Cpt];

fn content_hash<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn presented_form_hash(resource: &Resource) -> Option<String> {
    let mut forms: Vec<String> = resource
        .get_list::<Attachment>("presentedForm")
        .into_iter()
        .filter_map(|a| a.hash.or(a.data).or(a.url))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if forms.is_empty() {
        return None;
    }
    forms.sort();
    forms.dedup();
    Some(content_hash(forms.iter().map(String::as_str)))
}

fn diagnostic_report_key(resource: &Resource) -> Keyed {
    let results = references_at(resource, "result");
    let form_hash = presented_form_hash(resource);
    if results.is_empty() && form_hash.is_none() {
        return Keyed::Dangling;
    }

    let mut keys = KeySet::default();
    if !results.is_empty() {
        keys.extend(KeySet::single(make_key("result", content_hash(results.iter().map(String::as_str)))));
    }
    if let Some(hash) = form_hash {
        keys.extend(KeySet::single(make_key("presented-form", hash)));
    }

    let date = lenient_date(resource, REPORT_DATES, DateFormat::DateTime);
    let performers = references_at(resource, "performer");
    let performers = (!performers.is_empty()).then(|| performers.join(","));
    if let Some(code) = resource.code() {
        if let Some((_, c)) = extract_codes(&code).first_of(&REPORT_CODE_SYSTEMS) {
            keys.extend(flexible_keys(
                "code",
                &[
                    FlexField::exact(c),
                    FlexField::optional(date.clone()),
                    FlexField::optional(performers.clone()),
                ],
            ));
        }
        if let Some(display) = display_key(&code) {
            keys.extend(flexible_keys(
                "display",
                &[
                    FlexField::exact(display),
                    FlexField::optional(date),
                    FlexField::optional(performers),
                ],
            ));
        }
    }
    Keyed::from_keys(keys)
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&DIAGNOSTIC_REPORT_STATUS, merged, existing, incoming);
}

pub fn deduplicate_diagnostic_reports(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), diagnostic_report_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn report(id: &str, extra: Value) -> Resource {
        let mut value = json!({"resourceType": "DiagnosticReport", "id": id, "status": "final"});
        if let (Value::Object(base), Value::Object(extra)) = (&mut value, extra) {
            base.extend(extra);
        }
        Resource::from_value(value).unwrap()
    }

    fn results() -> Value {
        json!([{"reference": "Observation/1"}, {"reference": "Observation/2"}])
    }

    fn form() -> Value {
        json!([{"contentType": "text/html", "data": "PGgxPkxhYjwvaDE+"}])
    }

    fn metabolic_loinc() -> Value {
        json!({"coding": [{"system": "http://loinc.org", "code": "24323-8", "display": "Comprehensive metabolic panel"}]})
    }

    fn metabolic_other() -> Value {
        json!({"coding": [{"system": "http://example.org/lab", "code": "CMP", "display": "Comprehensive Metabolic Panel"}]})
    }

    fn a1c_loinc() -> Value {
        json!({"coding": [{"system": "http://loinc.org", "code": "4548-4", "display": "Hemoglobin A1c"}]})
    }

    fn dedup(reports: Vec<Resource>) -> usize {
        deduplicate_diagnostic_reports(reports).resources.len()
    }

    #[test]
    fn groups_same_result_even_if_one_is_missing_date() {
        assert_eq!(
            dedup(vec![
                report("1", json!({"result": results(), "effectiveDateTime": "2020-01-01T10:00:00Z"})),
                report("2", json!({"result": results()})),
            ]),
            1
        );
    }

    #[test]
    fn groups_same_presented_form() {
        assert_eq!(
            dedup(vec![report("1", json!({"presentedForm": form()})), report("2", json!({"presentedForm": form()}))]),
            1
        );
    }

    #[test]
    fn does_not_group_different_dates() {
        let a = report(
            "1",
            json!({"presentedForm": form(), "code": a1c_loinc(), "effectiveDateTime": "2020-01-01T10:00:00Z"}),
        );
        let b = report(
            "2",
            json!({"result": results(), "code": a1c_loinc(), "effectiveDateTime": "2021-01-01T10:00:00Z"}),
        );
        assert_eq!(dedup(vec![a, b]), 2);
    }

    #[test]
    fn discards_reports_without_result_or_form() {
        let result = deduplicate_diagnostic_reports(vec![report("1", json!({"code": a1c_loinc()}))]);
        assert!(result.resources.is_empty());
        assert!(result.dangling_references.contains("DiagnosticReport/1"));
    }

    #[test]
    fn groups_lab_panels_with_same_code_and_datetime() {
        let date = json!("2020-01-01T10:00:00Z");
        let a = report("1", json!({"result": results(), "code": a1c_loinc(), "effectiveDateTime": date}));
        let b = report("2", json!({"presentedForm": form(), "code": a1c_loinc(), "effectiveDateTime": date}));
        assert_eq!(dedup(vec![a, b]), 1);
    }

    #[test]
    fn groups_same_display_even_if_codes_differ() {
        let date = json!("2020-01-01T10:00:00Z");
        let a = report("1", json!({"result": results(), "code": metabolic_loinc(), "effectiveDateTime": date}));
        let b = report("2", json!({"presentedForm": form(), "code": metabolic_other(), "effectiveDateTime": date}));
        assert_eq!(dedup(vec![a, b]), 1);
    }

    #[test]
    fn different_loinc_codes_do_not_group() {
        let date = json!("2020-01-01T10:00:00Z");
        let a = report("1", json!({"result": results(), "code": metabolic_loinc(), "effectiveDateTime": date}));
        let b = report("2", json!({"presentedForm": form(), "code": a1c_loinc(), "effectiveDateTime": date}));
        assert_eq!(dedup(vec![a, b]), 2);
    }

    #[test]
    fn missing_date_is_a_wildcard_for_code_keys() {
        let a = report(
            "1",
            json!({"result": results(), "code": metabolic_loinc(), "effectiveDateTime": "2020-01-01T10:00:00Z"}),
        );
        let b = report("2", json!({"presentedForm": form(), "code": metabolic_other()}));
        assert_eq!(dedup(vec![a, b]), 1);
    }

    #[test]
    fn keeps_all_codings_after_merge() {
        let a = report("1", json!({"presentedForm": form(), "code": metabolic_loinc()}));
        let b = report("2", json!({"presentedForm": form(), "code": metabolic_other()}));
        let result = deduplicate_diagnostic_reports(vec![a, b]);
        let codings = result.resources[0].get("code").and_then(|c| c["coding"].as_array()).unwrap();
        assert_eq!(codings.len(), 2);
    }
}
