//! Procedure: CPT, SNOMED or display, each with the performed date.

use super::{display_key, retain_code_systems};
use crate::codes::{extract_codes, CodeSystem};
use crate::date::{lenient_date, DateFormat, PERFORMED_DATES};
use crate::fold::{fold_resources, make_key, resolve_status, DeduplicationResult, Keyed, MergeOptions};
use crate::status::PROCEDURE_STATUS;
use ferrum_models::Resource;

const PROCEDURE_CODE_SYSTEMS: [CodeSystem; 2] = [CodeSystem::Cpt, CodeSystem::Snomed];

fn procedure_key(resource: &Resource) -> Keyed {
    let Some(code) = resource.code() else {
        return Keyed::Dangling;
    };
    let codes = extract_codes(&code);
    let date = lenient_date(resource, PERFORMED_DATES, DateFormat::Date);
    Keyed::first_family([
        codes.cpt.as_ref().map(|c| make_key("cpt", (c, &date))),
        codes.snomed.as_ref().map(|c| make_key("snomed", (c, &date))),
        display_key(&code).map(|d| make_key("display", (d, &date))),
    ])
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    retain_code_systems(merged, "code", &PROCEDURE_CODE_SYSTEMS);
    resolve_status(&PROCEDURE_STATUS, merged, existing, incoming);
}

pub fn deduplicate_procedures(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), procedure_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn procedure(id: &str, code: Value, performed: &str, status: &str) -> Resource {
        Resource::from_value(json!({
            "resourceType": "Procedure",
            "id": id,
            "status": status,
            "code": code,
            "performedDateTime": performed
        }))
        .unwrap()
    }

    fn colonoscopy() -> Value {
        json!({"coding": [
            {"system": "http://www.ama-assn.org/go/cpt", "code": "45378"},
            {"system": "http://www.cms.gov/Medicare/Coding/ICD10", "code": "0DJD8ZZ"}
        ]})
    }

    #[test]
    fn merges_same_code_same_day_and_prunes_codings() {
        let result = deduplicate_procedures(vec![
            procedure("1", colonoscopy(), "2019-04-04T08:00:00Z", "in-progress"),
            procedure("2", colonoscopy(), "2019-04-04", "completed"),
        ]);
        assert_eq!(result.resources.len(), 1);
        let merged = &result.resources[0];
        assert_eq!(merged.get_str("status"), Some("completed"));
        let codings = merged.get("code").and_then(|c| c["coding"].as_array()).unwrap();
        assert_eq!(codings.len(), 1);
        assert_eq!(codings[0]["code"], json!("45378"));
    }

    #[test]
    fn display_family_needs_the_same_date() {
        let text = || json!({"text": "Appendectomy"});
        let result = deduplicate_procedures(vec![
            procedure("1", text(), "2010-01-01", "completed"),
            procedure("2", text(), "2010-01-01", "completed"),
            procedure("3", text(), "2012-01-01", "completed"),
        ]);
        assert_eq!(result.resources.len(), 2);
    }
}
