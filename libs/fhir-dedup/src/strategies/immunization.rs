//! Immunization: vaccine code + occurrence date, CVX first, then NDC.

use super::concept_at;
use crate::codes::extract_codes;
use crate::date::{lenient_date, DateFormat, CLINICAL_EVENT_DATES};
use crate::fold::{fold_resources, make_key, resolve_status, DeduplicationResult, Keyed, MergeOptions};
use crate::status::IMMUNIZATION_STATUS;
use ferrum_models::Resource;

fn immunization_key(resource: &Resource) -> Keyed {
    let Some(vaccine) = concept_at(resource, "vaccineCode") else {
        return Keyed::Dangling;
    };
    let codes = extract_codes(&vaccine);
    let date = lenient_date(resource, CLINICAL_EVENT_DATES, DateFormat::Date);
    Keyed::first_family([
        codes.cvx.as_ref().map(|c| make_key("cvx", (c, &date))),
        codes.ndc.as_ref().map(|c| make_key("ndc", (c, &date))),
    ])
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&IMMUNIZATION_STATUS, merged, existing, incoming);
}

pub fn deduplicate_immunizations(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), immunization_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flu_shot(id: &str, date: &str, status: &str) -> Resource {
        Resource::from_value(json!({
            "resourceType": "Immunization",
            "id": id,
            "status": status,
            "vaccineCode": {"coding": [{"system": "http://hl7.org/fhir/sid/cvx", "code": "140"}]},
            "occurrenceDateTime": date
        }))
        .unwrap()
    }

    #[test]
    fn merges_same_vaccine_same_day() {
        let result = deduplicate_immunizations(vec![
            flu_shot("1", "2021-10-01", "not-done"),
            flu_shot("2", "2021-10-01T09:00:00Z", "completed"),
            flu_shot("3", "2022-10-01", "completed"),
        ]);
        assert_eq!(result.resources.len(), 2);
        assert_eq!(result.resources[0].get_str("status"), Some("completed"));
    }

    #[test]
    fn uncoded_vaccine_is_dangling() {
        let r = Resource::from_value(json!({
            "resourceType": "Immunization",
            "id": "x",
            "vaccineCode": {"text": "Flu"}
        }))
        .unwrap();
        assert!(deduplicate_immunizations(vec![r]).dangling_references.contains("Immunization/x"));
    }
}
