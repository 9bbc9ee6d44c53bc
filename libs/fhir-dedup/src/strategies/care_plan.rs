//! CarePlan: title and category anchor the match, date is a wildcard.

use super::concept_fingerprint;
use crate::codes::normalize_text;
use crate::date::{lenient_date, DateFormat, DateSource};
use crate::fold::{
    flexible_keys, fold_resources, resolve_status, DeduplicationResult, FlexField, Keyed, MergeOptions,
};
use crate::status::CARE_PLAN_STATUS;
use ferrum_models::{CodeableConcept, Resource};

const CARE_PLAN_DATES: &[DateSource] = &[DateSource::Period("period"), DateSource::Instant("created")];

fn categories(resource: &Resource) -> Option<String> {
    let mut fingerprints: Vec<String> = resource
        .get_list::<CodeableConcept>("category")
        .iter()
        .filter_map(concept_fingerprint)
        .collect();
    fingerprints.sort();
    fingerprints.dedup();
    (!fingerprints.is_empty()).then(|| fingerprints.join("|"))
}

fn care_plan_key(resource: &Resource) -> Keyed {
    let title = resource.get_str("title").map(normalize_text).filter(|t| !t.is_empty());
    let date = lenient_date(resource, CARE_PLAN_DATES, DateFormat::Date);
    Keyed::from_keys(flexible_keys(
        "care-plan",
        &[
            FlexField::anchor(title),
            FlexField::anchor(categories(resource)),
            FlexField::optional(date),
        ],
    ))
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&CARE_PLAN_STATUS, merged, existing, incoming);
}

pub fn deduplicate_care_plans(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), care_plan_key)
}
