//! Condition: code + onset date.
//!
//! Key families in priority order: ICD-10, SNOMED, display text. After a
//! merge only ICD-10 and SNOMED codings are kept, if any are present.

use super::{display_key, retain_code_systems};
use crate::codes::{extract_codes, CodeSystem};
use crate::date::{lenient_date, DateFormat, CLINICAL_EVENT_DATES};
use crate::fold::{fold_resources, make_key, DeduplicationResult, Keyed, MergeOptions};
use ferrum_models::Resource;

const RELEVANT_SYSTEMS: [CodeSystem; 2] = [CodeSystem::Icd10, CodeSystem::Snomed];

fn condition_key(resource: &Resource) -> Keyed {
    let Some(code) = resource.code() else {
        return Keyed::Dangling;
    };
    let codes = extract_codes(&code);
    let date = lenient_date(resource, CLINICAL_EVENT_DATES, DateFormat::Date);
    Keyed::first_family([
        codes.icd10.as_ref().map(|c| make_key("icd10", (c, &date))),
        codes.snomed.as_ref().map(|c| make_key("snomed", (c, &date))),
        display_key(&code).map(|d| make_key("display", (d, &date))),
    ])
}

fn post_merge(merged: &mut Resource, _existing: &Resource, _incoming: &Resource) {
    retain_code_systems(merged, "code", &RELEVANT_SYSTEMS);
}

pub fn deduplicate_conditions(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), condition_key)
}
