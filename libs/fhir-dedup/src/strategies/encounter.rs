//! Encounter: period start (full timestamp) + status + class.
//!
//! Encounters without a date cannot be matched but are still kept.

use crate::date::{lenient_date, DateFormat, DateSource};
use crate::fold::{fold_resources, make_key, DeduplicationResult, Keyed, MergeOptions};
use ferrum_models::{Coding, Resource};

const ENCOUNTER_DATES: &[DateSource] = &[DateSource::Period("period")];

fn encounter_key(resource: &Resource) -> Keyed {
    let Some(date) = lenient_date(resource, ENCOUNTER_DATES, DateFormat::DateTime) else {
        return Keyed::PassThrough;
    };
    let status = resource.get_str("status").map(str::to_lowercase);
    let class = resource
        .get_as::<Coding>("class")
        .and_then(|c| c.code.or(c.display))
        .map(|c| c.trim().to_lowercase());
    Keyed::single(make_key("encounter", (date, status, class)))
}

pub fn deduplicate_encounters(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::default(), encounter_key)
}
