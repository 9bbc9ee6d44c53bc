//! Coverage: payors + subscriber id + period start.

use super::references_at;
use crate::date::{lenient_date, DateFormat, DateSource};
use crate::fold::{fold_resources, make_key, resolve_status, DeduplicationResult, Keyed, MergeOptions};
use crate::status::COVERAGE_STATUS;
use ferrum_models::Resource;

const COVERAGE_DATES: &[DateSource] = &[DateSource::Period("period")];

fn coverage_key(resource: &Resource) -> Keyed {
    let payors = references_at(resource, "payor");
    if payors.is_empty() {
        return Keyed::Dangling;
    }
    let subscriber_id = resource.get_str("subscriberId").map(|s| s.trim().to_lowercase());
    let start = lenient_date(resource, COVERAGE_DATES, DateFormat::Date);
    Keyed::single(make_key("coverage", (payors, subscriber_id, start)))
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&COVERAGE_STATUS, merged, existing, incoming);
}

pub fn deduplicate_coverages(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), coverage_key)
}
