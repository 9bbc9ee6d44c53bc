//! Document reference filtering and repair

use crate::date::{date_from_string, DateFormat};
use crate::fold::DeduplicationResult;
use ferrum_models::Resource;
use serde_json::Value;

/// True for documents replaced by a newer version or recorded in error
pub fn is_doc_status_superseded(resource: &Resource) -> bool {
    matches!(resource.get_str("status"), Some("superseded" | "entered-in-error"))
        || resource.get_str("docStatus") == Some("entered-in-error")
}

fn comparable(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| date_from_string(raw, DateFormat::DateTime).ok())
}

/// Swap `context.period` bounds when the start lies after the end.
///
/// Periods with a single bound, or with a bound that does not parse, are
/// left alone. Returns true when the bounds were swapped.
pub fn repair_context_period(resource: &mut Resource) -> bool {
    let Some(Value::Object(period)) = resource
        .get_mut("context")
        .and_then(|context| context.get_mut("period"))
    else {
        return false;
    };
    let (Some(start), Some(end)) = (comparable(period.get("start")), comparable(period.get("end"))) else {
        return false;
    };
    if start <= end {
        return false;
    }
    let start = period.remove("start");
    let end = period.remove("end");
    if let (Some(start), Some(end)) = (start, end) {
        period.insert("start".to_string(), end);
        period.insert("end".to_string(), start);
    }
    true
}

/// Drop superseded documents and repair reversed periods.
///
/// Dropped documents are reported as dangling; nothing is merged.
pub fn filter_document_references(resources: Vec<Resource>) -> DeduplicationResult {
    let mut result = DeduplicationResult::default();
    for mut resource in resources {
        if is_doc_status_superseded(&resource) {
            if let Some(reference) = resource.reference() {
                result.dangling_references.insert(reference);
            }
            continue;
        }
        if repair_context_period(&mut resource) {
            tracing::debug!(
                id = resource.id.as_deref().unwrap_or_default(),
                "swapped reversed document period"
            );
        }
        result.resources.push(resource);
    }
    result
}
