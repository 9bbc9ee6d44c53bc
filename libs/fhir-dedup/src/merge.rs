//! Merge primitives
//!
//! `combine_two_resources` folds a duplicate into a copy of its master:
//! - identity elements (`id`, `resourceType`, `subject`) are never touched
//! - arrays present on both sides are unioned by structural equality, keeping
//!   first-occurrence order
//! - objects present on both sides are merged recursively
//! - any other incoming value overwrites, unless it is an "unknown"
//!   placeholder and the master already holds something concrete
//!
//! With provenance enabled the master gains a `derived-from` extension naming
//! the duplicate; otherwise the merged `extension` element is dropped.

use crate::codes::{is_placeholder, is_unknown_concept};
use ferrum_models::{CodeableConcept, Resource};
use serde_json::{json, Map, Value};

pub const PROVENANCE_EXTENSION_URL: &str =
    "http://hl7.org/fhir/StructureDefinition/artifact-relatedArtifact";
pub const DERIVED_FROM: &str = "derived-from";

const IDENTITY_FIELDS: [&str; 3] = ["id", "resourceType", "subject"];

/// Extension recording that a resource absorbed `reference`
pub fn provenance_extension(reference: &str) -> Value {
    json!({
        "url": PROVENANCE_EXTENSION_URL,
        "valueRelatedArtifact": { "type": DERIVED_FROM, "display": reference }
    })
}

pub fn is_provenance_extension(extension: &Value) -> bool {
    extension.get("url").and_then(Value::as_str) == Some(PROVENANCE_EXTENSION_URL)
        && extension
            .pointer("/valueRelatedArtifact/type")
            .and_then(Value::as_str)
            == Some(DERIVED_FROM)
}

/// References named by the resource's provenance extensions
pub fn provenance_references(resource: &Resource) -> Vec<String> {
    resource
        .extensions()
        .iter()
        .filter_map(|ext| {
            let artifact = ext.value_related_artifact()?;
            (ext.url == PROVENANCE_EXTENSION_URL
                && artifact.artifact_type.as_deref() == Some(DERIVED_FROM))
            .then_some(artifact.display)
            .flatten()
        })
        .collect()
}

pub fn has_derived_from(resource: &Resource) -> bool {
    !provenance_references(resource).is_empty()
}

/// Remove provenance extensions, dropping `extension` if it empties
pub fn strip_provenance(resource: &mut Resource) {
    let Some(Value::Array(extensions)) = resource.get_mut("extension") else {
        return;
    };
    extensions.retain(|ext| !is_provenance_extension(ext));
    if extensions.is_empty() {
        resource.remove("extension");
    }
}

/// Union `source` into `target`, skipping items already present
pub fn merge_arrays(target: &mut Vec<Value>, source: &[Value]) {
    for item in source {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

fn looks_like_concept(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k == "coding" || k == "text")
}

fn as_unknown_concept(value: &Value) -> Option<bool> {
    let Value::Object(map) = value else {
        return None;
    };
    if !looks_like_concept(map) {
        return None;
    }
    let concept: CodeableConcept = serde_json::from_value(value.clone()).ok()?;
    Some(is_unknown_concept(&concept))
}

/// Whether `value` says nothing beyond "unknown"
fn is_placeholder_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => is_placeholder(s),
        other => as_unknown_concept(other).unwrap_or(false),
    }
}

fn merge_value(target: &mut Value, source: &Value, include_extensions: bool) {
    if is_placeholder_value(source) && !is_placeholder_value(target) {
        return;
    }
    if is_placeholder_value(target) && !is_placeholder_value(source) {
        *target = source.clone();
        return;
    }
    match (target, source) {
        (Value::Array(t), Value::Array(s)) => merge_arrays(t, s),
        (Value::Object(t), Value::Object(s)) => deep_merge(t, s, include_extensions),
        (t, s) => *t = s.clone(),
    }
}

/// Merge `source` into `target` element by element
pub fn deep_merge(target: &mut Map<String, Value>, source: &Map<String, Value>, include_extensions: bool) {
    for (key, value) in source {
        if IDENTITY_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if key == "extension" && !include_extensions {
            continue;
        }
        match target.get_mut(key) {
            Some(existing) => merge_value(existing, value, include_extensions),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge `duplicate` into a copy of `master`
pub fn combine_two_resources(master: &Resource, duplicate: &Resource, include_provenance: bool) -> Resource {
    let mut merged = master.clone();
    deep_merge(&mut merged.fields, &duplicate.fields, include_provenance);

    if !include_provenance {
        merged.remove("extension");
        return merged;
    }
    if let Some(reference) = duplicate.reference() {
        let marker = provenance_extension(&reference);
        match merged.get_mut("extension") {
            Some(Value::Array(extensions)) => {
                if !extensions.contains(&marker) {
                    extensions.push(marker);
                }
            }
            _ => merged.set("extension", Value::Array(vec![marker])),
        }
    }
    merged
}
