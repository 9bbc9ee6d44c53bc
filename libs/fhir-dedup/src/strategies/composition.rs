//! Composition: one per source document.
//!
//! Compositions are keyed on the source document id extension (any url
//! ending in `doc-id-extension.json`, value in `valueString`), falling back
//! to the resource id.

use crate::fold::{fold_resources, make_key, resolve_status, DeduplicationResult, Keyed, MergeOptions};
use crate::status::COMPOSITION_STATUS;
use ferrum_models::Resource;

pub const DOC_ID_EXTENSION_SUFFIX: &str = "doc-id-extension.json";

fn document_name(resource: &Resource) -> Option<String> {
    resource
        .extensions()
        .into_iter()
        .filter(|ext| ext.url.ends_with(DOC_ID_EXTENSION_SUFFIX))
        .find_map(|ext| ext.value_string().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn composition_key(resource: &Resource) -> Keyed {
    Keyed::first_family([
        document_name(resource).map(|name| make_key("document", name)),
        resource.id.as_ref().map(|id| make_key("id", id)),
    ])
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&COMPOSITION_STATUS, merged, existing, incoming);
}

pub fn deduplicate_compositions(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), composition_key)
}
