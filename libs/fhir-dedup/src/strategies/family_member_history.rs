//! FamilyMemberHistory: one per relative.
//!
//! A patient has one mother and one father, so parent roles are keyed on the
//! relationship alone; anyone else also needs the relative's name.

use super::{concept_at, display_key};
use crate::codes::normalize_text;
use crate::fold::{fold_resources, make_key, resolve_status, DeduplicationResult, Keyed, MergeOptions};
use crate::status::FAMILY_MEMBER_HISTORY_STATUS;
use ferrum_models::Resource;

const PARENT_CODES: [&str; 6] = ["mth", "fth", "nmth", "nfth", "prn", "nprn"];
const PARENT_DISPLAYS: [&str; 4] = ["mother", "father", "natural mother", "natural father"];

fn relationship(resource: &Resource) -> Option<(String, bool)> {
    let concept = concept_at(resource, "relationship")?;
    let code = concept
        .coding
        .iter()
        .filter_map(|c| c.code.as_deref())
        .map(|c| c.trim().to_lowercase())
        .find(|c| !c.is_empty());
    let display = display_key(&concept);
    let is_parent = code.as_deref().is_some_and(|c| PARENT_CODES.contains(&c))
        || display.as_deref().is_some_and(|d| PARENT_DISPLAYS.contains(&d));
    code.or(display).map(|r| (r, is_parent))
}

fn family_member_key(resource: &Resource) -> Keyed {
    let Some((relationship, is_parent)) = relationship(resource) else {
        return Keyed::Dangling;
    };
    if is_parent {
        return Keyed::single(make_key("parent", relationship));
    }
    let name = resource.get_str("name").map(normalize_text);
    Keyed::single(make_key("relative", (relationship, name)))
}

fn post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&FAMILY_MEMBER_HISTORY_STATUS, merged, existing, incoming);
}

pub fn deduplicate_family_member_histories(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(post_merge), family_member_key)
}
