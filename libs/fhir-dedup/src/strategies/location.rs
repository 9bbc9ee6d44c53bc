//! Location: name + normalized address.

use super::address_key;
use crate::codes::normalize_text;
use crate::fold::{fold_resources, make_key, DeduplicationResult, Keyed, MergeOptions};
use ferrum_models::{Address, Resource};

fn location_key(resource: &Resource) -> Keyed {
    let Some(name) = resource.get_str("name").map(normalize_text).filter(|n| !n.is_empty()) else {
        return Keyed::Dangling;
    };
    let address = resource
        .get_as::<Address>("address")
        .and_then(|a| address_key(std::slice::from_ref(&a)));
    Keyed::single(make_key("location", (name, address)))
}

pub fn deduplicate_locations(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::default(), location_key)
}
