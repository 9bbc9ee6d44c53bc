//! Organization: validated NPI, else name + first address, else name.

use super::address_key;
use crate::codes::normalize_text;
use crate::fold::{fold_resources, make_key, DeduplicationResult, Keyed, MergeOptions};
use crate::npi::extract_valid_npi;
use ferrum_models::Resource;

fn organization_key(resource: &Resource) -> Keyed {
    let npi = extract_valid_npi(&resource.identifiers());
    let name = resource.get_str("name").map(normalize_text).filter(|n| !n.is_empty());
    let address = address_key(&resource.addresses());
    Keyed::first_family([
        npi.map(|npi| make_key("npi", npi)),
        name.as_ref()
            .zip(address.as_ref())
            .map(|(name, address)| make_key("name-address", (name, address))),
        name.as_ref().map(|name| make_key("name", name)),
    ])
}

pub fn deduplicate_organizations(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::default(), organization_key)
}
