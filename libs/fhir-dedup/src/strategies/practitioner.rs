//! Practitioner: NPI, or name + NPI + address with missing-as-wildcard.
//!
//! An NPI identifies a practitioner on its own. Without one on both sides,
//! matching falls to the flexible name/NPI/address family, where two records
//! must agree on every field they both have and share at least a name or an
//! NPI.

use super::{address_key, human_name_key};
use crate::fold::{
    flexible_keys, fold_resources, make_key, DeduplicationResult, FlexField, KeySet, Keyed, MergeOptions,
};
use crate::npi::extract_npi;
use ferrum_models::Resource;

fn practitioner_key(resource: &Resource) -> Keyed {
    let npi = extract_npi(&resource.identifiers());
    let name = human_name_key(&resource.names());
    let address = address_key(&resource.addresses());

    let mut keys = KeySet::default();
    if let Some(npi) = &npi {
        keys.extend(KeySet::single(make_key("npi", npi)));
    }
    keys.extend(flexible_keys(
        "practitioner",
        &[FlexField::anchor(name), FlexField::anchor(npi), FlexField::optional(address)],
    ));
    Keyed::from_keys(keys)
}

pub fn deduplicate_practitioners(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::default(), practitioner_key)
}
