//! RelatedPerson: name, with relationship and address as wildcards.

use super::{address_key, concept_fingerprint, human_name_key};
use crate::fold::{flexible_keys, fold_resources, DeduplicationResult, FlexField, Keyed, MergeOptions};
use ferrum_models::{CodeableConcept, Resource};

fn related_person_key(resource: &Resource) -> Keyed {
    let name = human_name_key(&resource.names());
    let relationship = resource
        .get_list::<CodeableConcept>("relationship")
        .first()
        .and_then(concept_fingerprint);
    let address = address_key(&resource.addresses());
    Keyed::from_keys(flexible_keys(
        "related-person",
        &[
            FlexField::anchor(name),
            FlexField::optional(relationship),
            FlexField::optional(address),
        ],
    ))
}

pub fn deduplicate_related_persons(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::default(), related_person_key)
}
