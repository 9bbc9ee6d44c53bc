//! AllergyIntolerance: keyed on the reaction fingerprint, the known
//! substances and known manifestations across all reactions.

use super::concept_fingerprint;
use crate::fold::{fold_resources, make_key, DeduplicationResult, Keyed, MergeOptions};
use ferrum_models::{CodeableConcept, Resource};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Reaction {
    substance: Option<CodeableConcept>,
    #[serde(default)]
    manifestation: Vec<CodeableConcept>,
}

/// Known substances and manifestations of a reaction list, sorted and unique
pub fn extract_from_reactions(resource: &Resource) -> (Vec<String>, Vec<String>) {
    let reactions: Vec<Reaction> = resource.get_list("reaction");
    let mut substances: Vec<String> = reactions
        .iter()
        .filter_map(|r| r.substance.as_ref())
        .filter_map(concept_fingerprint)
        .collect();
    let mut manifestations: Vec<String> = reactions
        .iter()
        .flat_map(|r| r.manifestation.iter())
        .filter_map(concept_fingerprint)
        .collect();
    substances.sort();
    substances.dedup();
    manifestations.sort();
    manifestations.dedup();
    (substances, manifestations)
}

fn allergy_key(resource: &Resource) -> Keyed {
    let (substances, manifestations) = extract_from_reactions(resource);
    if substances.is_empty() && manifestations.is_empty() {
        return Keyed::Dangling;
    }
    Keyed::single(make_key("reaction", (substances, manifestations)))
}

pub fn deduplicate_allergy_intolerances(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::default(), allergy_key)
}
