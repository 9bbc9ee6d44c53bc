//! Medication: one record per drug code.
//!
//! Only the code identifies a medication; form, ingredients and batch are
//! merged in. Codes are tried RxNorm, then NDC, then SNOMED.

use crate::codes::{extract_codes, has_blacklisted_text};
use crate::fold::{fold_resources, make_key, DeduplicationResult, Keyed, MergeOptions};
use ferrum_models::Resource;

fn medication_key(resource: &Resource) -> Keyed {
    let Some(code) = resource.code() else {
        return Keyed::Dangling;
    };
    if has_blacklisted_text(&code) {
        return Keyed::Dangling;
    }
    let codes = extract_codes(&code);
    Keyed::first_family([
        codes.rxnorm.as_ref().map(|c| make_key("rxnorm", c)),
        codes.ndc.as_ref().map(|c| make_key("ndc", c)),
        codes.snomed.as_ref().map(|c| make_key("snomed", c)),
    ])
}

pub fn deduplicate_medications(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::default(), medication_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn medication(id: &str, code: Value) -> Resource {
        Resource::from_value(json!({"resourceType": "Medication", "id": id, "code": code})).unwrap()
    }

    fn rxnorm(code: &str) -> Value {
        json!({"coding": [{"system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": code}]})
    }

    #[test]
    fn merges_same_rxnorm_code() {
        let result = deduplicate_medications(vec![
            medication("a", rxnorm("197361")),
            medication("b", rxnorm("197361")),
            medication("c", rxnorm("314076")),
        ]);
        assert_eq!(result.resources.len(), 2);
        assert_eq!(
            result.replacement_map.get("Medication/a"),
            Some(&vec!["Medication/b".to_string()])
        );
    }

    #[test]
    fn useless_medications_are_dangling() {
        let result = deduplicate_medications(vec![
            medication("none", json!({"text": "No known medications"})),
            medication("local", json!({"coding": [{"system": "http://example.org/meds", "code": "42"}]})),
            medication("unk", json!({"coding": [{"system": "http://terminology.hl7.org/ValueSet/v3-Unknown", "code": "UNK"}]})),
        ]);
        assert!(result.resources.is_empty());
        assert_eq!(result.dangling_references.len(), 3);
    }
}
