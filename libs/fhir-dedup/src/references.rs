//! Reference consistency
//!
//! - [`ReplacementLookup`] rewrites `reference` strings from consumed
//!   resources to the masters that absorbed them
//! - [`remove_dangling_references`] scrubs references to excluded resources,
//!   following the per-field [`CleanupPolicy`] of each resource kind
//! - [`remove_duplicate_references`] drops repeated references within one
//!   resource
//!
//! The reference-bearing elements of every kind are listed in
//! [`reference_fields`], matched exhaustively on [`ResourceType`]. Elements
//! missing from those tables, and entries of kinds that are not modelled at
//! all, are pruned.

use crate::fold::ReplacementMap;
use ferrum_models::{Resource, ResourceType};
use indexmap::IndexSet;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// What happens when a reference element points at a dangling resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Drop the reference; drop the element once it is empty
    Prune,
    /// The resource means nothing without this reference; drop the resource
    RemoveResource,
    /// Prune, but leave a display-only placeholder instead of an empty element
    Placeholder,
}

/// A top-level element that holds references, directly or nested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    pub field: &'static str,
    pub policy: CleanupPolicy,
}

const fn prune(field: &'static str) -> ReferenceField {
    ReferenceField {
        field,
        policy: CleanupPolicy::Prune,
    }
}

const fn required(field: &'static str) -> ReferenceField {
    ReferenceField {
        field,
        policy: CleanupPolicy::RemoveResource,
    }
}

const fn placeholder(field: &'static str) -> ReferenceField {
    ReferenceField {
        field,
        policy: CleanupPolicy::Placeholder,
    }
}

/// Reference-bearing elements of `resource_type`
pub fn reference_fields(resource_type: ResourceType) -> &'static [ReferenceField] {
    match resource_type {
        ResourceType::AllergyIntolerance => const {
            &[
                prune("patient"),
                prune("encounter"),
                prune("recorder"),
                prune("asserter"),
            ]
        },
        ResourceType::CarePlan => const {
            &[
                prune("subject"),
                prune("encounter"),
                prune("author"),
                prune("contributor"),
                prune("careTeam"),
                prune("addresses"),
                prune("supportingInfo"),
                prune("goal"),
                prune("basedOn"),
                prune("replaces"),
                prune("partOf"),
                prune("activity"),
            ]
        },
        ResourceType::Composition => const {
            &[
                prune("subject"),
                prune("encounter"),
                placeholder("author"),
                prune("attester"),
                prune("custodian"),
                prune("relatesTo"),
                prune("event"),
                prune("section"),
            ]
        },
        ResourceType::Condition => const {
            &[
                prune("subject"),
                prune("encounter"),
                prune("recorder"),
                prune("asserter"),
                prune("stage"),
                prune("evidence"),
            ]
        },
        ResourceType::Coverage => const {
            &[
                prune("policyHolder"),
                prune("subscriber"),
                prune("beneficiary"),
                prune("payor"),
                prune("contract"),
            ]
        },
        ResourceType::Device => const {
            &[
                prune("patient"),
                prune("owner"),
                prune("location"),
                prune("parent"),
            ]
        },
        ResourceType::DiagnosticReport => const {
            &[
                prune("basedOn"),
                prune("subject"),
                prune("encounter"),
                prune("performer"),
                prune("resultsInterpreter"),
                prune("specimen"),
                prune("result"),
                prune("imagingStudy"),
                prune("media"),
            ]
        },
        ResourceType::DocumentReference => const {
            &[
                prune("subject"),
                prune("author"),
                prune("authenticator"),
                prune("custodian"),
                prune("relatesTo"),
                prune("context"),
            ]
        },
        ResourceType::Encounter => const {
            &[
                prune("subject"),
                prune("episodeOfCare"),
                prune("basedOn"),
                prune("participant"),
                prune("appointment"),
                prune("reasonReference"),
                prune("diagnosis"),
                prune("account"),
                prune("hospitalization"),
                prune("location"),
                prune("serviceProvider"),
                prune("partOf"),
            ]
        },
        ResourceType::FamilyMemberHistory => const { &[prune("patient"), prune("reasonReference")] },
        ResourceType::Immunization => const {
            &[
                prune("patient"),
                prune("encounter"),
                prune("location"),
                prune("manufacturer"),
                prune("performer"),
                prune("reasonReference"),
                prune("reaction"),
            ]
        },
        ResourceType::Location => const { &[prune("managingOrganization"), prune("partOf"), prune("endpoint")] },
        ResourceType::Medication => const { &[prune("manufacturer"), prune("ingredient")] },
        ResourceType::MedicationAdministration => const {
            &[
                required("medicationReference"),
                prune("partOf"),
                prune("subject"),
                prune("context"),
                prune("supportingInformation"),
                prune("performer"),
                prune("reasonReference"),
                prune("request"),
                prune("device"),
                prune("eventHistory"),
            ]
        },
        ResourceType::MedicationDispense => const {
            &[
                required("medicationReference"),
                prune("partOf"),
                prune("subject"),
                prune("context"),
                prune("supportingInformation"),
                prune("performer"),
                prune("location"),
                prune("authorizingPrescription"),
                prune("destination"),
                prune("receiver"),
                prune("detectedIssue"),
                prune("eventHistory"),
            ]
        },
        ResourceType::MedicationRequest => const {
            &[
                required("medicationReference"),
                prune("reportedReference"),
                prune("subject"),
                prune("encounter"),
                prune("supportingInformation"),
                prune("requester"),
                prune("performer"),
                prune("recorder"),
                prune("reasonReference"),
                prune("basedOn"),
                prune("insurance"),
                prune("priorPrescription"),
                prune("detectedIssue"),
                prune("eventHistory"),
            ]
        },
        ResourceType::MedicationStatement => const {
            &[
                required("medicationReference"),
                prune("basedOn"),
                prune("partOf"),
                prune("subject"),
                prune("context"),
                prune("informationSource"),
                prune("derivedFrom"),
                prune("reasonReference"),
            ]
        },
        ResourceType::Observation => const {
            &[
                prune("basedOn"),
                prune("partOf"),
                prune("subject"),
                prune("focus"),
                prune("encounter"),
                prune("performer"),
                prune("specimen"),
                prune("device"),
                prune("hasMember"),
                prune("derivedFrom"),
            ]
        },
        ResourceType::Organization => const { &[prune("partOf"), prune("endpoint")] },
        ResourceType::Patient => const {
            &[
                prune("contact"),
                prune("generalPractitioner"),
                prune("managingOrganization"),
                prune("link"),
            ]
        },
        ResourceType::Practitioner => const { &[prune("qualification")] },
        ResourceType::Procedure => const {
            &[
                prune("basedOn"),
                prune("partOf"),
                prune("subject"),
                prune("encounter"),
                prune("recorder"),
                prune("asserter"),
                prune("performer"),
                prune("location"),
                prune("reasonReference"),
                prune("report"),
                prune("complicationDetail"),
                prune("focalDevice"),
            ]
        },
        ResourceType::RelatedPerson => const { &[prune("patient")] },
    }
}

fn reference_of(value: &Value) -> Option<&str> {
    value.get("reference").and_then(Value::as_str)
}

/// Consumed reference to surviving master, resolved transitively
#[derive(Debug, Clone, Default)]
pub struct ReplacementLookup {
    targets: HashMap<String, String>,
}

impl ReplacementLookup {
    pub fn new(map: &ReplacementMap) -> Self {
        let targets = map
            .iter()
            .flat_map(|(master, consumed)| consumed.iter().map(move |c| (c.clone(), master.clone())))
            .filter(|(consumed, master)| consumed != master)
            .collect();
        Self { targets }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Final master of `reference`, if it was consumed
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        let mut current = self.targets.get(reference)?;
        // A master can itself be consumed by a later pass; follow the chain.
        for _ in 0..self.targets.len() {
            match self.targets.get(current) {
                Some(next) if next != reference => current = next,
                _ => break,
            }
        }
        Some(current.as_str())
    }

    /// Rewrite every `reference` string in `resource`; returns the count
    pub fn apply(&self, resource: &mut Resource) -> usize {
        if self.is_empty() {
            return 0;
        }
        resource.fields.values_mut().map(|value| self.rewrite(value)).sum()
    }

    /// Rewrite every `reference` string below a raw JSON entry
    pub fn apply_value(&self, value: &mut Value) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.rewrite(value)
    }

    fn rewrite(&self, value: &mut Value) -> usize {
        match value {
            Value::Object(map) => {
                let mut count = 0;
                for (key, child) in map.iter_mut() {
                    if key == "reference" {
                        if let Value::String(reference) = child {
                            if let Some(target) = self.resolve(reference) {
                                *reference = target.to_string();
                                count += 1;
                            }
                        }
                    } else {
                        count += self.rewrite(child);
                    }
                }
                count
            }
            Value::Array(items) => items.iter_mut().map(|item| self.rewrite(item)).sum(),
            _ => 0,
        }
    }
}

/// Remove dangling references below `value`.
///
/// Returns true when `value` itself should go: it is a dangling reference,
/// or it held content and lost all of it.
fn prune_value(value: &mut Value, dangling: &IndexSet<String>) -> bool {
    match value {
        Value::Object(map) => {
            if reference_of_map(map).is_some_and(|r| dangling.contains(r)) {
                return true;
            }
            let before = map.len();
            map.retain(|_, child| !prune_value(child, dangling));
            before > 0 && map.is_empty()
        }
        Value::Array(items) => {
            let before = items.len();
            items.retain_mut(|item| !prune_value(item, dangling));
            before > 0 && items.is_empty()
        }
        _ => false,
    }
}

fn reference_of_map(map: &Map<String, Value>) -> Option<&str> {
    map.get("reference").and_then(Value::as_str)
}

/// Outcome of cleaning one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    Keep,
    /// A required reference is dangling; the resource must be removed
    Remove,
}

/// Scrub references to `dangling` resources from `resource`.
///
/// `placeholder_display` names the display-only reference left in
/// [`CleanupPolicy::Placeholder`] elements that would otherwise be emptied.
pub fn remove_dangling_references(
    resource: &mut Resource,
    dangling: &IndexSet<String>,
    placeholder_display: &str,
) -> Cleanup {
    if dangling.is_empty() {
        return Cleanup::Keep;
    }
    for field in reference_fields(resource.resource_type) {
        let Some(value) = resource.get_mut(field.field) else {
            continue;
        };
        match field.policy {
            CleanupPolicy::RemoveResource => {
                if reference_of(value).is_some_and(|r| dangling.contains(r)) {
                    return Cleanup::Remove;
                }
            }
            CleanupPolicy::Prune => {
                if prune_value(value, dangling) {
                    resource.remove(field.field);
                }
            }
            CleanupPolicy::Placeholder => {
                let emptied = prune_value(value, dangling);
                let was_array = value.is_array();
                if emptied {
                    let placeholder = json!({ "display": placeholder_display });
                    let replacement = if was_array {
                        Value::Array(vec![placeholder])
                    } else {
                        placeholder
                    };
                    resource.set(field.field, replacement);
                }
            }
        }
    }
    let listed = reference_fields(resource.resource_type);
    resource
        .fields
        .retain(|key, value| listed.iter().any(|f| f.field == key) || !prune_value(value, dangling));
    Cleanup::Keep
}

/// Scrub references to `dangling` resources from a raw JSON entry.
///
/// Every element is pruned; returns true when anything was removed.
pub fn remove_dangling_from_value(value: &mut Value, dangling: &IndexSet<String>) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    if dangling.is_empty() {
        return false;
    }
    let before = map.clone();
    map.retain(|_, child| !prune_value(child, dangling));
    *map != before
}

fn holds_reference(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            reference_of_map(map).is_some() || map.values().any(holds_reference)
        }
        Value::Array(items) => items.iter().any(holds_reference),
        _ => false,
    }
}

fn dedup_references(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => map.values_mut().map(dedup_references).sum(),
        Value::Array(items) => {
            let mut removed: usize = items.iter_mut().map(dedup_references).sum();
            if !items.iter().any(holds_reference) {
                return removed;
            }
            let before = items.len();
            let mut seen: HashMap<String, usize> = HashMap::new();
            let mut kept: Vec<Value> = Vec::with_capacity(before);
            for item in items.drain(..) {
                match reference_of(&item).map(str::to_string) {
                    Some(reference) => match seen.get(&reference) {
                        Some(&survivor) => absorb(&mut kept[survivor], item),
                        None => {
                            seen.insert(reference, kept.len());
                            kept.push(item);
                        }
                    },
                    None if kept.contains(&item) => {}
                    None => kept.push(item),
                }
            }
            removed += before - kept.len();
            *items = kept;
            removed
        }
        _ => 0,
    }
}

/// Copy the elements `duplicate` has and `survivor` lacks (a `display`)
fn absorb(survivor: &mut Value, duplicate: Value) {
    if let (Value::Object(survivor), Value::Object(duplicate)) = (survivor, duplicate) {
        for (key, value) in duplicate {
            survivor.entry(key).or_insert(value);
        }
    }
}

/// Drop repeated references within `resource`'s own arrays.
///
/// References are compared by their `reference` string; the first one stays
/// and picks up elements only the later ones carry. Other reference-holding
/// items (a performer with an actor) are compared by structure.
pub fn remove_duplicate_references(resource: &mut Resource) -> usize {
    resource.fields.values_mut().map(dedup_references).sum()
}

/// [`remove_duplicate_references`] for a raw JSON entry
pub fn remove_duplicate_references_in_value(value: &mut Value) -> usize {
    dedup_references(value)
}
