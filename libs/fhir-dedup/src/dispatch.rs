//! Route a homogeneous resource list to its strategy
//!
//! The match below is exhaustive over [`ResourceType`]: a new resource kind
//! does not compile until it is given a strategy or explicitly refused.

use crate::fold::DeduplicationResult;
use crate::strategies::{self, observation_category, ObservationCategory};
use crate::{Error, Result};
use ferrum_models::{Resource, ResourceType};

/// A per-type deduplication function
pub type Strategy = fn(Vec<Resource>) -> DeduplicationResult;

/// Strategy for `resource_type`, if it is deduplicated at all
pub fn strategy_for(resource_type: ResourceType) -> Option<Strategy> {
    let strategy: Strategy = match resource_type {
        ResourceType::AllergyIntolerance => strategies::deduplicate_allergy_intolerances,
        ResourceType::CarePlan => strategies::deduplicate_care_plans,
        ResourceType::Composition => strategies::deduplicate_compositions,
        ResourceType::Condition => strategies::deduplicate_conditions,
        ResourceType::Coverage => strategies::deduplicate_coverages,
        ResourceType::DiagnosticReport => strategies::deduplicate_diagnostic_reports,
        ResourceType::Encounter => strategies::deduplicate_encounters,
        ResourceType::FamilyMemberHistory => strategies::deduplicate_family_member_histories,
        ResourceType::Immunization => strategies::deduplicate_immunizations,
        ResourceType::Location => strategies::deduplicate_locations,
        ResourceType::Medication => strategies::deduplicate_medications,
        ResourceType::MedicationAdministration => strategies::deduplicate_medication_administrations,
        ResourceType::MedicationDispense => strategies::deduplicate_medication_dispenses,
        ResourceType::MedicationRequest => strategies::deduplicate_medication_requests,
        ResourceType::MedicationStatement => strategies::deduplicate_medication_statements,
        ResourceType::Observation => deduplicate_observations_by_category,
        ResourceType::Organization => strategies::deduplicate_organizations,
        ResourceType::Practitioner => strategies::deduplicate_practitioners,
        ResourceType::Procedure => strategies::deduplicate_procedures,
        ResourceType::RelatedPerson => strategies::deduplicate_related_persons,
        ResourceType::Device | ResourceType::DocumentReference | ResourceType::Patient => return None,
    };
    Some(strategy)
}

/// Split observations by category and deduplicate each partition.
///
/// Partitions never merge with each other; results are concatenated labs
/// first, then social history, then the rest.
pub fn deduplicate_observations_by_category(resources: Vec<Resource>) -> DeduplicationResult {
    let mut labs = Vec::new();
    let mut social = Vec::new();
    let mut other = Vec::new();
    for resource in resources {
        match observation_category(&resource) {
            ObservationCategory::VitalsAndLabs => labs.push(resource),
            ObservationCategory::Social => social.push(resource),
            ObservationCategory::Other => other.push(resource),
        }
    }

    let mut result = strategies::deduplicate_observations_labs(labs);
    result.absorb(strategies::deduplicate_observations_social(social));
    result.absorb(strategies::deduplicate_observations(other));
    result
}

/// The single resource type of `resources`, if any
pub fn common_resource_type(resources: &[Resource]) -> Result<Option<ResourceType>> {
    let Some(first) = resources.first() else {
        return Ok(None);
    };
    let expected = first.resource_type;
    match resources.iter().find(|r| r.resource_type != expected) {
        Some(other) => Err(Error::ResourceTypeMismatch {
            expected,
            found: other.resource_type,
        }),
        None => Ok(Some(expected)),
    }
}

/// Deduplicate a list of resources that all share one type.
///
/// Fails on mixed types and on kinds that have no strategy.
pub fn deduplicate_resources(resources: Vec<Resource>) -> Result<DeduplicationResult> {
    let Some(resource_type) = common_resource_type(&resources)? else {
        return Ok(DeduplicationResult::default());
    };
    let strategy = strategy_for(resource_type)
        .ok_or_else(|| Error::UnsupportedResourceType(resource_type.to_string()))?;
    Ok(run_strategy(resource_type, strategy, resources))
}

pub(crate) fn run_strategy(
    resource_type: ResourceType,
    strategy: Strategy,
    resources: Vec<Resource>,
) -> DeduplicationResult {
    let input = resources.len();
    let result = strategy(resources);
    tracing::debug!(
        resource_type = %resource_type,
        input,
        output = result.resources.len(),
        merged = result.merge_count(),
        dangling = result.dangling_references.len(),
        "deduplicated resources"
    );
    result
}
