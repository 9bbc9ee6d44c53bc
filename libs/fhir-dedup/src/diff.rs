//! Cross-snapshot comparison
//!
//! The merge engine decides whether two records state the same fact: both
//! snapshots are deduplicated together and every record that merged with
//! anything drops out. What survives untouched is new to its side.

use crate::dispatch::{common_resource_type, deduplicate_resources, run_strategy, strategy_for};
use crate::merge::{has_derived_from, strip_provenance};
use crate::{Error, Result};
use ferrum_models::Resource;
use std::collections::HashSet;

/// Records found on only one side of a comparison
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcesXor {
    pub target_only: Vec<Resource>,
    pub source_only: Vec<Resource>,
}

fn ids(resources: &[Resource]) -> HashSet<&str> {
    resources.iter().filter_map(|r| r.id.as_deref()).collect()
}

/// Split two same-type snapshots into the facts only one of them holds.
///
/// A record that matches anything on the other side (or on its own side)
/// appears in neither list. Records that cannot be keyed appear in neither
/// list either.
pub fn compute_resources_xor(target: Vec<Resource>, source: Vec<Resource>) -> Result<ResourcesXor> {
    if target.is_empty() {
        return Ok(ResourcesXor {
            target_only: Vec::new(),
            source_only: source,
        });
    }
    if source.is_empty() {
        return Ok(ResourcesXor {
            target_only: target,
            source_only: Vec::new(),
        });
    }

    let (Some(target_type), Some(source_type)) = (common_resource_type(&target)?, common_resource_type(&source)?)
    else {
        return Ok(ResourcesXor::default());
    };
    if target_type != source_type {
        return Err(Error::ResourceTypeMismatch {
            expected: target_type,
            found: source_type,
        });
    }
    let strategy =
        strategy_for(target_type).ok_or_else(|| Error::UnsupportedResourceType(target_type.to_string()))?;

    let target_ids: HashSet<String> = ids(&target).into_iter().map(str::to_string).collect();
    let source_ids: HashSet<String> = ids(&source).into_iter().map(str::to_string).collect();
    let mut shared: Vec<String> = target_ids.intersection(&source_ids).cloned().collect();
    if !shared.is_empty() {
        shared.sort();
        return Err(Error::OverlappingIds(shared));
    }

    let combined = target
        .into_iter()
        .chain(source)
        .map(|mut resource| {
            strip_provenance(&mut resource);
            resource
        })
        .collect();
    let merged = run_strategy(target_type, strategy, combined);

    let mut xor = ResourcesXor::default();
    for resource in merged.resources {
        if has_derived_from(&resource) {
            continue;
        }
        let Some(id) = resource.id.as_deref() else {
            continue;
        };
        if target_ids.contains(id) {
            xor.target_only.push(resource);
        } else if source_ids.contains(id) {
            xor.source_only.push(resource);
        }
    }
    tracing::debug!(
        resource_type = %target_type,
        target_only = xor.target_only.len(),
        source_only = xor.source_only.len(),
        "computed resources xor"
    );
    Ok(xor)
}

/// Does `candidate` add information to `existing`?
///
/// Returns the ids of `existing` when it does, meaning the existing records
/// are superseded, and an empty list when the candidate merges away.
pub fn compute_resource_diff(existing: Vec<Resource>, candidate: Resource) -> Result<Vec<String>> {
    if let Some(expected) = common_resource_type(&existing)? {
        if candidate.resource_type != expected {
            return Err(Error::ResourceTypeMismatch {
                expected,
                found: candidate.resource_type,
            });
        }
    }
    let existing_ids = existing
        .iter()
        .map(|r| r.id.clone().ok_or(Error::MissingId(r.resource_type)))
        .collect::<Result<Vec<_>>>()?;

    let baseline = deduplicate_resources(existing.clone())?.resources.len();
    let mut with_candidate = existing;
    with_candidate.push(candidate);
    let grown = deduplicate_resources(with_candidate)?.resources.len();

    Ok(if grown > baseline { existing_ids } else { Vec::new() })
}
