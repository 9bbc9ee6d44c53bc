//! Resource graph
//!
//! The bundle contents grouped by resource kind, in order of first
//! appearance. Entries whose kind is not modelled are carried through
//! with only their references maintained.
//!
//! Every entry remembers where it entered the graph, so the output bundle
//! keeps the input order; a merged record sits where its master was.

use ferrum_models::{Bundle, BundleEntry, Resource, ResourceType};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceGraph {
    resources: IndexMap<ResourceType, Vec<Resource>>,
    unmodelled: Vec<(usize, Value)>,
    /// Entry position by `Type/id`, first occurrence wins
    positions: HashMap<String, usize>,
    /// Position of each kind's first entry, for resources without an id
    kind_positions: HashMap<ResourceType, usize>,
    next_position: usize,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut graph = Self::new();
        for resource in resources {
            graph.push(resource);
        }
        graph
    }

    pub fn from_bundle(bundle: &Bundle) -> Self {
        let mut graph = Self::new();
        for value in bundle.resources() {
            match Resource::from_value(value.clone()) {
                Ok(resource) => graph.push(resource),
                Err(err) => {
                    tracing::debug!("keeping unmodelled entry as is: {err}");
                    let position = graph.claim_position();
                    graph.unmodelled.push((position, value.clone()));
                }
            }
        }
        graph
    }

    fn claim_position(&mut self) -> usize {
        let position = self.next_position;
        self.next_position += 1;
        position
    }

    pub fn push(&mut self, resource: Resource) {
        let position = self.claim_position();
        self.kind_positions.entry(resource.resource_type).or_insert(position);
        if let Some(reference) = resource.reference() {
            self.positions.entry(reference).or_insert(position);
        }
        self.resources.entry(resource.resource_type).or_default().push(resource);
    }

    pub fn get(&self, resource_type: ResourceType) -> &[Resource] {
        self.resources.get(&resource_type).map_or(&[], Vec::as_slice)
    }

    /// Move a kind's resources out, leaving its slot in place
    pub fn take(&mut self, resource_type: ResourceType) -> Vec<Resource> {
        self.resources
            .get_mut(&resource_type)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn put(&mut self, resource_type: ResourceType, resources: Vec<Resource>) {
        self.resources.insert(resource_type, resources);
    }

    pub fn has(&self, resource_type: ResourceType) -> bool {
        !self.get(resource_type).is_empty()
    }

    pub fn resource_types(&self) -> Vec<ResourceType> {
        self.resources.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.resources.values_mut().flatten()
    }

    /// Entries whose kind is not modelled, as raw JSON
    pub fn unmodelled(&self) -> impl Iterator<Item = &Value> {
        self.unmodelled.iter().map(|(_, value)| value)
    }

    pub fn unmodelled_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.unmodelled.iter_mut().map(|(_, value)| value)
    }

    fn position_of(&self, resource: &Resource) -> usize {
        resource
            .reference()
            .and_then(|reference| self.positions.get(&reference))
            .or_else(|| self.kind_positions.get(&resource.resource_type))
            .copied()
            .unwrap_or(usize::MAX)
    }

    /// Apply `f` to every resource, dropping those for which it returns false
    pub fn retain_mut(&mut self, mut f: impl FnMut(&mut Resource) -> bool) {
        for resources in self.resources.values_mut() {
            resources.retain_mut(&mut f);
        }
    }

    pub fn len(&self) -> usize {
        self.resources.values().map(Vec::len).sum::<usize>() + self.unmodelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Output bundle of `template`'s type and metadata, without `excluded` kinds
    pub fn into_bundle(self, template: &Bundle, excluded: &[ResourceType]) -> Bundle {
        let mut bundle = Bundle::new(template.bundle_type.clone());
        bundle.id = template.id.clone();
        bundle.timestamp = template.timestamp.clone();
        bundle.extensions = template.extensions.clone();

        let mut ordered: Vec<(usize, Value)> = self
            .resources
            .iter()
            .filter(|(resource_type, _)| !excluded.contains(resource_type))
            .flat_map(|(_, resources)| resources)
            .map(|resource| (self.position_of(resource), resource.to_value()))
            .collect();
        ordered.extend(self.unmodelled);
        ordered.sort_by_key(|(position, _)| *position);

        bundle.set_entries(ordered.into_iter().map(|(_, value)| BundleEntry::from_resource(value)).collect());
        bundle
    }
}
