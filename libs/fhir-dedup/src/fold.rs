//! Map-based fold
//!
//! Every matching strategy reduces to the same loop: compute the keys of each
//! resource, look them up, and either merge into the master already holding
//! one of them or register the resource as a new master.
//!
//! Keys are split into *getters* (looked up) and *setters* (registered). A
//! direct strategy uses one key for both. Flexible strategies generate the
//! combinations described in [`flexible_keys`], so a field missing on one
//! side acts as a wildcard. Level 1 maps every key to a canonical master
//! slot, level 2 is the slot vector itself.

use crate::merge::combine_two_resources;
use crate::status::{pick_most_descriptive_status, StatusRanking};
use indexmap::{IndexMap, IndexSet};
use ferrum_models::Resource;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Master reference to the references it absorbed
pub type ReplacementMap = IndexMap<String, Vec<String>>;

/// Outcome of deduplicating one resource list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeduplicationResult {
    /// Surviving resources, masters in first-seen order
    pub resources: Vec<Resource>,
    pub replacement_map: ReplacementMap,
    /// References to resources excluded because they cannot be keyed
    pub dangling_references: IndexSet<String>,
}

impl DeduplicationResult {
    pub fn merge_count(&self) -> usize {
        self.replacement_map.values().map(Vec::len).sum()
    }

    /// Append the outcome of an independent partition
    pub fn absorb(&mut self, other: DeduplicationResult) {
        self.resources.extend(other.resources);
        extend_replacements(&mut self.replacement_map, other.replacement_map);
        self.dangling_references.extend(other.dangling_references);
    }
}

/// Union `other` into `map`, appending consumed references per master
pub fn extend_replacements(map: &mut ReplacementMap, other: ReplacementMap) {
    for (master, consumed) in other {
        let entry = map.entry(master).or_default();
        for reference in consumed {
            if !entry.contains(&reference) {
                entry.push(reference);
            }
        }
    }
}

/// Hook run after the structural merge with `(merged, existing, incoming)`
pub type PostMerge = fn(&mut Resource, &Resource, &Resource);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    pub getters: Vec<String>,
    pub setters: Vec<String>,
    /// Setters standing for an absent field; retracted once a merge fills it
    pub wildcards: Vec<String>,
}

impl KeySet {
    /// One key, looked up and registered
    pub fn single(key: String) -> Self {
        Self {
            getters: vec![key.clone()],
            setters: vec![key],
            wildcards: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.getters.is_empty()
    }

    pub fn extend(&mut self, other: KeySet) {
        self.getters.extend(other.getters);
        self.setters.extend(other.setters);
        self.wildcards.extend(other.wildcards);
    }
}

/// What a strategy makes of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyed {
    Keys(KeySet),
    /// Cannot be matched; excluded and reported as dangling
    Dangling,
    /// Kept as is, never merged
    PassThrough,
}

impl Keyed {
    pub fn single(key: String) -> Self {
        Keyed::Keys(KeySet::single(key))
    }

    /// First key available among families in priority order
    pub fn first_family<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        candidates
            .into_iter()
            .flatten()
            .next()
            .map_or(Keyed::Dangling, Keyed::single)
    }

    pub fn from_keys(keys: KeySet) -> Self {
        if keys.is_empty() {
            Keyed::Dangling
        } else {
            Keyed::Keys(keys)
        }
    }
}

/// Serialize key parts into an unambiguous key string
pub fn make_key<T: Serialize>(family: &str, parts: T) -> String {
    serde_json::to_string(&(family, parts)).unwrap_or_else(|_| family.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
enum KeyPart<'a> {
    Value(&'a str),
    Missing,
    Any,
}

/// One identifying field of a flexible key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexField {
    value: Option<String>,
    exact: bool,
    anchor: bool,
}

impl FlexField {
    /// Field that every keyed resource has
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            exact: true,
            anchor: true,
        }
    }

    /// Field that may be missing; missing matches anything
    pub fn optional(value: Option<String>) -> Self {
        Self {
            value,
            exact: false,
            anchor: false,
        }
    }

    /// Optional field of which at least one anchor must be shared to match
    pub fn anchor(value: Option<String>) -> Self {
        Self {
            value,
            exact: false,
            anchor: true,
        }
    }
}

/// Getter and setter keys for the wildcard match of `fields`.
///
/// A present value contributes `{value, missing}` to getters and
/// `{value, any}` to setters; an absent one contributes `{missing, any}` and
/// `{missing}`. A getter of one resource equals a setter of another exactly
/// when every field is equal or missing on one side. Combinations without a
/// concrete anchor value are dropped, so a match always shares an anchor.
pub fn flexible_keys(family: &str, fields: &[FlexField]) -> KeySet {
    fn expand<'a>(choices: &[Vec<KeyPart<'a>>]) -> Vec<Vec<KeyPart<'a>>> {
        choices.iter().fold(vec![Vec::new()], |acc, options| {
            acc.iter()
                .flat_map(|prefix| {
                    options.iter().map(move |part| {
                        let mut next = prefix.clone();
                        next.push(part.clone());
                        next
                    })
                })
                .collect()
        })
    }

    let getter_choices: Vec<Vec<KeyPart>> = fields
        .iter()
        .map(|f| match (&f.value, f.exact) {
            (Some(v), true) => vec![KeyPart::Value(v)],
            (Some(v), false) => vec![KeyPart::Value(v), KeyPart::Missing],
            (None, _) => vec![KeyPart::Missing, KeyPart::Any],
        })
        .collect();
    let setter_choices: Vec<Vec<KeyPart>> = fields
        .iter()
        .map(|f| match (&f.value, f.exact) {
            (Some(v), true) => vec![KeyPart::Value(v)],
            (Some(v), false) => vec![KeyPart::Value(v), KeyPart::Any],
            (None, _) => vec![KeyPart::Missing],
        })
        .collect();

    let anchored = |parts: &Vec<KeyPart>| {
        fields
            .iter()
            .zip(parts)
            .any(|(f, p)| f.anchor && matches!(p, KeyPart::Value(_)))
    };
    let render = |combos: Vec<Vec<KeyPart>>| {
        combos
            .into_iter()
            .filter(|parts| anchored(parts))
            .map(|parts| make_key(family, parts))
            .collect::<Vec<_>>()
    };
    let setters = expand(&setter_choices);
    let wildcards = setters
        .iter()
        .filter(|parts| parts.iter().any(|p| matches!(p, KeyPart::Missing)))
        .cloned()
        .collect();

    KeySet {
        getters: render(expand(&getter_choices)),
        setters: render(setters),
        wildcards: render(wildcards),
    }
}

/// How merges are performed for one strategy
#[derive(Clone, Copy)]
pub struct MergeOptions {
    pub include_provenance: bool,
    pub post_merge: Option<PostMerge>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            include_provenance: true,
            post_merge: None,
        }
    }
}

impl MergeOptions {
    pub fn with_post_merge(post_merge: PostMerge) -> Self {
        Self {
            post_merge: Some(post_merge),
            ..Self::default()
        }
    }
}

enum Slot {
    Master(Resource),
    PassThrough(Resource),
}

struct Fold {
    options: MergeOptions,
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
    replacement_map: ReplacementMap,
    dangling: IndexSet<String>,
}

impl Fold {
    fn new(options: MergeOptions) -> Self {
        Self {
            options,
            slots: Vec::new(),
            index: HashMap::new(),
            replacement_map: ReplacementMap::new(),
            dangling: IndexSet::new(),
        }
    }

    fn register(&mut self, keys: Vec<String>, slot: usize) {
        for key in keys {
            self.index.entry(key).or_insert(slot);
        }
    }

    fn push<F>(&mut self, resource: Resource, keys: KeySet, key_fn: &F)
    where
        F: Fn(&Resource) -> Keyed,
    {
        let Some(slot) = keys.getters.iter().find_map(|k| self.index.get(k).copied()) else {
            self.slots.push(Slot::Master(resource));
            let slot = self.slots.len() - 1;
            self.register(keys.setters, slot);
            return;
        };

        let Some(Slot::Master(existing)) = self.slots.get_mut(slot) else {
            return;
        };
        let previous_keys = key_fn(existing);
        let mut merged = combine_two_resources(existing, &resource, self.options.include_provenance);
        if let Some(hook) = self.options.post_merge {
            hook(&mut merged, existing, &resource);
        }
        if let (Some(master_ref), Some(consumed_ref)) = (existing.reference(), resource.reference()) {
            if master_ref != consumed_ref {
                self.replacement_map.entry(master_ref).or_default().push(consumed_ref);
            }
        }
        // Setters come from the merged record, not the incoming one.
        let merged_keys = key_fn(&merged);
        *existing = merged;
        if let Keyed::Keys(merged_keys) = merged_keys {
            if let Keyed::Keys(previous) = previous_keys {
                for stale in previous.wildcards.iter().filter(|k| !merged_keys.setters.contains(k)) {
                    if self.index.get(stale) == Some(&slot) {
                        self.index.remove(stale);
                    }
                }
            }
            self.register(merged_keys.setters, slot);
        }
    }

    fn finish(self) -> DeduplicationResult {
        DeduplicationResult {
            resources: self
                .slots
                .into_iter()
                .map(|slot| match slot {
                    Slot::Master(r) | Slot::PassThrough(r) => r,
                })
                .collect(),
            replacement_map: self.replacement_map,
            dangling_references: self.dangling,
        }
    }
}

/// Fold `resources` using `key_fn` to key each one
pub fn fold_resources<F>(resources: Vec<Resource>, options: MergeOptions, key_fn: F) -> DeduplicationResult
where
    F: Fn(&Resource) -> Keyed,
{
    let mut fold = Fold::new(options);
    for resource in resources {
        match key_fn(&resource) {
            Keyed::Keys(keys) if !keys.is_empty() => fold.push(resource, keys, &key_fn),
            Keyed::Keys(_) | Keyed::Dangling => {
                if let Some(reference) = resource.reference() {
                    fold.dangling.insert(reference);
                }
            }
            Keyed::PassThrough => fold.slots.push(Slot::PassThrough(resource)),
        }
    }
    fold.finish()
}

/// Post-merge step shared by every strategy with a status ranking
pub fn resolve_status(ranking: &StatusRanking, merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    let (e, i) = (existing.get_str("status"), incoming.get_str("status"));
    if e.is_none() && i.is_none() {
        return;
    }
    match pick_most_descriptive_status(ranking, e, i) {
        Ok(status) => merged.set("status", Value::String(status)),
        Err(err) => tracing::warn!(resource_type = ranking.resource_type, "{err}"),
    }
}
