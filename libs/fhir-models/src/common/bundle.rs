//! FHIR Bundle model
//!
//! Version-agnostic model for Bundles that works across R4, R4B, and R5.

use super::error::{Error, Result};
use super::resource::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// FHIR Bundle resource
///
/// A container for a collection of resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Resource type - always "Bundle"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    /// Logical id of this artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Indicates the purpose of this bundle - how it was intended to be used
    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    /// When the bundle was assembled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Number of entries, recomputed whenever entries are replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    /// Entry in the bundle - will have a resource or information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<Vec<BundleEntry>>,

    /// Additional content beyond core fields (meta, link, signature, ...)
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "Bundle".to_string()
}

/// Type of Bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Document,
    Message,
    Transaction,
    #[serde(rename = "transaction-response")]
    TransactionResponse,
    Batch,
    #[serde(rename = "batch-response")]
    BatchResponse,
    History,
    Searchset,
    Collection,
}

/// Entry in the bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Full URL for the entry (relative to the base URL, or absolute)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    /// A resource in this bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    /// Additional content beyond core fields (request, response, search)
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl BundleEntry {
    /// Entry carrying only a resource
    pub fn from_resource(resource: Value) -> Self {
        Self {
            full_url: None,
            resource: Some(resource),
            extensions: HashMap::new(),
        }
    }
}

impl Bundle {
    /// Create a new Bundle with minimal required fields
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: None,
            bundle_type,
            timestamp: None,
            total: None,
            entry: None,
            extensions: HashMap::new(),
        }
    }

    /// Bundle of the given type holding `resources`, `total` set
    pub fn from_resources(bundle_type: BundleType, resources: impl IntoIterator<Item = Value>) -> Self {
        let mut bundle = Self::new(bundle_type);
        bundle.set_entries(resources.into_iter().map(BundleEntry::from_resource).collect());
        bundle
    }

    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    /// Convert to JSON Value
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    /// Get the number of entries in the bundle
    pub fn entry_count(&self) -> usize {
        self.entry.as_ref().map(|e| e.len()).unwrap_or(0)
    }

    /// Get entries as a slice
    pub fn entries(&self) -> &[BundleEntry] {
        self.entry.as_deref().unwrap_or(&[])
    }

    /// Raw resources carried by the entries, in entry order
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entries().iter().filter_map(|e| e.resource.as_ref())
    }

    /// Typed resources carried by the entries
    ///
    /// Entries whose resource type is not modelled are skipped.
    pub fn typed_resources(&self) -> Vec<Resource> {
        self.resources()
            .filter_map(|v| Resource::from_value(v.clone()).ok())
            .collect()
    }

    /// Replace all entries and recompute `total`
    pub fn set_entries(&mut self, entries: Vec<BundleEntry>) {
        self.total = Some(entries.len() as u32);
        self.entry = Some(entries);
    }

    /// Add an entry to the bundle
    pub fn add_entry(&mut self, entry: BundleEntry) {
        self.entry.get_or_insert_with(Vec::new).push(entry);
    }
}
