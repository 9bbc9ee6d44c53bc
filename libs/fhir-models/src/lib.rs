//! FHIR data models
//!
//! This crate provides the resource model shared by the ferrum deduplication
//! toolkit.
//!
//! # Module Organization
//!
//! - `common`: Version-agnostic models that work across FHIR R4, R4B, and R5
//!
//! # Design Philosophy
//!
//! - **Typed identity**: `resourceType` is a closed enum, `id` a plain string
//! - **Lossless**: every other element is kept as order-preserving JSON
//! - **Typed views**: datatypes such as `CodeableConcept` are deserialized on demand
//! - **Forgiving**: malformed elements read as absent instead of failing
//!
//! # Example
//!
//! ```rust
//! use ferrum_models::{CodeableConcept, Resource, ResourceType};
//! use serde_json::json;
//!
//! let resource = Resource::from_value(json!({
//!     "resourceType": "Condition",
//!     "id": "c1",
//!     "code": {
//!         "coding": [{"system": "http://snomed.info/sct", "code": "38341003"}],
//!         "text": "Hypertension"
//!     }
//! }))
//! .unwrap();
//!
//! assert_eq!(resource.resource_type, ResourceType::Condition);
//! assert_eq!(resource.reference().as_deref(), Some("Condition/c1"));
//! let code: CodeableConcept = resource.get_as("code").unwrap();
//! assert_eq!(code.coding.len(), 1);
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;
