//! FHIR record deduplication
//!
//! Collapses near-duplicate clinical records into one maximally complete
//! record each, and keeps every reference in the graph pointing at a
//! resource that still exists.
//!
//! # Module Organization
//!
//! - `codes`, `date`, `address`, `npi`: normalized values used in match keys
//! - `merge`, `status`: structural merge and status precedence
//! - `fold`: the keyed fold shared by every strategy
//! - `strategies`: one matching rule set per resource kind
//! - `dispatch`: routes a homogeneous list to its strategy
//! - `references`, `document_reference`, `orchestrator`: whole-graph runs
//! - `diff`: compares two snapshots of one resource kind
//!
//! # Example
//!
//! ```rust
//! use ferrum_dedup::{deduplicate_fhir, Bundle, BundleType};
//! use serde_json::json;
//!
//! let condition = |id: &str| json!({
//!     "resourceType": "Condition",
//!     "id": id,
//!     "code": {"coding": [{"system": "http://hl7.org/fhir/sid/icd-10-cm", "code": "I10"}]},
//!     "onsetDateTime": "2021-06-01"
//! });
//! let bundle = Bundle::from_resources(
//!     BundleType::Collection,
//!     vec![json!({"resourceType": "Patient", "id": "p"}), condition("a"), condition("b")],
//! );
//!
//! let deduplicated = deduplicate_fhir(&bundle);
//! assert_eq!(deduplicated.total, Some(2));
//! ```

pub mod address;
pub mod capture;
pub mod codes;
pub mod config;
pub mod date;
pub mod diff;
pub mod dispatch;
pub mod document_reference;
pub mod error;
pub mod fold;
pub mod graph;
pub mod merge;
pub mod npi;
pub mod orchestrator;
pub mod references;
pub mod status;
pub mod strategies;

pub use capture::{Capture, RecordingCapture, TracingCapture};
pub use config::{DedupConfig, DedupConfigBuilder};
pub use date::{get_date_from_resource, get_performed_date_from_resource, DateFormat};
pub use diff::{compute_resource_diff, compute_resources_xor, ResourcesXor};
pub use dispatch::{deduplicate_resources, strategy_for, Strategy};
pub use document_reference::is_doc_status_superseded;
pub use error::{ConfigError, Error, Result};
pub use fold::{DeduplicationResult, ReplacementMap};
pub use graph::ResourceGraph;
pub use merge::combine_two_resources;
pub use orchestrator::{deduplicate_fhir, DedupOutcome, Deduplicator, RunContext};
pub use status::{pick_most_descriptive_status, StatusRanking};
pub use ferrum_models::{Bundle, BundleEntry, BundleType, Resource, ResourceType};
