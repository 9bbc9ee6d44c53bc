//! Whole-graph deduplication
//!
//! [`Deduplicator`] runs every strategy over a [`ResourceGraph`] in a fixed
//! order. Kinds whose keys embed references to other kinds run after those
//! kinds, and their references are rewritten with the fresh merge map first,
//! so keys never point at a consumed resource.
//!
//! After the last strategy the combined merge map is applied to every
//! resource, references to excluded resources are cleaned up in two passes,
//! and repeated references inside each resource are dropped.

use crate::capture::{Capture, TracingCapture};
use crate::config::DedupConfig;
use crate::dispatch::{run_strategy, strategy_for};
use crate::document_reference::filter_document_references;
use crate::error::ConfigError;
use crate::fold::{extend_replacements, DeduplicationResult, ReplacementMap};
use crate::graph::ResourceGraph;
use crate::references::{
    remove_dangling_from_value, remove_dangling_references, remove_duplicate_references,
    remove_duplicate_references_in_value, Cleanup, ReplacementLookup,
};
use ferrum_models::{Bundle, ResourceType};
use indexmap::IndexSet;
use serde_json::json;
use std::sync::Arc;

pub const MISSING_PATIENT_MESSAGE: &str = "Missing patient resource";

/// Kinds keyed on `medicationReference`
const MEDICATION_RELATED: [ResourceType; 4] = [
    ResourceType::MedicationAdministration,
    ResourceType::MedicationDispense,
    ResourceType::MedicationRequest,
    ResourceType::MedicationStatement,
];

/// Kinds with no ordering constraint among themselves
const INDEPENDENT: [ResourceType; 11] = [
    ResourceType::Condition,
    ResourceType::AllergyIntolerance,
    ResourceType::Encounter,
    ResourceType::DiagnosticReport,
    ResourceType::Immunization,
    ResourceType::Procedure,
    ResourceType::Observation,
    ResourceType::Location,
    ResourceType::RelatedPerson,
    ResourceType::FamilyMemberHistory,
    ResourceType::CarePlan,
];

/// Identifiers attached to one run's logs and alerts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    pub cx_id: Option<String>,
    pub patient_id: Option<String>,
}

impl RunContext {
    pub fn new(cx_id: impl Into<String>, patient_id: impl Into<String>) -> Self {
        Self {
            cx_id: Some(cx_id.into()),
            patient_id: Some(patient_id.into()),
        }
    }
}

/// Result of one run over a graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub graph: ResourceGraph,
    /// Every merge of the run, master to consumed
    pub replacement_map: ReplacementMap,
    /// References to every resource excluded by the run
    pub dangling_references: IndexSet<String>,
}

/// Reusable deduplicator: owns its settings and alert sink
pub struct Deduplicator {
    config: DedupConfig,
    capture: Arc<dyn Capture>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            capture: Arc::new(TracingCapture),
        }
    }

    pub fn from_config(config: &DedupConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.clone()))
    }

    pub fn with_capture(mut self, capture: Arc<dyn Capture>) -> Self {
        self.capture = capture;
        self
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Deduplicate `graph` and restore reference consistency
    pub fn run(&self, graph: ResourceGraph, context: &RunContext) -> DedupOutcome {
        let span = tracing::info_span!(
            "deduplicate",
            cx_id = context.cx_id.as_deref().unwrap_or_default(),
            patient_id = context.patient_id.as_deref().unwrap_or_default(),
        );
        let _enter = span.enter();
        Pipeline::new(self, graph, context).execute()
    }

    /// Deduplicate a bundle; the output keeps the input's type and metadata
    pub fn deduplicate_bundle(&self, bundle: &Bundle, context: &RunContext) -> Bundle {
        let outcome = self.run(ResourceGraph::from_bundle(bundle), context);
        outcome.graph.into_bundle(bundle, &self.config.excluded_output_types)
    }
}

/// Deduplicate `bundle` with default settings
pub fn deduplicate_fhir(bundle: &Bundle) -> Bundle {
    Deduplicator::default().deduplicate_bundle(bundle, &RunContext::default())
}

/// Short-lived state of one run
struct Pipeline<'a> {
    deduplicator: &'a Deduplicator,
    context: &'a RunContext,
    graph: ResourceGraph,
    replacements: ReplacementMap,
    dangling: IndexSet<String>,
}

impl<'a> Pipeline<'a> {
    fn new(deduplicator: &'a Deduplicator, graph: ResourceGraph, context: &'a RunContext) -> Self {
        Self {
            deduplicator,
            context,
            graph,
            replacements: ReplacementMap::new(),
            dangling: IndexSet::new(),
        }
    }

    fn execute(mut self) -> DedupOutcome {
        let input = self.graph.len();

        self.dedup(ResourceType::Composition);

        let medications = self.dedup(ResourceType::Medication);
        for resource_type in MEDICATION_RELATED {
            self.rewrite(resource_type, &medications);
        }
        for resource_type in MEDICATION_RELATED {
            self.dedup(resource_type);
        }

        self.filter_documents();

        let mut providers = self.dedup(ResourceType::Practitioner);
        let organizations = self.dedup(ResourceType::Organization);
        extend_replacements(&mut providers, organizations.clone());
        self.rewrite(ResourceType::DiagnosticReport, &providers);

        for resource_type in INDEPENDENT {
            self.dedup(resource_type);
        }

        let mut payors = medications;
        extend_replacements(&mut payors, organizations);
        self.rewrite(ResourceType::Coverage, &payors);
        self.dedup(ResourceType::Coverage);

        self.apply_all_replacements();
        let dangling = self.dangling.clone();
        let removed = self.clean_dangling(&dangling);
        if !removed.is_empty() {
            let cascaded = self.clean_dangling(&removed);
            self.dangling.extend(removed);
            self.dangling.extend(cascaded);
        }

        self.check_patient();
        self.remove_duplicate_references();

        tracing::info!(
            input,
            output = self.graph.len(),
            merged = self.replacements.values().map(Vec::len).sum::<usize>(),
            dangling = self.dangling.len(),
            "deduplication finished"
        );

        DedupOutcome {
            graph: self.graph,
            replacement_map: self.replacements,
            dangling_references: self.dangling,
        }
    }

    /// Run the strategy of `resource_type`; returns this step's merge map
    fn dedup(&mut self, resource_type: ResourceType) -> ReplacementMap {
        let Some(strategy) = strategy_for(resource_type) else {
            return ReplacementMap::new();
        };
        if !self.graph.has(resource_type) {
            return ReplacementMap::new();
        }
        let result = run_strategy(resource_type, strategy, self.graph.take(resource_type));
        self.commit(resource_type, result)
    }

    fn commit(&mut self, resource_type: ResourceType, result: DeduplicationResult) -> ReplacementMap {
        let DeduplicationResult {
            resources,
            replacement_map,
            dangling_references,
        } = result;
        self.graph.put(resource_type, resources);
        self.dangling.extend(dangling_references);
        extend_replacements(&mut self.replacements, replacement_map.clone());
        replacement_map
    }

    fn filter_documents(&mut self) {
        if !self.graph.has(ResourceType::DocumentReference) {
            return;
        }
        let result = filter_document_references(self.graph.take(ResourceType::DocumentReference));
        tracing::debug!(
            kept = result.resources.len(),
            excluded = result.dangling_references.len(),
            "filtered document references"
        );
        self.commit(ResourceType::DocumentReference, result);
    }

    fn rewrite(&mut self, resource_type: ResourceType, map: &ReplacementMap) {
        if map.is_empty() || !self.graph.has(resource_type) {
            return;
        }
        let lookup = ReplacementLookup::new(map);
        let mut resources = self.graph.take(resource_type);
        let rewritten: usize = resources.iter_mut().map(|r| lookup.apply(r)).sum();
        self.graph.put(resource_type, resources);
        tracing::debug!(resource_type = %resource_type, rewritten, "rewrote references");
    }

    fn apply_all_replacements(&mut self) {
        let lookup = ReplacementLookup::new(&self.replacements);
        if lookup.is_empty() {
            return;
        }
        let rewritten: usize = self.graph.iter_mut().map(|r| lookup.apply(r)).sum::<usize>()
            + self.graph.unmodelled_mut().map(|v| lookup.apply_value(v)).sum::<usize>();
        tracing::debug!(rewritten, "applied merge map to every resource");
    }

    /// Scrub references to `dangling`; returns references of removed resources
    fn clean_dangling(&mut self, dangling: &IndexSet<String>) -> IndexSet<String> {
        let mut removed = IndexSet::new();
        if dangling.is_empty() {
            return removed;
        }
        let placeholder = self.deduplicator.config.missing_author_display.as_str();
        self.graph.retain_mut(|resource| {
            match remove_dangling_references(resource, dangling, placeholder) {
                Cleanup::Keep => true,
                Cleanup::Remove => {
                    if let Some(reference) = resource.reference() {
                        removed.insert(reference);
                    }
                    false
                }
            }
        });
        let scrubbed = self
            .graph
            .unmodelled_mut()
            .map(|value| remove_dangling_from_value(value, dangling))
            .filter(|&changed| changed)
            .count();
        tracing::debug!(
            dangling = dangling.len(),
            removed = removed.len(),
            scrubbed,
            "cleaned dangling references"
        );
        removed
    }

    fn check_patient(&self) {
        if !self.deduplicator.config.alert_on_missing_patient || self.graph.has(ResourceType::Patient) {
            return;
        }
        self.deduplicator.capture.message(
            MISSING_PATIENT_MESSAGE,
            &json!({
                "cxId": self.context.cx_id,
                "patientId": self.context.patient_id,
            }),
        );
    }

    fn remove_duplicate_references(&mut self) {
        let removed: usize = self.graph.iter_mut().map(remove_duplicate_references).sum::<usize>()
            + self.graph.unmodelled_mut().map(remove_duplicate_references_in_value).sum::<usize>();
        if removed > 0 {
            tracing::debug!(removed, "removed repeated references");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RecordingCapture;
    use ferrum_models::Resource;
    use serde_json::Value;

    fn resource(value: Value) -> Resource {
        Resource::from_value(value).unwrap()
    }

    fn patient() -> Resource {
        resource(json!({"resourceType": "Patient", "id": "pat"}))
    }

    fn medication(id: &str, rxnorm: &str) -> Resource {
        resource(json!({
            "resourceType": "Medication",
            "id": id,
            "code": {"coding": [{"system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": rxnorm}]}
        }))
    }

    #[test]
    fn medication_merge_rewrites_statements_before_keying() {
        let statement = |id: &str, medication: &str| {
            resource(json!({
                "resourceType": "MedicationStatement",
                "id": id,
                "medicationReference": {"reference": medication},
                "effectivePeriod": {"start": "2022-01-01"}
            }))
        };
        let graph = ResourceGraph::from_resources(vec![
            patient(),
            medication("A", "1191"),
            medication("B", "1191"),
            statement("s1", "Medication/A"),
            statement("s2", "Medication/B"),
        ]);
        let outcome = Deduplicator::default().run(graph, &RunContext::default());
        let statements = outcome.graph.get(ResourceType::MedicationStatement);
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].get("medicationReference"),
            Some(&json!({"reference": "Medication/A"}))
        );
        assert_eq!(outcome.replacement_map.get("Medication/A"), Some(&vec!["Medication/B".to_string()]));
    }

    #[test]
    fn missing_patient_raises_one_alert() {
        let capture = Arc::new(RecordingCapture::new());
        let deduplicator = Deduplicator::default().with_capture(capture.clone());
        deduplicator.run(ResourceGraph::new(), &RunContext::new("cx", "p1"));
        let messages = capture.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, MISSING_PATIENT_MESSAGE);
        assert_eq!(messages[0].1, json!({"cxId": "cx", "patientId": "p1"}));

        deduplicator.run(ResourceGraph::from_resources(vec![patient()]), &RunContext::default());
        assert_eq!(capture.messages().len(), 1);
    }

    #[test]
    fn alert_can_be_disabled() {
        let capture = Arc::new(RecordingCapture::new());
        let config = DedupConfig::builder().alert_on_missing_patient(false).build();
        Deduplicator::new(config)
            .with_capture(capture.clone())
            .run(ResourceGraph::new(), &RunContext::default());
        assert!(capture.messages().is_empty());
    }

    #[test]
    fn from_config_validates() {
        let config = DedupConfig::builder().exclude_output_type(ResourceType::Patient).build();
        assert!(matches!(Deduplicator::from_config(&config), Err(ConfigError::PatientExcluded)));
        assert!(Deduplicator::from_config(&DedupConfig::default()).is_ok());
    }

    #[test]
    fn superseded_documents_leave_compositions() {
        let graph = ResourceGraph::from_resources(vec![
            patient(),
            resource(json!({"resourceType": "DocumentReference", "id": "old", "status": "superseded"})),
            resource(json!({
                "resourceType": "Composition",
                "id": "doc",
                "section": [{"title": "Notes", "entry": [{"reference": "DocumentReference/old"}]}]
            })),
        ]);
        let outcome = Deduplicator::default().run(graph, &RunContext::default());
        assert!(outcome.graph.get(ResourceType::DocumentReference).is_empty());
        let composition = &outcome.graph.get(ResourceType::Composition)[0];
        assert_eq!(composition.get("section"), Some(&json!([{"title": "Notes"}])));
    }

    #[test]
    fn excluded_kinds_stay_out_of_the_bundle() {
        let bundle = Bundle::from_resources(
            ferrum_models::BundleType::Collection,
            vec![
                json!({"resourceType": "Patient", "id": "pat"}),
                json!({"resourceType": "Device", "id": "dev"}),
            ],
        );
        let out = deduplicate_fhir(&bundle);
        assert_eq!(out.total, Some(1));
        assert_eq!(out.bundle_type, bundle.bundle_type);
    }
}
