//! Administrations, dispenses, requests and statements.
//!
//! All four are keyed on the medication they point at plus the date that
//! matters for the kind of event. The orchestrator rewrites
//! `medicationReference` with the medication merge map before these run, so
//! two records of the same drug always share a reference here.

use super::reference_at;
use crate::date::{lenient_date, DateFormat, DateSource, CLINICAL_EVENT_DATES};
use crate::fold::{fold_resources, make_key, resolve_status, DeduplicationResult, Keyed, MergeOptions};
use crate::status::{
    MEDICATION_ADMINISTRATION_STATUS, MEDICATION_DISPENSE_STATUS, MEDICATION_REQUEST_STATUS,
    MEDICATION_STATEMENT_STATUS,
};
use ferrum_models::Resource;

pub(crate) const MEDICATION_REFERENCE: &str = "medicationReference";

const DISPENSE_DATES: &[DateSource] = &[
    DateSource::Instant("whenHandedOver"),
    DateSource::Instant("whenPrepared"),
];

const REQUEST_DATES: &[DateSource] = &[DateSource::Instant("authoredOn")];

fn medication_event_key(resource: &Resource, dates: &[DateSource]) -> Keyed {
    let Some(medication) = reference_at(resource, MEDICATION_REFERENCE) else {
        return Keyed::Dangling;
    };
    let date = lenient_date(resource, dates, DateFormat::Date);
    Keyed::single(make_key("medication", (medication, date)))
}

fn administration_post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&MEDICATION_ADMINISTRATION_STATUS, merged, existing, incoming);
}

fn dispense_post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&MEDICATION_DISPENSE_STATUS, merged, existing, incoming);
}

fn request_post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&MEDICATION_REQUEST_STATUS, merged, existing, incoming);
}

fn statement_post_merge(merged: &mut Resource, existing: &Resource, incoming: &Resource) {
    resolve_status(&MEDICATION_STATEMENT_STATUS, merged, existing, incoming);
}

pub fn deduplicate_medication_administrations(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(administration_post_merge), |r| {
        medication_event_key(r, CLINICAL_EVENT_DATES)
    })
}

pub fn deduplicate_medication_dispenses(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(dispense_post_merge), |r| {
        medication_event_key(r, DISPENSE_DATES)
    })
}

pub fn deduplicate_medication_requests(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(request_post_merge), |r| {
        medication_event_key(r, REQUEST_DATES)
    })
}

pub fn deduplicate_medication_statements(resources: Vec<Resource>) -> DeduplicationResult {
    fold_resources(resources, MergeOptions::with_post_merge(statement_post_merge), |r| {
        medication_event_key(r, CLINICAL_EVENT_DATES)
    })
}
