//! Status precedence
//!
//! When two records of the same fact disagree on `status`, the more
//! clinically descriptive one survives. Each resource type ranks its status
//! codes; rank 0 is the least descriptive and doubles as the default when
//! neither side has a status.

use crate::{Error, Result};
use phf::phf_map;

/// Rank table for one resource type's `status` codes
#[derive(Debug)]
pub struct StatusRanking {
    pub resource_type: &'static str,
    ranks: &'static phf::Map<&'static str, u8>,
}

impl StatusRanking {
    pub fn rank(&self, status: &str) -> Option<u8> {
        self.ranks.get(status).copied()
    }

    /// The rank-0 status, if the table defines exactly one
    pub fn lowest(&self) -> Result<&'static str> {
        let mut zero = self.ranks.entries().filter(|(_, rank)| **rank == 0).map(|(s, _)| *s);
        match (zero.next(), zero.next()) {
            (Some(status), None) => Ok(status),
            _ => Err(Error::InvalidStatusRanking(self.resource_type)),
        }
    }
}

/// Of two statuses, the more descriptive one.
///
/// Unranked statuses sort below every ranked one; ties go to `incoming`.
/// When both are absent the table's rank-0 status is returned.
pub fn pick_most_descriptive_status(
    ranking: &StatusRanking,
    existing: Option<&str>,
    incoming: Option<&str>,
) -> Result<String> {
    match (existing, incoming) {
        (Some(e), Some(i)) => {
            let winner = if ranking.rank(e) > ranking.rank(i) { e } else { i };
            Ok(winner.to_string())
        }
        (Some(s), None) | (None, Some(s)) => Ok(s.to_string()),
        (None, None) => ranking.lowest().map(str::to_string),
    }
}

static MEDICATION_REQUEST: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "entered-in-error" => 1,
    "draft" => 2,
    "on-hold" => 3,
    "active" => 4,
    "stopped" => 5,
    "cancelled" => 6,
    "completed" => 7,
};

static MEDICATION_STATEMENT: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "entered-in-error" => 1,
    "not-taken" => 2,
    "intended" => 3,
    "on-hold" => 4,
    "active" => 5,
    "stopped" => 6,
    "completed" => 7,
};

static MEDICATION_ADMINISTRATION: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "entered-in-error" => 1,
    "not-done" => 2,
    "on-hold" => 3,
    "in-progress" => 4,
    "stopped" => 5,
    "completed" => 6,
};

static MEDICATION_DISPENSE: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "entered-in-error" => 1,
    "preparation" => 2,
    "in-progress" => 3,
    "on-hold" => 4,
    "declined" => 5,
    "cancelled" => 6,
    "stopped" => 7,
    "completed" => 8,
};

static IMMUNIZATION: phf::Map<&'static str, u8> = phf_map! {
    "entered-in-error" => 0,
    "not-done" => 1,
    "completed" => 2,
};

static PROCEDURE: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "entered-in-error" => 1,
    "preparation" => 2,
    "not-done" => 3,
    "on-hold" => 4,
    "stopped" => 5,
    "in-progress" => 6,
    "completed" => 7,
};

static OBSERVATION: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "entered-in-error" => 1,
    "registered" => 2,
    "preliminary" => 3,
    "cancelled" => 4,
    "amended" => 5,
    "corrected" => 6,
    "final" => 7,
};

static DIAGNOSTIC_REPORT: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "entered-in-error" => 1,
    "registered" => 2,
    "partial" => 3,
    "preliminary" => 4,
    "cancelled" => 5,
    "appended" => 6,
    "amended" => 7,
    "corrected" => 8,
    "final" => 9,
};

static CARE_PLAN: phf::Map<&'static str, u8> = phf_map! {
    "unknown" => 0,
    "draft" => 1,
    "entered-in-error" => 2,
    "on-hold" => 3,
    "revoked" => 4,
    "active" => 5,
    "completed" => 6,
};

static FAMILY_MEMBER_HISTORY: phf::Map<&'static str, u8> = phf_map! {
    "entered-in-error" => 0,
    "health-unknown" => 1,
    "partial" => 2,
    "completed" => 3,
};

static COVERAGE: phf::Map<&'static str, u8> = phf_map! {
    "entered-in-error" => 0,
    "draft" => 1,
    "cancelled" => 2,
    "active" => 3,
};

static COMPOSITION: phf::Map<&'static str, u8> = phf_map! {
    "entered-in-error" => 0,
    "preliminary" => 1,
    "amended" => 2,
    "final" => 3,
};

pub static MEDICATION_REQUEST_STATUS: StatusRanking = StatusRanking {
    resource_type: "MedicationRequest",
    ranks: &MEDICATION_REQUEST,
};
pub static MEDICATION_STATEMENT_STATUS: StatusRanking = StatusRanking {
    resource_type: "MedicationStatement",
    ranks: &MEDICATION_STATEMENT,
};
pub static MEDICATION_ADMINISTRATION_STATUS: StatusRanking = StatusRanking {
    resource_type: "MedicationAdministration",
    ranks: &MEDICATION_ADMINISTRATION,
};
pub static MEDICATION_DISPENSE_STATUS: StatusRanking = StatusRanking {
    resource_type: "MedicationDispense",
    ranks: &MEDICATION_DISPENSE,
};
pub static IMMUNIZATION_STATUS: StatusRanking = StatusRanking {
    resource_type: "Immunization",
    ranks: &IMMUNIZATION,
};
pub static PROCEDURE_STATUS: StatusRanking = StatusRanking {
    resource_type: "Procedure",
    ranks: &PROCEDURE,
};
pub static OBSERVATION_STATUS: StatusRanking = StatusRanking {
    resource_type: "Observation",
    ranks: &OBSERVATION,
};
pub static DIAGNOSTIC_REPORT_STATUS: StatusRanking = StatusRanking {
    resource_type: "DiagnosticReport",
    ranks: &DIAGNOSTIC_REPORT,
};
pub static CARE_PLAN_STATUS: StatusRanking = StatusRanking {
    resource_type: "CarePlan",
    ranks: &CARE_PLAN,
};
pub static FAMILY_MEMBER_HISTORY_STATUS: StatusRanking = StatusRanking {
    resource_type: "FamilyMemberHistory",
    ranks: &FAMILY_MEMBER_HISTORY,
};
pub static COVERAGE_STATUS: StatusRanking = StatusRanking {
    resource_type: "Coverage",
    ranks: &COVERAGE,
};
pub static COMPOSITION_STATUS: StatusRanking = StatusRanking {
    resource_type: "Composition",
    ranks: &COMPOSITION,
};

pub static ALL_RANKINGS: [&StatusRanking; 12] = [
    &MEDICATION_REQUEST_STATUS,
    &MEDICATION_STATEMENT_STATUS,
    &MEDICATION_ADMINISTRATION_STATUS,
    &MEDICATION_DISPENSE_STATUS,
    &IMMUNIZATION_STATUS,
    &PROCEDURE_STATUS,
    &OBSERVATION_STATUS,
    &DIAGNOSTIC_REPORT_STATUS,
    &CARE_PLAN_STATUS,
    &FAMILY_MEMBER_HISTORY_STATUS,
    &COVERAGE_STATUS,
    &COMPOSITION_STATUS,
];
