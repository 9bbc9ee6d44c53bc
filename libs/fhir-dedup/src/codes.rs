//! Terminology helpers
//!
//! - Recognises the coding systems the matching rules key on, by URL fragment
//!   or by OID
//! - Detects "unknown" placeholder codings and blacklisted "no known ..." text
//! - Extracts a usable display string from a concept

use ferrum_models::{CodeableConcept, Coding};

pub const UNKNOWN_SYSTEM: &str = "http://terminology.hl7.org/ValueSet/v3-Unknown";
pub const UNKNOWN_CODE: &str = "UNK";
pub const UNKNOWN_DISPLAY: &str = "unknown";

const NO_KNOWN_SUBSTRING: &str = "no known";

/// Coding systems used as match keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeSystem {
    Snomed,
    Icd10,
    Icd9,
    Loinc,
    RxNorm,
    Ndc,
    Cpt,
    Cvx,
}

impl CodeSystem {
    pub const ALL: [CodeSystem; 8] = [
        CodeSystem::Snomed,
        CodeSystem::Icd10,
        CodeSystem::Icd9,
        CodeSystem::Loinc,
        CodeSystem::RxNorm,
        CodeSystem::Ndc,
        CodeSystem::Cpt,
        CodeSystem::Cvx,
    ];

    fn url_fragments(&self) -> &'static [&'static str] {
        match self {
            CodeSystem::Snomed => &["snomed.info/sct", "snomed"],
            CodeSystem::Icd10 => &["hl7.org/fhir/sid/icd-10", "icd-10", "icd10"],
            CodeSystem::Icd9 => &["hl7.org/fhir/sid/icd-9", "icd-9", "icd9"],
            CodeSystem::Loinc => &["loinc.org"],
            CodeSystem::RxNorm => &["rxnorm"],
            CodeSystem::Ndc => &["hl7.org/fhir/sid/ndc"],
            CodeSystem::Cpt => &["ama-assn.org/go/cpt", "/cpt"],
            CodeSystem::Cvx => &["hl7.org/fhir/sid/cvx"],
        }
    }

    // OIDs share prefixes (6.1 vs 6.103), so they are compared exactly.
    fn oids(&self) -> &'static [&'static str] {
        match self {
            CodeSystem::Snomed => &["2.16.840.1.113883.6.96"],
            CodeSystem::Icd10 => &["2.16.840.1.113883.6.90", "2.16.840.1.113883.6.3"],
            CodeSystem::Icd9 => &["2.16.840.1.113883.6.103", "2.16.840.1.113883.6.104"],
            CodeSystem::Loinc => &["2.16.840.1.113883.6.1"],
            CodeSystem::RxNorm => &["2.16.840.1.113883.6.88"],
            CodeSystem::Ndc => &["2.16.840.1.113883.6.69"],
            CodeSystem::Cpt => &["2.16.840.1.113883.6.12"],
            CodeSystem::Cvx => &["2.16.840.1.113883.12.292"],
        }
    }

    /// Whether a coding's `system` belongs to this code system
    pub fn matches(&self, system: &str) -> bool {
        let system = system.trim().to_ascii_lowercase();
        let oid = system.strip_prefix("urn:oid:").unwrap_or(&system);
        if self.oids().contains(&oid) {
            return true;
        }
        self.url_fragments().iter().any(|f| system.contains(f))
    }

    pub fn of(system: &str) -> Option<CodeSystem> {
        CodeSystem::ALL.into_iter().find(|s| s.matches(system))
    }
}

/// First code found per recognised system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedCodes {
    pub snomed: Option<String>,
    pub icd10: Option<String>,
    pub icd9: Option<String>,
    pub loinc: Option<String>,
    pub rxnorm: Option<String>,
    pub ndc: Option<String>,
    pub cpt: Option<String>,
    pub cvx: Option<String>,
}

impl ExtractedCodes {
    pub fn get(&self, system: CodeSystem) -> Option<&str> {
        let slot = match system {
            CodeSystem::Snomed => &self.snomed,
            CodeSystem::Icd10 => &self.icd10,
            CodeSystem::Icd9 => &self.icd9,
            CodeSystem::Loinc => &self.loinc,
            CodeSystem::RxNorm => &self.rxnorm,
            CodeSystem::Ndc => &self.ndc,
            CodeSystem::Cpt => &self.cpt,
            CodeSystem::Cvx => &self.cvx,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, system: CodeSystem) -> &mut Option<String> {
        match system {
            CodeSystem::Snomed => &mut self.snomed,
            CodeSystem::Icd10 => &mut self.icd10,
            CodeSystem::Icd9 => &mut self.icd9,
            CodeSystem::Loinc => &mut self.loinc,
            CodeSystem::RxNorm => &mut self.rxnorm,
            CodeSystem::Ndc => &mut self.ndc,
            CodeSystem::Cpt => &mut self.cpt,
            CodeSystem::Cvx => &mut self.cvx,
        }
    }

    /// First code among `systems`, in the given priority order
    pub fn first_of(&self, systems: &[CodeSystem]) -> Option<(CodeSystem, &str)> {
        systems
            .iter()
            .find_map(|s| self.get(*s).map(|code| (*s, code)))
    }

    pub fn is_empty(&self) -> bool {
        CodeSystem::ALL.iter().all(|s| self.get(*s).is_none())
    }
}

/// Scan a concept's codings for every recognised system.
///
/// Codes are trimmed and lowercased; the first coding per system wins.
pub fn extract_codes(concept: &CodeableConcept) -> ExtractedCodes {
    let mut codes = ExtractedCodes::default();
    for coding in &concept.coding {
        let (Some(system), Some(code)) = (coding.system.as_deref(), coding.code.as_deref()) else {
            continue;
        };
        let code = code.trim();
        if code.is_empty() || is_unknown_coding(coding, None) {
            continue;
        }
        for cs in CodeSystem::ALL {
            if cs.matches(system) {
                let slot = codes.slot_mut(cs);
                if slot.is_none() {
                    *slot = Some(code.to_lowercase());
                }
            }
        }
    }
    codes
}

pub fn unknown_coding() -> Coding {
    Coding {
        system: Some(UNKNOWN_SYSTEM.to_string()),
        code: Some(UNKNOWN_CODE.to_string()),
        display: Some(UNKNOWN_DISPLAY.to_string()),
        ..Default::default()
    }
}

pub fn unknown_concept() -> CodeableConcept {
    CodeableConcept {
        coding: vec![unknown_coding()],
        text: Some(UNKNOWN_DISPLAY.to_string()),
    }
}

/// Placeholder strings that carry no information
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.eq_ignore_ascii_case(UNKNOWN_DISPLAY) || v.eq_ignore_ascii_case(UNKNOWN_CODE)
}

/// Whether a coding is the "unknown" placeholder.
///
/// A coding counts as unknown when its code contains `unk` (or is absent) and
/// neither its display nor the owning concept's text say anything else.
pub fn is_unknown_coding(coding: &Coding, text: Option<&str>) -> bool {
    if coding.system.as_deref() == Some(UNKNOWN_SYSTEM) {
        return true;
    }
    let code = coding.code.as_deref().map(|c| c.trim().to_lowercase());
    let display_ok = coding
        .display
        .as_deref()
        .map_or(true, |d| d.trim().eq_ignore_ascii_case(UNKNOWN_DISPLAY));
    let text_ok = text.map_or(true, |t| t.trim().eq_ignore_ascii_case(UNKNOWN_DISPLAY));
    match code.as_deref() {
        Some(c) if !c.is_empty() => c.contains("unk") && display_ok && text_ok,
        _ => display_ok && text_ok,
    }
}

/// Codings that are not the unknown placeholder
pub fn known_codings(concept: &CodeableConcept) -> Vec<Coding> {
    concept
        .coding
        .iter()
        .filter(|c| !is_unknown_coding(c, None))
        .cloned()
        .collect()
}

/// Concept that carries no information beyond "unknown"
pub fn is_unknown_concept(concept: &CodeableConcept) -> bool {
    let text_unknown = concept.text.as_deref().map_or(true, is_placeholder);
    text_unknown && concept.coding.iter().all(|c| is_unknown_coding(c, None))
}

/// "No known allergies"-style concepts, or concepts without a known coding
pub fn has_blacklisted_text(concept: &CodeableConcept) -> bool {
    match concept.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => text.to_lowercase().contains(NO_KNOWN_SUBSTRING),
        None => known_codings(concept).is_empty(),
    }
}

/// Human readable name of a concept: the first known coding display, else
/// the text unless it is a placeholder.
pub fn extract_display_from_concept(concept: &CodeableConcept) -> Option<String> {
    let display = concept
        .coding
        .iter()
        .filter(|c| !c.code.as_deref().is_some_and(|code| code == UNKNOWN_CODE))
        .filter_map(|c| c.display.as_deref())
        .map(str::trim)
        .find(|d| !d.is_empty() && !d.eq_ignore_ascii_case(UNKNOWN_DISPLAY));
    if let Some(display) = display {
        return Some(display.to_string());
    }
    concept
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.to_lowercase().contains(UNKNOWN_DISPLAY))
        .map(str::to_string)
}

/// Lowercased, whitespace-collapsed form used inside match keys
pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
