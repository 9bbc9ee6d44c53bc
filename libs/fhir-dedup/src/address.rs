//! Address normalization
//!
//! Produces a deterministic comparison form of a postal address: lowercase,
//! punctuation removed, whitespace collapsed, common USPS street suffix,
//! direction and unit designators abbreviated, and ZIP+4 cut to five digits.

use ferrum_models::Address;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct NormalizedAddress {
    pub line: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl NormalizedAddress {
    pub fn is_empty(&self) -> bool {
        self.line.is_empty() && self.city.is_none() && self.state.is_none() && self.zip.is_none()
    }
}

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("road", "rd"),
    ("drive", "dr"),
    ("boulevard", "blvd"),
    ("lane", "ln"),
    ("court", "ct"),
    ("place", "pl"),
    ("terrace", "ter"),
    ("circle", "cir"),
    ("parkway", "pkwy"),
    ("highway", "hwy"),
    ("square", "sq"),
    ("trail", "trl"),
    ("north", "n"),
    ("south", "s"),
    ("east", "e"),
    ("west", "w"),
    ("northeast", "ne"),
    ("northwest", "nw"),
    ("southeast", "se"),
    ("southwest", "sw"),
    ("apartment", "apt"),
    ("suite", "ste"),
    ("building", "bldg"),
    ("floor", "fl"),
    ("room", "rm"),
    ("unit", "unit"),
];

fn punctuation() -> &'static Regex {
    static PUNCTUATION_RE: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION_RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("punctuation regex must compile"))
}

fn zip_code() -> &'static Regex {
    static ZIP_RE: OnceLock<Regex> = OnceLock::new();
    ZIP_RE.get_or_init(|| Regex::new(r"^\s*(\d{5})").expect("zip regex must compile"))
}

fn normalize_part(value: &str) -> Option<String> {
    let cleaned = punctuation().replace_all(&value.to_lowercase(), " ").into_owned();
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(long, _)| *long == word)
                .map_or(word, |(_, short)| *short)
        })
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

pub fn normalize_zip(zip: &str) -> Option<String> {
    if let Some(caps) = zip_code().captures(zip) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    normalize_part(zip)
}

pub fn normalize_address(address: &Address) -> NormalizedAddress {
    NormalizedAddress {
        line: address.line.iter().filter_map(|l| normalize_part(l)).collect(),
        city: address.city.as_deref().and_then(normalize_part),
        state: address.state.as_deref().and_then(normalize_part),
        zip: address.postal_code.as_deref().and_then(normalize_zip),
        country: address.country.as_deref().and_then(normalize_part),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(line: &str, city: &str, zip: &str) -> Address {
        Address {
            line: vec![line.to_string()],
            city: Some(city.to_string()),
            postal_code: Some(zip.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn folds_case_and_abbreviations() {
        let a = normalize_address(&address("123 Main Street", "Springfield", "62704"));
        let b = normalize_address(&address("123 MAIN ST.", "springfield ", "62704-1234"));
        assert_eq!(a, b);
        assert_eq!(a.line, vec!["123 main st".to_string()]);
        assert_eq!(a.zip.as_deref(), Some("62704"));
    }

    #[test]
    fn directions_and_units() {
        let a = normalize_address(&address("5 North Elm Avenue, Suite 200", "X", "1"));
        assert_eq!(a.line, vec!["5 n elm ave ste 200".to_string()]);
    }

    #[test]
    fn empty_address() {
        assert!(normalize_address(&Address::default()).is_empty());
    }
}
