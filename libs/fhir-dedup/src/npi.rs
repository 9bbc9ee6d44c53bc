//! National Provider Identifier checks

use ferrum_models::Identifier;

const NPI_OID: &str = "2.16.840.1.113883.4.6";

/// Checksum validation of a ten digit NPI.
///
/// The check digit is a Luhn digit computed over the number prefixed with
/// the `80840` card issuer identifier.
pub fn validate_npi(npi: &str) -> bool {
    let npi = npi.trim();
    if npi.len() != 10 || !npi.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = format!("80840{npi}")
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .collect();
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn is_npi_system(system: &str) -> bool {
    let system = system.trim().to_ascii_lowercase();
    system.contains("us-npi") || system.strip_prefix("urn:oid:").unwrap_or(&system) == NPI_OID
}

/// First NPI-system identifier value, valid or not
pub fn extract_npi(identifiers: &[Identifier]) -> Option<String> {
    identifiers
        .iter()
        .filter(|i| i.system.as_deref().is_some_and(is_npi_system))
        .find_map(|i| i.value.as_deref().map(str::trim).filter(|v| !v.is_empty()))
        .map(str::to_string)
}

/// First NPI-system identifier passing the checksum
pub fn extract_valid_npi(identifiers: &[Identifier]) -> Option<String> {
    identifiers
        .iter()
        .filter(|i| i.system.as_deref().is_some_and(is_npi_system))
        .filter_map(|i| i.value.as_deref().map(str::trim))
        .find(|v| validate_npi(v))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npi(value: &str) -> Identifier {
        Identifier {
            system: Some("http://hl7.org/fhir/sid/us-npi".to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn validates_checksum() {
        assert!(validate_npi("1234567893"));
        assert!(!validate_npi("1234567890"));
        assert!(!validate_npi("123456789"));
        assert!(!validate_npi("12345678a3"));
    }

    #[test]
    fn extracts_npi_by_system() {
        let other = Identifier {
            system: Some("http://example.org/ids".to_string()),
            value: Some("1234567893".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_npi(&[other.clone(), npi("1234567890")]).as_deref(), Some("1234567890"));
        assert_eq!(extract_valid_npi(&[other, npi("1234567890")]), None);
        assert_eq!(extract_valid_npi(&[npi("1234567893")]).as_deref(), Some("1234567893"));
    }

    #[test]
    fn recognises_npi_oid() {
        let by_oid = Identifier {
            system: Some("urn:oid:2.16.840.1.113883.4.6".to_string()),
            value: Some("1234567893".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_valid_npi(&[by_oid]).as_deref(), Some("1234567893"));
    }
}
