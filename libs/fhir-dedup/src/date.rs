//! Date extraction
//!
//! Resources carry their clinically relevant date in one of many choice
//! elements. A [`DateSource`] chain lists the candidates in priority order;
//! the first one holding a usable value wins.
//!
//! Dates are rendered either at day precision ([`DateFormat::Date`], keeping
//! any coarser precision the source had) or as a full UTC timestamp
//! ([`DateFormat::DateTime`]). Ages, ranges and free-text occurrences are
//! returned as written.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use ferrum_models::{Period, Quantity, Range, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    #[default]
    Date,
    DateTime,
}

/// One date-bearing element of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// A `date` or `dateTime` element
    Instant(&'static str),
    /// A `Period`; start, else end
    Period(&'static str),
    /// An `Age`, rendered as `<value><unit>`
    Age(&'static str),
    /// A `Range`; low, else high, rendered as `<value><unit>`
    Range(&'static str),
    /// Free text, returned trimmed
    Text(&'static str),
}

/// Chain for condition/observation/event shaped resources
pub const CLINICAL_EVENT_DATES: &[DateSource] = &[
    DateSource::Period("onsetPeriod"),
    DateSource::Instant("onsetDateTime"),
    DateSource::Age("onsetAge"),
    DateSource::Instant("effectiveDateTime"),
    DateSource::Instant("date"),
    DateSource::Instant("occurrenceDateTime"),
    DateSource::Text("occurrenceString"),
    DateSource::Period("period"),
    DateSource::Period("effectivePeriod"),
];

/// Chain for procedure shaped resources
pub const PERFORMED_DATES: &[DateSource] = &[
    DateSource::Instant("performedDateTime"),
    DateSource::Period("performedPeriod"),
    DateSource::Text("performedString"),
    DateSource::Age("performedAge"),
    DateSource::Range("performedRange"),
];

/// Parse a FHIR date or dateTime and render it in `format`.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, RFC 3339 timestamps, timestamps
/// without offset (read as UTC) and compact `YYYYMMDD[HHMMSS[±ZZZZ]]` forms.
pub fn date_from_string(raw: &str, format: DateFormat) -> Result<String> {
    let s = raw.trim();
    let invalid = || Error::InvalidDate(raw.to_string());

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(match format {
            DateFormat::Date => dt.date_naive().format("%Y-%m-%d").to_string(),
            DateFormat::DateTime => render_utc(dt.with_timezone(&Utc)),
        });
    }
    for pattern in ["%Y%m%d%H%M%S%z", "%Y%m%d%H%M%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, pattern) {
            return Ok(match format {
                DateFormat::Date => dt.date_naive().format("%Y-%m-%d").to_string(),
                DateFormat::DateTime => render_utc(dt.with_timezone(&Utc)),
            });
        }
    }
    for pattern in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y%m%d%H%M%S",
        "%Y%m%d%H%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Ok(match format {
                DateFormat::Date => naive.date().format("%Y-%m-%d").to_string(),
                DateFormat::DateTime => render_utc(naive.and_utc()),
            });
        }
    }
    for pattern in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, pattern) {
            return Ok(render_date(date, format));
        }
    }

    // Partial dates keep their precision at day format.
    let partial = match s.len() {
        4 if s.bytes().all(|b| b.is_ascii_digit()) => format!("{s}-01-01"),
        7 => format!("{s}-01"),
        _ => return Err(invalid()),
    };
    let date = NaiveDate::parse_from_str(&partial, "%Y-%m-%d").map_err(|_| invalid())?;
    Ok(match format {
        DateFormat::Date => s.to_string(),
        DateFormat::DateTime => render_date(date, format),
    })
}

fn render_date(date: NaiveDate, format: DateFormat) -> String {
    match format {
        DateFormat::Date => date.format("%Y-%m-%d").to_string(),
        DateFormat::DateTime => render_utc(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()),
    }
}

fn render_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn render_quantity(q: &Quantity) -> Option<String> {
    let value = q.value?;
    let unit = q.unit.as_deref().or(q.code.as_deref()).unwrap_or_default();
    Some(format!("{value}{unit}"))
}

fn read_source(resource: &Resource, source: DateSource, format: DateFormat) -> Result<Option<String>> {
    match source {
        DateSource::Instant(field) => match resource.get_str(field) {
            Some(raw) if !raw.trim().is_empty() => date_from_string(raw, format).map(Some),
            _ => Ok(None),
        },
        DateSource::Period(field) => {
            let Some(period) = resource.get_as::<Period>(field) else {
                return Ok(None);
            };
            match period.start.or(period.end) {
                Some(raw) if !raw.trim().is_empty() => date_from_string(&raw, format).map(Some),
                _ => Ok(None),
            }
        }
        DateSource::Age(field) => Ok(resource
            .get_as::<Quantity>(field)
            .as_ref()
            .and_then(render_quantity)),
        DateSource::Range(field) => Ok(resource.get_as::<Range>(field).and_then(|r| {
            r.low
                .as_ref()
                .and_then(render_quantity)
                .or_else(|| r.high.as_ref().and_then(render_quantity))
        })),
        DateSource::Text(field) => Ok(resource
            .get_str(field)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)),
    }
}

/// First usable date along `chain`
pub fn date_from_chain(
    resource: &Resource,
    chain: &[DateSource],
    format: DateFormat,
) -> Result<Option<String>> {
    for source in chain {
        if let Some(date) = read_source(resource, *source, format)? {
            return Ok(Some(date));
        }
    }
    Ok(None)
}

pub fn get_date_from_resource(resource: &Resource, format: DateFormat) -> Result<Option<String>> {
    date_from_chain(resource, CLINICAL_EVENT_DATES, format)
}

pub fn get_performed_date_from_resource(
    resource: &Resource,
    format: DateFormat,
) -> Result<Option<String>> {
    date_from_chain(resource, PERFORMED_DATES, format)
}

/// Date lookup for matching rules: a malformed date reads as unknown.
pub(crate) fn lenient_date(
    resource: &Resource,
    chain: &[DateSource],
    format: DateFormat,
) -> Option<String> {
    match date_from_chain(resource, chain, format) {
        Ok(date) => date,
        Err(err) => {
            tracing::warn!(
                resource_type = %resource.resource_type,
                id = resource.id.as_deref().unwrap_or_default(),
                "{err}; treating date as unknown"
            );
            None
        }
    }
}
