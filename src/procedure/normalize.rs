//! Detail normalization
//!
//! Turns a fetched procedure page into either a canonical `ProcedureRecord`
//! or an "unavailable" outcome. Pages that expired, were withdrawn or are
//! restricted are not errors; anything structurally unexpected is.

use crate::config::FieldsConfig;
use crate::crawler::{parse_detail, DetailPage, FetchedPage};
use crate::procedure::{ProcedureRecord, RawDocument, RawProcedure, REGISTRY_NUMBER, TITLE};
use crate::{HarvestError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use url::Url;

/// Display format of every date column
pub const DATE_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Naive timestamp layouts accepted in date fields
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Timestamp layouts carrying a numeric offset that RFC 3339 rejects
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const DATE_ONLY_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Result of normalizing one procedure page
#[derive(Debug, Clone)]
pub enum DetailOutcome {
    /// The page yielded a record
    Available {
        record: ProcedureRecord,
        documents: Vec<RawDocument>,
    },

    /// The procedure can no longer be viewed; skip it
    Unavailable {
        /// Why the page was skipped (status code or banner)
        reason: String,
    },
}

/// Classifies a fetched procedure page and normalizes it
///
/// | Response | Outcome |
/// |----------|---------|
/// | 404, 403 | `Unavailable` |
/// | 200 with "not authorized" banner | `Unavailable` |
/// | 200 without page header | `MalformedPage` error |
/// | 200 without registry number | `MissingRegistryNumber` error |
/// | any other status | `UnexpectedStatus` error |
///
/// # Arguments
///
/// * `page` - The fetched page (status and body)
/// * `base_url` - Base for resolving relative document links
/// * `fields` - Label aliases and date columns
pub fn normalize_detail(
    page: &FetchedPage,
    base_url: &Url,
    fields: &FieldsConfig,
) -> Result<DetailOutcome> {
    match page.status {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
            return Ok(DetailOutcome::Unavailable {
                reason: format!("HTTP {}", page.status.as_u16()),
            });
        }
        status => {
            return Err(HarvestError::UnexpectedStatus {
                url: page.url.clone(),
                status: status.as_u16(),
            });
        }
    }

    match parse_detail(&page.body, &page.url, base_url)? {
        DetailPage::Unauthorized => Ok(DetailOutcome::Unavailable {
            reason: "not authorized".to_string(),
        }),
        DetailPage::Procedure(raw) => {
            let documents = raw.documents.clone();
            let record = normalize_record(&raw, fields)?;
            Ok(DetailOutcome::Available { record, documents })
        }
    }
}

/// Maps a raw procedure page onto canonical columns
///
/// Labels are trimmed, lose a trailing colon and go through the alias table;
/// unknown labels are kept as they are. Configured date columns are
/// reformatted with [`format_date`].
pub fn normalize_record(raw: &RawProcedure, fields: &FieldsConfig) -> Result<ProcedureRecord> {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(raw.fields.len() + 1);

    if let Some(title) = &raw.title {
        pairs.push((TITLE.to_string(), clean_value(title)));
    }

    for (label, value) in &raw.fields {
        let label = clean_label(label);
        if label.is_empty() {
            continue;
        }

        let field = fields
            .aliases
            .get(&label)
            .cloned()
            .unwrap_or(label);

        let mut value = clean_value(value);
        if !value.is_empty() && fields.date_fields.iter().any(|f| f == &field) {
            match format_date(&value) {
                Some(formatted) => value = formatted,
                None => tracing::warn!(
                    "Unrecognized date '{}' in field '{}' of {}, kept as is",
                    value,
                    field,
                    raw.url
                ),
            }
        }

        pairs.push((field, value));
    }

    let registry_number = pairs
        .iter()
        .rev()
        .find(|(field, value)| field == REGISTRY_NUMBER && !value.is_empty())
        .map(|(_, value)| value.clone())
        .ok_or_else(|| HarvestError::MissingRegistryNumber {
            url: raw.url.clone(),
        })?;

    let mut record = ProcedureRecord::new(registry_number);
    for (field, value) in pairs {
        if field != REGISTRY_NUMBER {
            record.set(field, value);
        }
    }

    Ok(record)
}

/// Reformats a source timestamp as `DD-MM-YYYY HH:MM:SS`
///
/// Embedded offsets are dropped without converting the wall-clock time, so
/// `2023-05-01T10:00:00+03:00` becomes `01-05-2023 10:00:00`.
///
/// Returns `None` if the value matches none of the known layouts.
pub fn format_date(value: &str) -> Option<String> {
    let value = strip_offset_annotation(value.trim());

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local().format(DATE_FORMAT).to_string());
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.naive_local().format(DATE_FORMAT).to_string());
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.format(DATE_FORMAT).to_string());
        }
    }

    for format in DATE_ONLY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.format(DATE_FORMAT).to_string());
        }
    }

    None
}

fn clean_label(label: &str) -> String {
    let label = label.trim();
    label.strip_suffix(':').unwrap_or(label).trim().to_string()
}

fn clean_value(value: &str) -> String {
    strip_offset_annotation(&normalize_whitespace(value)).to_string()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops a trailing `GMT+3` / `GMT-05:00` style annotation
fn strip_offset_annotation(value: &str) -> &str {
    if let Some(idx) = value.rfind("GMT") {
        let tail = value[idx + 3..].trim();
        if tail
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ':'))
        {
            return value[..idx].trim_end();
        }
    }
    value
}
