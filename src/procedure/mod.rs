//! Procedure records and their attached documents
//!
//! This module holds the per-item data shapes produced during one harvest
//! pass:
//! - Raw procedure pages as parsed from the site
//! - Normalized output rows (`ProcedureRecord`)
//! - Resolved document destinations (`DocumentRef`)

mod documents;
mod normalize;

pub use documents::{filename_from_label, resolve_documents, sanitize_filename};
pub use normalize::{format_date, normalize_detail, normalize_record, DetailOutcome};

use std::path::PathBuf;

/// Canonical column holding the reconciliation key
pub const REGISTRY_NUMBER: &str = "registry_number";

/// Canonical column holding the procedure title
pub const TITLE: &str = "title";

/// A procedure page as parsed from the site, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawProcedure {
    /// The page URL
    pub url: String,

    /// Title from the page heading, if any
    pub title: Option<String>,

    /// Label/value pairs in page order, labels as shown on the site
    pub fields: Vec<(String, String)>,

    /// Attached documents in page order
    pub documents: Vec<RawDocument>,
}

/// A document link as shown on a procedure page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Display label of the link
    pub label: String,

    /// Absolute download URL
    pub url: String,
}

/// A document with its resolved local destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub url: String,
    pub path: PathBuf,
}

/// One output row: canonical field name -> value
///
/// Fields keep the order in which they were first set; absent fields are
/// simply not present. The registry number is always set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRecord {
    fields: Vec<(String, String)>,
}

impl ProcedureRecord {
    /// Creates a record keyed by the given registry number
    pub fn new(registry_number: impl Into<String>) -> Self {
        Self {
            fields: vec![(REGISTRY_NUMBER.to_string(), registry_number.into())],
        }
    }

    /// The reconciliation key
    pub fn registry_number(&self) -> &str {
        // The constructor always stores it first and `set` cannot remove it.
        &self.fields[0].1
    }

    /// Returns the value of a field, if present
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Sets a field, replacing an earlier value
    ///
    /// Empty values leave the field absent. The registry number can be
    /// replaced but never cleared.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();

        if value.is_empty() {
            if field != REGISTRY_NUMBER {
                self.fields.retain(|(name, _)| name != &field);
            }
            return;
        }

        match self.fields.iter_mut().find(|(name, _)| name == &field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Field names in insertion order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Field/value pairs in insertion order
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}
