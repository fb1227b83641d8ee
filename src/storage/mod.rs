//! Storage module for persisting harvested procedures
//!
//! This module handles the procedure table, including:
//! - Reading and rewriting the CSV table as a whole
//! - Appending rows with column union
//! - Waiting out locks held by spreadsheet applications
//! - Keeping a mirror copy next to the primary file

mod csv_table;
mod store;
mod traits;

pub use csv_table::CsvTable;
pub use store::TabularStore;
pub use traits::{StorageError, StorageResult, TableFile};

use crate::config::OutputConfig;
use crate::procedure::{ProcedureRecord, REGISTRY_NUMBER};
use crate::shutdown::Shutdown;
use std::collections::HashSet;

/// Opens the procedure table described by the output configuration
pub fn open_store(output: &OutputConfig, shutdown: Shutdown) -> TabularStore<CsvTable> {
    TabularStore::new(
        CsvTable::new(output.table_path()),
        output.lock_retry_interval(),
        shutdown,
    )
}

/// An in-memory copy of the table
///
/// Every row has exactly one cell per header; missing values are empty
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of a column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Non-empty registry numbers of all rows
    ///
    /// Returns `None` if the table has rows but no registry number column.
    pub fn registry_numbers(&self) -> Option<HashSet<String>> {
        let Some(index) = self.column_index(REGISTRY_NUMBER) else {
            return self.rows.is_empty().then(HashSet::new);
        };

        Some(
            self.rows
                .iter()
                .filter_map(|row| row.get(index))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Returns true if some row carries this registry number
    pub fn contains(&self, registry_number: &str) -> bool {
        self.column_index(REGISTRY_NUMBER).is_some_and(|index| {
            self.rows
                .iter()
                .any(|row| row.get(index).is_some_and(|v| v.trim() == registry_number))
        })
    }

    /// Appends a record as a new row
    ///
    /// Fields without a column get one, appended after the existing columns
    /// and backfilled with empty cells. Columns the record lacks stay empty.
    pub fn push_record(&mut self, record: &ProcedureRecord) {
        for name in record.field_names() {
            if self.column_index(name).is_none() {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }

        let mut row = vec![String::new(); self.headers.len()];
        for (name, value) in record.fields() {
            if let Some(index) = self.column_index(name) {
                row[index] = value.clone();
            }
        }
        self.rows.push(row);
    }
}
