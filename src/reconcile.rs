//! Table/folder reconciliation
//!
//! Compares the registry numbers in the procedure table with the
//! per-procedure folders on disk. A folder without a row usually means a
//! harvest stopped between downloading documents and writing the row; a row
//! without a folder means the folder was moved or deleted by hand.

use crate::procedure::sanitize_filename;
use crate::storage::{TableFile, TabularStore};
use crate::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Differences between the table and the procedures folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Folder names with no matching row
    pub folders_without_rows: BTreeSet<String>,

    /// Registry numbers with no matching folder
    pub rows_without_folders: BTreeSet<String>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.folders_without_rows.is_empty() && self.rows_without_folders.is_empty()
    }
}

/// Compares stored rows against procedure folders
///
/// Only directories count; the table, its mirror and the log file that live
/// next to the folders are ignored. Registry numbers are compared in their
/// folder-name form.
///
/// # Arguments
///
/// * `store` - The procedure table
/// * `procedures_dir` - Folder holding one subfolder per procedure
pub async fn reconcile<T: TableFile>(
    store: &TabularStore<T>,
    procedures_dir: &Path,
) -> Result<ReconcileReport> {
    let stored: BTreeSet<String> = store
        .known_ids()
        .await?
        .iter()
        .map(|id| sanitize_filename(id))
        .collect();

    let mut folders = BTreeSet::new();
    let mut entries = tokio::fs::read_dir(procedures_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            folders.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }

    let report = ReconcileReport {
        folders_without_rows: folders.difference(&stored).cloned().collect(),
        rows_without_folders: stored.difference(&folders).cloned().collect(),
    };

    tracing::info!(
        "Reconciled {} rows against {} folders: {} folders without rows, {} rows without folders",
        stored.len(),
        folders.len(),
        report.folders_without_rows.len(),
        report.rows_without_folders.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::ProcedureRecord;
    use crate::shutdown::Shutdown;
    use crate::storage::CsvTable;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reconcile_reports_both_directions() {
        let dir = TempDir::new().unwrap();
        let store = TabularStore::new(
            CsvTable::new(dir.path().join("procedures.csv")),
            Duration::ZERO,
            Shutdown::new(),
        );

        for id in ["100", "200"] {
            store.append(&ProcedureRecord::new(id)).await.unwrap();
        }
        std::fs::create_dir(dir.path().join("100")).unwrap();
        std::fs::create_dir(dir.path().join("300")).unwrap();
        std::fs::write(dir.path().join("harvest.log"), "").unwrap();

        let report = reconcile(&store, dir.path()).await.unwrap();

        assert!(!report.is_consistent());
        assert_eq!(
            report.folders_without_rows,
            BTreeSet::from(["300".to_string()])
        );
        assert_eq!(
            report.rows_without_folders,
            BTreeSet::from(["200".to_string()])
        );
    }

    #[tokio::test]
    async fn test_reconcile_empty_folder() {
        let dir = TempDir::new().unwrap();
        let store = TabularStore::new(
            CsvTable::new(dir.path().join("procedures.csv")),
            Duration::ZERO,
            Shutdown::new(),
        );

        let report = reconcile(&store, dir.path()).await.unwrap();
        assert!(report.is_consistent());
    }
}
