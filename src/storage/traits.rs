//! Storage traits and error types
//!
//! This module defines the trait interface for table files and the
//! associated error types.

use crate::storage::Table;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table {path} has no '{column}' column")]
    MissingColumn { path: String, column: String },

    #[error("Folder of {path} does not accept new files")]
    FolderNotWritable { path: String },

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    /// Returns true if the table is held open by another program
    ///
    /// Covers permission errors on the table itself and the Windows
    /// sharing/lock violations (`ERROR_SHARING_VIOLATION`,
    /// `ERROR_LOCK_VIOLATION`) reported when a spreadsheet application has
    /// the file open. A folder that refuses new files is never a lock.
    pub fn is_lock_conflict(&self) -> bool {
        match self {
            Self::Io(e) => is_lock_io_error(e),
            Self::Csv(e) => match e.kind() {
                csv::ErrorKind::Io(e) => is_lock_io_error(e),
                _ => false,
            },
            Self::MissingColumn { .. } | Self::FolderNotWritable { .. } | Self::Task(_) => false,
        }
    }
}

fn is_lock_io_error(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    cfg!(windows) && matches!(error.raw_os_error(), Some(32 | 33))
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A whole-file table backend
///
/// The table is always read and written as a unit; [`crate::storage::TabularStore`]
/// layers append semantics and lock handling on top. Operations block, so the
/// store runs them on the blocking thread pool with a clone of the backend.
pub trait TableFile: Clone + Send + Sync + 'static {
    /// Location of the primary file
    fn path(&self) -> &Path;

    /// Reads the table
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The file does not exist yet
    /// * `Ok(Some(table))` - Header and rows
    fn read(&self) -> StorageResult<Option<Table>>;

    /// Replaces the primary file with `table`
    ///
    /// Must either fully succeed or leave the previous file untouched.
    fn write(&self, table: &Table) -> StorageResult<()>;

    /// Writes a copy of `table` to the mirror location
    fn write_mirror(&self, table: &Table) -> StorageResult<()>;
}
