//! Append-only procedure store
//!
//! Wraps a [`TableFile`] with the rules of the procedure table:
//! - rows are only ever appended, one per registry number
//! - a write blocked by another program is retried until it lands
//! - an interrupt does not abandon a pending write

use crate::procedure::{ProcedureRecord, REGISTRY_NUMBER};
use crate::shutdown::Shutdown;
use crate::storage::traits::{StorageError, StorageResult, TableFile};
use crate::storage::{CsvTable, Table};
use std::collections::HashSet;
use std::time::Duration;

/// The procedure table
pub struct TabularStore<T: TableFile = CsvTable> {
    file: T,
    lock_retry_interval: Duration,
    shutdown: Shutdown,
}

impl<T: TableFile> TabularStore<T> {
    /// # Arguments
    ///
    /// * `file` - Backend holding the table
    /// * `lock_retry_interval` - Pause between attempts while the file is locked
    /// * `shutdown` - Only consulted for logging; writes finish regardless
    pub fn new(file: T, lock_retry_interval: Duration, shutdown: Shutdown) -> Self {
        Self {
            file,
            lock_retry_interval,
            shutdown,
        }
    }

    pub fn file(&self) -> &T {
        &self.file
    }

    /// Registry numbers of all stored rows
    ///
    /// A missing table yields an empty set.
    pub async fn known_ids(&self) -> StorageResult<HashSet<String>> {
        let table = self.read_table().await?;
        table
            .registry_numbers()
            .ok_or_else(|| StorageError::MissingColumn {
                path: self.file.path().display().to_string(),
                column: REGISTRY_NUMBER.to_string(),
            })
    }

    /// Reads the whole table, waiting out locks
    pub async fn read_table(&self) -> StorageResult<Table> {
        self.with_lock_retry("read", |file: &T| Ok(file.read()?.unwrap_or_default()))
            .await
    }

    /// Appends one row, creating the table if needed
    ///
    /// The table is re-read on every attempt, so a retried write never
    /// duplicates a row. A record whose registry number is already stored
    /// is skipped. After the primary file is written, a mirror copy is
    /// refreshed; a failing mirror only logs a warning.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The row was written
    /// * `Ok(false)` - The registry number was already stored
    /// * `Err(StorageError)` - A failure other than a lock conflict
    pub async fn append(&self, record: &ProcedureRecord) -> StorageResult<bool> {
        let row = record.clone();
        let written = self
            .with_lock_retry("write", move |file: &T| {
                let mut table = file.read()?.unwrap_or_default();
                if table.contains(row.registry_number()) {
                    return Ok(None);
                }
                table.push_record(&row);
                file.write(&table)?;
                Ok(Some(table))
            })
            .await?;

        let Some(table) = written else {
            tracing::warn!(
                "Procedure {} is already in {}, skipped",
                record.registry_number(),
                self.file.path().display()
            );
            return Ok(false);
        };

        let file = self.file.clone();
        let mirrored = tokio::task::spawn_blocking(move || file.write_mirror(&table))
            .await
            .map_err(StorageError::from)
            .and_then(|result| result);
        if let Err(e) = mirrored {
            tracing::warn!("Failed to refresh mirror of {}: {}", self.file.path().display(), e);
        }

        tracing::debug!(
            "Row for {} written to {}",
            record.registry_number(),
            self.file.path().display()
        );
        Ok(true)
    }

    /// Repeats `op` while it fails with a lock conflict
    ///
    /// Each attempt runs on the blocking thread pool against a clone of the
    /// backend. There is no attempt limit and shutdown does not cancel the
    /// wait.
    async fn with_lock_retry<R, F>(&self, action: &str, op: F) -> StorageResult<R>
    where
        R: Send + 'static,
        F: Fn(&T) -> StorageResult<R> + Clone + Send + 'static,
    {
        let mut attempts = 0u64;
        let mut interrupt_noted = false;

        loop {
            let file = self.file.clone();
            let attempt = op.clone();
            let result = tokio::task::spawn_blocking(move || attempt(&file)).await?;

            match result {
                Ok(value) => {
                    if attempts > 0 {
                        tracing::info!(
                            "{} of {} succeeded after {} blocked attempts",
                            action,
                            self.file.path().display(),
                            attempts
                        );
                    }
                    return Ok(value);
                }
                Err(e) if e.is_lock_conflict() => {
                    attempts += 1;
                    tracing::warn!(
                        "Please CLOSE {}. It can't be {} while another program holds it (attempt {})",
                        self.file.path().display(),
                        if action == "write" { "written" } else { "read" },
                        attempts
                    );
                    if self.shutdown.is_triggered() && !interrupt_noted {
                        interrupt_noted = true;
                        tracing::warn!(
                            "Interrupt received, finishing the pending {} of {} first",
                            action,
                            self.file.path().display()
                        );
                    }
                    tokio::time::sleep(self.lock_retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
