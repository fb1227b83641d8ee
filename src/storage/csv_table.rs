//! CSV table backend
//!
//! The table is rewritten as a whole on every append: the new content goes
//! to a temporary file next to the table, which is then renamed over it.

use crate::storage::traits::{StorageError, StorageResult, TableFile};
use crate::storage::Table;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// A CSV file plus its `<stem>.backup.csv` mirror
#[derive(Debug, Clone)]
pub struct CsvTable {
    path: PathBuf,
    mirror_path: PathBuf,
}

impl CsvTable {
    /// # Example
    ///
    /// ```
    /// use std::path::Path;
    /// use tender_harvest::storage::CsvTable;
    ///
    /// let table = CsvTable::new("procedures/procedures.csv");
    /// assert_eq!(table.mirror_path(), Path::new("procedures/procedures.backup.csv"));
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "procedures".to_string());
        let mirror_path = path.with_file_name(format!("{}.backup.csv", stem));

        Self { path, mirror_path }
    }

    pub fn mirror_path(&self) -> &Path {
        &self.mirror_path
    }
}

impl TableFile for CsvTable {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StorageResult<Option<Table>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Some(Table { headers, rows }))
    }

    fn write(&self, table: &Table) -> StorageResult<()> {
        write_replacing(&self.path, table)
    }

    fn write_mirror(&self, table: &Table) -> StorageResult<()> {
        write_replacing(&self.mirror_path, table)
    }
}

/// Writes `table` next to `path` and renames it into place
///
/// The temporary file is new, so no other program can hold it. Permission
/// denied while creating it means the folder itself is read-only, which is
/// reported as [`StorageError::FolderNotWritable`] instead of a lock.
fn write_replacing(path: &Path, table: &Table) -> StorageResult<()> {
    let tmp_path = path.with_extension("csv.tmp");
    let file = File::create(&tmp_path).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => StorageError::FolderNotWritable {
            path: path.display().to_string(),
        },
        _ => StorageError::Io(e),
    })?;

    let result = write_csv(file, table).and_then(|()| {
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

fn write_csv(file: File, table: &Table) -> StorageResult<()> {
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
