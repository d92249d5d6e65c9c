use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::{AuditError, AuditFilter, AuditRecord, AuditStore};

/// Append-only text file, one record per line.
pub struct FileAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditStore {
    /// The file is created on first append, not here.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditStore for FileAuditStore {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuditError::Database("audit file lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // A single write per line keeps concurrent appenders from interleaving.
        file.write_all(format!("{}\n", record.to_line()).as_bytes())?;
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match AuditRecord::parse_line(&line) {
                Ok(record) if filter.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable audit line"
                ),
            }
            if filter.limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
        }
        Ok(records)
    }
}
