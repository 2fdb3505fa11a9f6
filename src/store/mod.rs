//! Flat-file review table
//!
//! This module handles:
//! - Loading the persisted review table (CSV)
//! - Merging freshly crawled reviews into it
//! - Rewriting the table in full

use crate::error::{Error, Result};
use crate::models::ReviewRecord;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Column order of the persisted table
pub const TABLE_COLUMNS: [&str; 8] = [
    "Company",
    "ComplaintURL",
    "Title",
    "Status",
    "Text",
    "Timestamp",
    "Rating",
    "PayoutRating",
];

/// Reviews ordered newest-first, unique by complaint URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewTable {
    records: Vec<ReviewRecord>,
}

impl ReviewTable {
    /// Build a table, enforcing uniqueness and order
    pub fn from_records(records: Vec<ReviewRecord>) -> Self {
        let mut table = Self { records };
        table.normalize();
        table
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ReviewRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReviewRecord> {
        self.records.iter()
    }

    /// Identity URLs already stored
    pub fn known_urls(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.complaint_url.clone()).collect()
    }

    /// Drop later duplicates, then sort newest-first (stable, undated last)
    fn normalize(&mut self) {
        let mut seen = HashSet::new();
        self.records.retain(|r| seen.insert(r.complaint_url.clone()));
        self.records.sort_by(newest_first);
    }
}

impl<'a> IntoIterator for &'a ReviewTable {
    type Item = &'a ReviewRecord;
    type IntoIter = std::slice::Iter<'a, ReviewRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn newest_first(a: &ReviewRecord, b: &ReviewRecord) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Merge new reviews into the existing table.
///
/// New records come first so they win on identity conflicts.
pub fn merge(existing: ReviewTable, new: Vec<ReviewRecord>) -> ReviewTable {
    if new.is_empty() {
        return existing;
    }

    let mut records = new;
    records.extend(existing.into_records());
    ReviewTable::from_records(records)
}

/// CSV-backed review store
pub struct ReviewStore {
    path: PathBuf,
}

impl ReviewStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the table; a missing file is an empty table.
    ///
    /// Columns outside `TABLE_COLUMNS` (such as `Category` from older
    /// report runs) are ignored.
    pub fn load(&self) -> Result<ReviewTable> {
        if !self.path.exists() {
            debug!("No review table at {:?}, starting empty", self.path);
            return Ok(ReviewTable::default());
        }

        let mut reader =
            csv::Reader::from_path(&self.path).map_err(|e| Error::persistence(&self.path, e))?;

        let mut records = Vec::new();
        for row in reader.deserialize::<ReviewRecord>() {
            records.push(row.map_err(|e| Error::persistence(&self.path, e))?);
        }

        let loaded = records.len();
        let table = ReviewTable::from_records(records);
        debug!(
            "Loaded {} reviews from {:?} ({} duplicates dropped)",
            table.len(),
            self.path,
            loaded - table.len()
        );
        Ok(table)
    }

    /// Replace the stored table with `table`
    pub fn persist(&self, table: &ReviewTable) -> Result<()> {
        write_replacing(&self.path, |writer| {
            if table.is_empty() {
                writer.write_record(TABLE_COLUMNS)?;
            }
            for record in table {
                writer.serialize(record)?;
            }
            Ok(())
        })?;

        info!("Saved {} reviews to {:?}", table.len(), self.path);
        Ok(())
    }
}

/// Write a CSV file through a sibling temp file renamed over the target
fn write_replacing<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<std::fs::File>) -> std::result::Result<(), csv::Error>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::persistence(path, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = csv::Writer::from_path(&tmp_path).and_then(|mut writer| {
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    });

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::persistence(path, e));
    }

    std::fs::rename(&tmp_path, path).map_err(|e| Error::persistence(path, e))
}
