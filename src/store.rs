//! The JSON snapshot: identifier keyed records, kept sorted by identifier on
//! disk so that successive snapshots diff cleanly.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::{Error, Result};
use crate::record::{Diff, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    records: Vec<Record>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the snapshot at `path`, or starts empty when there is none.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut collection = Self::new();
        match fs::File::open(path.as_ref()) {
            Ok(file) => collection.load(file, &path.as_ref().display().to_string())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No snapshot at {}, starting empty", path.as_ref().display());
            }
            Err(e) => return Err(Error::io(path.as_ref(), e)),
        }
        Ok(collection)
    }

    /// Replaces the whole collection with the records read from `source`.
    ///
    /// An empty source is an empty collection, anything else must be an array
    /// of records with unique identifiers.
    pub fn load<R: Read>(&mut self, mut source: R, origin: &str) -> Result<()> {
        let load_error = |reason: String| Error::Load {
            origin: origin.to_string(),
            reason,
        };

        let mut content = String::new();
        source
            .read_to_string(&mut content)
            .map_err(|e| load_error(e.to_string()))?;

        let records: Vec<Record> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?
        };

        let mut seen = HashSet::new();
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.id())) {
            return Err(load_error(format!("duplicate id {:?}", dup.id())));
        }

        log::debug!("Loaded {} records from {origin}", records.len());
        self.records = records;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Exact identifier match first, case insensitive match otherwise.
    fn position(&self, id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.id() == id)
            .or_else(|| {
                let lowered = id.to_lowercase();
                self.records
                    .iter()
                    .position(|r| r.id().to_lowercase() == lowered)
            })
    }

    pub fn find(&self, id: &str) -> Option<&Record> {
        self.position(id).map(|i| &self.records[i])
    }

    /// Appends a new record or merges changes into the stored one.
    pub fn upsert(&mut self, diff: Diff) -> Upsert {
        let Some(i) = self.position(diff.id()) else {
            let record = match diff {
                Diff::New(record) => record,
                Diff::Changed(changes) => changes.into_record(),
            };
            self.records.push(record);
            return Upsert::Inserted;
        };

        let stored = &mut self.records[i];
        let changes = match diff {
            Diff::Changed(changes) => changes,
            Diff::New(record) => record.changes(stored),
        };
        if changes.is_empty() {
            return Upsert::Unchanged;
        }
        stored.merge(changes);
        Upsert::Updated
    }

    fn sort(&mut self) {
        self.records.sort_by(|a, b| a.id().cmp(b.id()));
    }

    /// Sorts by identifier then writes pretty printed JSON.
    pub fn write<W: Write>(&mut self, writer: W) -> serde_json::Result<()> {
        self.sort();
        let mut ser = serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
        self.records.serialize(&mut ser)
    }

    /// Writes the snapshot next to `path` then moves it in place.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        if let Ok(meta) = fs::metadata(path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| Error::io(path, e))?;
        }
        {
            let mut writer = io::BufWriter::new(tmp.as_file_mut());
            self.write(&mut writer)
                .map_err(|e| Error::io(path, e.into()))?;
            writer
                .write_all(b"\n")
                .and_then(|()| writer.flush())
                .map_err(|e| Error::io(path, e))?;
        }
        tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
        tmp.persist(path).map_err(|e| Error::io(path, e.error))?;

        log::info!("Saved {} records to {}", self.records.len(), path.display());
        Ok(())
    }
}
