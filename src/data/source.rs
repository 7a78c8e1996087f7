//! Trip record sources
//!
//! A source can be opened any number of times; each open starts a fresh
//! pass over the records. CSV files are read one at a time and each file
//! handle is closed as soon as its pass moves on or the iterator is dropped.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::schema::Schema;
use crate::{RawTrip, Result, TaxiFareError};

/// A restartable supply of raw trips
pub trait TripSource {
    type Records: Iterator<Item = Result<RawTrip>>;

    /// Start a new pass over all records
    fn open(&self) -> Result<Self::Records>;
}

/// Trips held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    trips: Vec<RawTrip>,
}

impl MemorySource {
    pub fn new(trips: Vec<RawTrip>) -> Self {
        MemorySource { trips }
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

impl TripSource for MemorySource {
    type Records = std::iter::Map<std::vec::IntoIter<RawTrip>, fn(RawTrip) -> Result<RawTrip>>;

    fn open(&self) -> Result<Self::Records> {
        Ok(self.trips.clone().into_iter().map(Ok as fn(RawTrip) -> Result<RawTrip>))
    }
}

/// Headered CSV files matched by a glob pattern
#[derive(Debug, Clone)]
pub struct CsvSource {
    files: Vec<PathBuf>,
    schema: Schema,
}

impl CsvSource {
    /// Resolve a file pattern; matching nothing is an error
    pub fn from_pattern(pattern: &str, schema: Schema) -> Result<Self> {
        let mut files = Vec::new();
        for entry in glob::glob(pattern)? {
            let path = entry?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(TaxiFareError::NoInputFiles(pattern.to_string()));
        }

        log::info!("Found {} input file(s) for {}", files.len(), pattern);
        Self::from_files(files, schema)
    }

    pub fn from_files(files: Vec<PathBuf>, schema: Schema) -> Result<Self> {
        schema.validate()?;
        Ok(CsvSource { files, schema })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl TripSource for CsvSource {
    type Records = CsvRecords;

    fn open(&self) -> Result<CsvRecords> {
        Ok(CsvRecords {
            pending: self.files.iter().rev().cloned().collect(),
            current: None,
            schema: self.schema.clone(),
        })
    }
}

/// Lazy record iterator over a list of CSV files
pub struct CsvRecords {
    /// Files still to read, last one first
    pending: Vec<PathBuf>,
    current: Option<csv::StringRecordsIntoIter<File>>,
    schema: Schema,
}

impl CsvRecords {
    fn open_file(path: &Path) -> Result<csv::StringRecordsIntoIter<File>> {
        log::debug!("Reading {}", path.display());
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Ok(reader.into_records())
    }
}

impl Iterator for CsvRecords {
    type Item = Result<RawTrip>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(records) = self.current.as_mut() {
                match records.next() {
                    Some(Ok(record)) => {
                        let line = record.position().map(|p| p.line()).unwrap_or(0);
                        let fields: Vec<&str> = record.iter().collect();
                        return Some(self.schema.parse_fields(&fields, line));
                    }
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => {
                        // Drops the reader and its file handle
                        self.current = None;
                    }
                }
            }

            let path = self.pending.pop()?;
            match Self::open_file(&path) {
                Ok(records) => self.current = Some(records),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
