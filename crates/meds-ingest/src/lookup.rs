//! External CSV lookup tables (code descriptions, per-subject static data).

use std::collections::BTreeMap;
use std::path::Path;

use csv::ReaderBuilder;

use meds_model::{MedsError, Result};

/// A CSV file held as header-keyed rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl LookupTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|header| header == name)
    }

    /// Fails with the available header list when `name` is absent.
    pub fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(MedsError::missing_column(name, &self.headers))
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a CSV file with headers; cells are trimmed and a UTF-8 BOM is dropped.
pub fn read_lookup_table(path: &Path) -> Result<LookupTable> {
    if !path.is_file() {
        return Err(MedsError::missing_file(path));
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| MedsError::csv(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| MedsError::csv(path, e))?
        .iter()
        .map(|header| header.trim_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| MedsError::csv(path, e))?;
        let mut row = BTreeMap::new();
        for (idx, value) in record.iter().enumerate() {
            let key = headers.get(idx).cloned().unwrap_or_default();
            row.insert(key, value.trim().to_string());
        }
        rows.push(row);
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "loaded lookup table");
    Ok(LookupTable { headers, rows })
}

/// Get a field value from a row, returning empty string if not present.
pub fn get_field(row: &BTreeMap<String, String>, key: &str) -> String {
    row.get(key).cloned().unwrap_or_default()
}

/// Get an optional field value from a row (None if empty or missing).
pub fn get_optional(row: &BTreeMap<String, String>, key: &str) -> Option<String> {
    row.get(key).filter(|v| !v.is_empty()).cloned()
}
