//! Per-subject static data injected from an external CSV.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use meds_common::logging::redact_value;
use meds_common::parse_i64;
use meds_ingest::read_lookup_table;
use meds_model::{Event, MedsError, Result, STATIC_DATA_NO_CODE};

pub const DEFAULT_INVALID_VALUE: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticColumn {
    pub column_name: String,
    pub code_template: String,
    pub valid_values: Option<Vec<String>>,
    pub mappings: BTreeMap<String, String>,
    pub map_invalids_to: String,
    pub value_prefix: String,
    pub insert_code: bool,
}

impl StaticColumn {
    pub fn new(column_name: impl Into<String>, code_template: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            code_template: code_template.into(),
            valid_values: None,
            mappings: BTreeMap::new(),
            map_invalids_to: DEFAULT_INVALID_VALUE.to_string(),
            value_prefix: String::new(),
            insert_code: true,
        }
    }

    /// Trim, upper-case, remap, then validate against the allowed set.
    pub fn clean(&self, raw: Option<&str>) -> String {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return self.map_invalids_to.clone();
        };
        let upper = raw.to_uppercase();
        let value = self.mappings.get(&upper).cloned().unwrap_or(upper);
        match &self.valid_values {
            Some(valid) if !valid.contains(&value) => self.map_invalids_to.clone(),
            _ => value,
        }
    }

    fn event(&self, subject_id: i64, value: &str) -> Event {
        let code = if self.insert_code {
            self.code_template.as_str()
        } else {
            STATIC_DATA_NO_CODE
        };
        Event::static_event(subject_id, code).with_text(format!("{}{value}", self.value_prefix))
    }
}

#[derive(Debug, Clone)]
pub struct StaticDataLoader {
    csv_path: PathBuf,
    subject_id_column: String,
    columns: Vec<StaticColumn>,
    lookup: Option<HashMap<i64, Vec<String>>>,
}

impl StaticDataLoader {
    pub fn new(
        csv_path: impl Into<PathBuf>,
        subject_id_column: impl Into<String>,
        columns: Vec<StaticColumn>,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(MedsError::config("load_static_data requires at least one column"));
        }
        if let Some(column) = columns
            .iter()
            .find(|c| c.column_name.is_empty() || c.code_template.is_empty())
        {
            return Err(MedsError::config(format!(
                "static column '{}' needs both column_name and code_template",
                column.column_name
            )));
        }
        Ok(Self {
            csv_path: csv_path.into(),
            subject_id_column: subject_id_column.into(),
            columns,
            lookup: None,
        })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn columns(&self) -> &[StaticColumn] {
        &self.columns
    }

    pub fn is_loaded(&self) -> bool {
        self.lookup.is_some()
    }

    /// Reads the CSV and cleans every configured column; the first row of a subject wins.
    pub fn load(&mut self) -> Result<()> {
        let table = read_lookup_table(&self.csv_path)?;
        table.require_column(&self.subject_id_column)?;
        for column in &self.columns {
            table.require_column(&column.column_name)?;
        }

        let mut lookup: HashMap<i64, Vec<String>> = HashMap::new();
        let mut unparsable = 0usize;
        for row in &table.rows {
            let raw_id = row
                .get(&self.subject_id_column)
                .map_or("", String::as_str);
            let Some(subject_id) = parse_i64(raw_id) else {
                tracing::trace!(value = redact_value(raw_id), "unparsable subject id");
                unparsable += 1;
                continue;
            };
            lookup.entry(subject_id).or_insert_with(|| {
                self.columns
                    .iter()
                    .map(|column| column.clean(row.get(&column.column_name).map(String::as_str)))
                    .collect()
            });
        }
        if unparsable > 0 {
            tracing::warn!(
                path = %self.csv_path.display(),
                rows = unparsable,
                "skipped static data rows without an integer subject id"
            );
        }
        tracing::info!(
            path = %self.csv_path.display(),
            subjects = lookup.len(),
            columns = self.columns.len(),
            "loaded static data"
        );
        self.lookup = Some(lookup);
        Ok(())
    }

    /// One static event per configured column, defaults for unknown subjects.
    pub fn static_events(&self, subject_id: i64) -> Result<Vec<Event>> {
        let lookup = self
            .lookup
            .as_ref()
            .ok_or_else(|| MedsError::not_fitted("load_static_data"))?;
        let values = lookup.get(&subject_id);
        Ok(self
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let value = values
                    .and_then(|v| v.get(index))
                    .unwrap_or(&column.map_invalids_to);
                column.event(subject_id, value)
            })
            .collect())
    }
}
