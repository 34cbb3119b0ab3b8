//! Parquet shard reading and writing.
//!
//! Shards are loaded into row-oriented [`EventTable`]s; polars is only used at
//! the file boundary.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use meds_common::polars::datetime_to_micros;
use meds_common::{any_to_datetime, any_to_f64, any_to_i64, any_to_string_opt};
use meds_model::{Event, EventTable, EventValue, MedsError, Result};

pub const SUBJECT_ID: &str = "subject_id";
pub const TIME: &str = "time";
pub const CODE: &str = "code";
pub const NUMERIC_VALUE: &str = "numeric_value";
pub const TEXT_VALUE: &str = "text_value";

/// Reads one parquet shard into an event table.
///
/// `subject_id`, `time` and `code` are required; the value columns are
/// optional and read as nulls when absent.
pub fn read_event_table(path: &Path) -> Result<EventTable> {
    let file = File::open(path).map_err(|e| MedsError::io(path, e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| MedsError::parquet(path, e))?;
    let table = dataframe_to_events(&df, path)?;
    tracing::debug!(path = %path.display(), rows = table.len(), "read shard");
    Ok(table)
}

/// Converts a MEDS-shaped dataframe into events; `source` labels errors.
pub fn dataframe_to_events(df: &DataFrame, source: &Path) -> Result<EventTable> {
    let available: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let required = |name: &str| -> Result<&Column> {
        df.column(name)
            .map_err(|_| MedsError::missing_column(name, &available))
    };
    let subject_col = required(SUBJECT_ID)?;
    let time_col = required(TIME)?;
    let code_col = required(CODE)?;
    let numeric_col = df.column(NUMERIC_VALUE).ok();
    let text_col = df.column(TEXT_VALUE).ok();
    let numeric_is_text = numeric_col.is_some_and(|col| col.dtype() == &DataType::String);

    let mut events = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let subject_id = any_to_i64(cell(subject_col, idx, source)?).ok_or_else(|| {
            MedsError::parquet(source, format!("row {idx} has a null or non-integer subject_id"))
        })?;
        let time = any_to_datetime(cell(time_col, idx, source)?);
        let code = any_to_string_opt(cell(code_col, idx, source)?).unwrap_or_default();
        let numeric_value = match numeric_col {
            Some(col) if numeric_is_text => {
                any_to_string_opt(cell(col, idx, source)?).map(EventValue::Label)
            }
            Some(col) => any_to_f64(cell(col, idx, source)?).map(EventValue::Number),
            None => None,
        };
        let text_value = match text_col {
            Some(col) => any_to_string_opt(cell(col, idx, source)?),
            None => None,
        };
        events.push(Event {
            subject_id,
            time,
            code,
            numeric_value,
            text_value,
        });
    }
    Ok(EventTable::new(events))
}

fn cell<'a>(column: &'a Column, idx: usize, source: &Path) -> Result<AnyValue<'a>> {
    column.get(idx).map_err(|e| MedsError::parquet(source, e))
}

/// Builds a MEDS-shaped dataframe from events.
///
/// `numeric_value` is written as Float64 unless some event carries a derived
/// label, in which case the whole column is written as strings.
pub fn events_to_dataframe(table: &EventTable) -> PolarsResult<DataFrame> {
    let subject_ids: Vec<i64> = table.iter().map(|e| e.subject_id).collect();
    let times: Vec<Option<i64>> = table
        .iter()
        .map(|e| e.time.map(datetime_to_micros))
        .collect();
    let codes: Vec<&str> = table.iter().map(|e| e.code.as_str()).collect();
    let has_labels = table
        .iter()
        .any(|e| matches!(e.numeric_value, Some(EventValue::Label(_))));
    let numeric = if has_labels {
        let values: Vec<Option<String>> = table
            .iter()
            .map(|e| e.numeric_value.as_ref().map(|v| v.as_text().into_owned()))
            .collect();
        Column::new(NUMERIC_VALUE.into(), values)
    } else {
        let values: Vec<Option<f64>> = table
            .iter()
            .map(|e| e.numeric_value.as_ref().and_then(EventValue::as_f64))
            .collect();
        Column::new(NUMERIC_VALUE.into(), values)
    };
    let texts: Vec<Option<&str>> = table.iter().map(|e| e.text_value.as_deref()).collect();

    DataFrame::new(vec![
        Column::new(SUBJECT_ID.into(), subject_ids),
        Column::new(TIME.into(), times)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?,
        Column::new(CODE.into(), codes),
        numeric,
        Column::new(TEXT_VALUE.into(), texts),
    ])
}

/// Writes an event table as a parquet shard.
pub fn write_event_table(path: &Path, table: &EventTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MedsError::io(parent, e))?;
    }
    let mut df = events_to_dataframe(table).map_err(|e| MedsError::parquet(path, e))?;
    let file = File::create(path).map_err(|e| MedsError::io(path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| MedsError::parquet(path, e))?;
    tracing::debug!(path = %path.display(), rows = table.len(), "wrote shard");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_code_column_is_reported() {
        let df = DataFrame::new(vec![
            Column::new(SUBJECT_ID.into(), vec![1i64]),
            Column::new(TIME.into(), vec![None::<i64>])
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
                .unwrap(),
        ])
        .unwrap();
        let err = dataframe_to_events(&df, Path::new("mem")).unwrap_err();
        assert!(
            matches!(err, MedsError::MissingColumn { ref column, .. } if column == CODE),
            "{err}"
        );
    }

    #[test]
    fn value_columns_are_optional() {
        let df = DataFrame::new(vec![
            Column::new(SUBJECT_ID.into(), vec![3i64, 3]),
            Column::new(TIME.into(), vec![None, Some(60_000_000i64)])
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
                .unwrap(),
            Column::new(CODE.into(), vec!["MEDS_BIRTH", "LAB//A"]),
        ])
        .unwrap();
        let table = dataframe_to_events(&df, Path::new("mem")).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.events()[0].time.is_none());
        assert_eq!(
            table.events()[1].time.map(|t| t.and_utc().timestamp()),
            Some(60)
        );
        assert!(table.iter().all(|e| e.numeric_value.is_none()));
    }

    #[test]
    fn labels_force_string_numeric_column() {
        let mut event = Event::new(1, None, "LAB//A").with_numeric(2.5);
        event.set_label(meds_model::ValueColumn::NumericValue, "Q2".into());
        let table = EventTable::new(vec![event, Event::new(1, None, "B").with_numeric(3.0)]);
        let df = events_to_dataframe(&table).unwrap();
        assert_eq!(df.column(NUMERIC_VALUE).unwrap().dtype(), &DataType::String);
        let back = dataframe_to_events(&df, Path::new("mem")).unwrap();
        assert_eq!(
            back.events()[1].numeric_value,
            Some(EventValue::Label("3.0".into()))
        );
    }
}
