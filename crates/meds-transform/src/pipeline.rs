//! Shard → preprocessors → per-subject timelines → postprocessors.

use std::path::Path;

use meds_ingest::read_event_table;
use meds_model::{EventTable, MedsError, Result, SubjectTimeline};

use crate::fit::apply_preprocessors;
use crate::postprocess::{Postprocessor, apply_postprocessors};
use crate::preprocess::Preprocessor;

/// Runs a fitted chain over an in-memory table.
pub fn transform_table(
    table: EventTable,
    preprocessors: &[Preprocessor],
    postprocessors: &[Postprocessor],
) -> Result<Vec<SubjectTimeline>> {
    if let Some(unready) = preprocessors.iter().find(|p| !p.is_ready()) {
        return Err(MedsError::not_fitted(unready.name()));
    }
    let mut table = apply_preprocessors(preprocessors, table)?;
    table.sort_by_subject_and_time();
    Ok(apply_postprocessors(postprocessors, table.into_timelines()))
}

/// Reads one shard and returns its transformed subject timelines.
pub fn load_timelines(
    path: &Path,
    preprocessors: &[Preprocessor],
    postprocessors: &[Postprocessor],
) -> Result<Vec<SubjectTimeline>> {
    let table = read_event_table(path)?;
    let rows = table.len();
    let timelines = transform_table(table, preprocessors, postprocessors)?;
    tracing::debug!(
        shard = %path.display(),
        rows,
        subjects = timelines.len(),
        "transformed shard"
    );
    Ok(timelines)
}
