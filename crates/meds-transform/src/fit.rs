//! Single-pass joint fitting of a preprocessor chain.

use std::path::{Path, PathBuf};
use std::time::Instant;

use meds_ingest::read_event_table;
use meds_model::{EventTable, Result, ensure_files_exist};
use tracing::{debug, info, info_span};

use crate::preprocess::Preprocessor;

/// Fits every preprocessor from one streaming pass over `files`.
///
/// External resources load first, then each shard is read once. Within a
/// shard preprocessors run in configuration order: each observes the table
/// as rewritten by the code transforms before it, so value fits see
/// post-rewrite codes. Accumulators are turned into fitted parameters once
/// every shard has been seen. A failing shard aborts with its path attached.
pub fn fit_jointly(preprocessors: &mut [Preprocessor], files: &[PathBuf]) -> Result<()> {
    let span = info_span!("fit", preprocessors = preprocessors.len(), files = files.len());
    let _guard = span.enter();
    let start = Instant::now();

    ensure_files_exist(files)?;
    for preprocessor in preprocessors.iter_mut() {
        preprocessor.prepare()?;
    }

    for (index, path) in files.iter().enumerate() {
        fit_shard(preprocessors, path).map_err(|err| err.in_shard(path))?;
        debug!(
            shard = %path.display(),
            done = index + 1,
            total = files.len(),
            "fitted shard"
        );
    }

    for preprocessor in preprocessors.iter_mut() {
        preprocessor.finalize();
    }
    info!(
        duration_ms = start.elapsed().as_millis() as u64,
        "fitted preprocessors"
    );
    Ok(())
}

fn fit_shard(preprocessors: &mut [Preprocessor], path: &Path) -> Result<()> {
    let mut table = read_event_table(path)?;
    for preprocessor in preprocessors.iter_mut() {
        preprocessor.observe(&table);
        if preprocessor.is_rewrite() {
            table = preprocessor.encode(table)?;
        }
    }
    Ok(())
}

/// Applies a fitted chain in order.
pub fn apply_preprocessors(
    preprocessors: &[Preprocessor],
    table: EventTable,
) -> Result<EventTable> {
    preprocessors
        .iter()
        .try_fold(table, |table, preprocessor| preprocessor.encode(table))
}
