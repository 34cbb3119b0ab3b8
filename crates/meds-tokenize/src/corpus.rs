//! Streams training shards through the transform chain one file at a time.

use std::path::PathBuf;

use meds_model::{MedsError, Result, SubjectTimeline, ensure_files_exist};
use meds_transform::{Postprocessor, Preprocessor, load_timelines};
use tracing::{debug, info};

/// Calls `visit` once per shard with its transformed subjects.
///
/// All files are checked up front; a failure inside a shard aborts with the
/// shard's path attached. Each shard's timelines are dropped before the next
/// file is read.
pub fn for_each_shard<F>(
    files: &[PathBuf],
    preprocessors: &[Preprocessor],
    postprocessors: &[Postprocessor],
    mut visit: F,
) -> Result<()>
where
    F: FnMut(&[SubjectTimeline]) -> Result<()>,
{
    if files.is_empty() {
        return Err(MedsError::config("training requires at least one shard"));
    }
    ensure_files_exist(files)?;
    info!(file_count = files.len(), "streaming training shards");

    for (index, path) in files.iter().enumerate() {
        let timelines = load_timelines(path, preprocessors, postprocessors)
            .map_err(|err| err.in_shard(path))?;
        visit(&timelines).map_err(|err| err.in_shard(path))?;
        debug!(
            shard = %path.display(),
            subjects = timelines.len(),
            done = index + 1,
            total = files.len(),
            "processed training shard"
        );
    }
    Ok(())
}
